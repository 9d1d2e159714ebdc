//! Client-side delivery for the arcade dashboard.
//!
//! This crate provides the network fetch seam, the caching request
//! interceptor, push subscription management, resident-view navigation and
//! the page data feeds. Platform surfaces are traits so every decision runs
//! without a browser.

pub mod feed;
pub mod fetch;
pub mod interceptor;
pub mod navigator;
pub mod push;

#[cfg(test)]
pub(crate) mod testing;

pub use feed::{DataFeed, FeedLoader, FeedOutcome, FeedSink};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Network, Request, RequestMode};
pub use interceptor::{FetchOutcome, Interceptor, Phase, ResourceClass, WorkerEvent, WorkerHost, WorkerOutcome};
pub use navigator::{NavigationOutcome, Navigator};
pub use push::{PushManager, PushState};
