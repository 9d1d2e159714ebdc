//! SQLite-backed durable cache for the delivery core.
//!
//! This module provides the persistent stores everything else reads from,
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named, versioned request/response stores (`{version}_static`, `{version}_api`)
//! - Request keys derived from method and canonical URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Freshness-windowed key-value slots for page data

pub mod connection;
pub mod freshness;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use freshness::FreshnessEntry;
pub use stores::{CacheEntry, CacheStore, CachedResponse};
