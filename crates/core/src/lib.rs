//! Core types and shared functionality for the arcade delivery core.
//!
//! This crate provides:
//! - Versioned durable cache stores with a SQLite backend
//! - The freshness-windowed data cache used by page feeds
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, CacheStore, CachedResponse, FreshnessEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
