//! Page data feeds over the freshness cache.
//!
//! A feed renders whatever it has cached straight away, fresh or not, then
//! refreshes from the network only when the entry is stale or missing.

use std::sync::Arc;
use std::time::Duration;

use arcade_core::{AppConfig, CacheDb, Error, FreshnessEntry};
use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use crate::fetch::{Network, Request, resolve};

/// One page-level JSON feed and its freshness window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFeed {
    pub cache_name: String,
    pub endpoint: String,
    pub ttl: Duration,
}

impl DataFeed {
    pub fn new(cache_name: impl Into<String>, endpoint: impl Into<String>, ttl: Duration) -> Self {
        Self { cache_name: cache_name.into(), endpoint: endpoint.into(), ttl }
    }

    pub fn friends_activity() -> Self {
        Self::new("friendsActivityCache", "/api/friends/activity", Duration::from_secs(30 * 60))
    }

    pub fn week_activity() -> Self {
        Self::new("weekActivityCache", "/api/week-activity", Duration::from_secs(30 * 60))
    }

    pub fn recent_games() -> Self {
        Self::new("recentGamesCache", "/api/recent-games", Duration::from_secs(10 * 60))
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::friends_activity(), Self::week_activity(), Self::recent_games()]
    }
}

/// Where a feed's payload is rendered.
pub trait FeedSink: Send + Sync {
    fn render(&self, payload: &Value);

    /// Nothing to show: render the failure state with a retry control.
    fn render_failure(&self, error: &Error);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Cached entry within its window; no request made.
    Fresh,
    /// Fetched, stored and rendered.
    Refreshed,
    /// Refresh failed; the cached entry stays on screen.
    Stale,
    /// Refresh failed with nothing cached; retry by loading again.
    Failed,
}

pub struct FeedLoader {
    db: CacheDb,
    network: Arc<dyn Network>,
    origin: Url,
}

impl FeedLoader {
    pub fn new(config: &AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {}", config.origin, e)))?;
        Ok(Self { db, network, origin })
    }

    pub async fn load(&self, feed: &DataFeed, sink: &dyn FeedSink) -> FeedOutcome {
        self.load_at(feed, sink, Utc::now()).await
    }

    /// Load as of `now`.
    pub async fn load_at(&self, feed: &DataFeed, sink: &dyn FeedSink, now: DateTime<Utc>) -> FeedOutcome {
        let cached = match self.db.read_freshness(&feed.cache_name).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(feed = %feed.cache_name, error = %e, "freshness read failed");
                None
            }
        };

        if let Some(entry) = &cached {
            sink.render(&entry.payload);
            if entry.is_fresh(feed.ttl, now) {
                tracing::debug!(feed = %feed.cache_name, "fresh, skipping request");
                return FeedOutcome::Fresh;
            }
        }

        match self.refresh(feed, now).await {
            Ok(entry) => {
                sink.render(&entry.payload);
                FeedOutcome::Refreshed
            }
            Err(e) if cached.is_some() => {
                tracing::warn!(feed = %feed.cache_name, error = %e, "refresh failed, keeping cached data");
                FeedOutcome::Stale
            }
            Err(e) => {
                tracing::error!(feed = %feed.cache_name, error = %e, "refresh failed with nothing cached");
                sink.render_failure(&e);
                FeedOutcome::Failed
            }
        }
    }

    async fn refresh(&self, feed: &DataFeed, now: DateTime<Utc>) -> Result<FreshnessEntry, Error> {
        let url = resolve(&self.origin, &feed.endpoint).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let payload = self.network.fetch(&Request::get(url)).await?.error_for_status()?.json()?;

        match self.db.write_freshness_at(&feed.cache_name, &payload, now).await {
            Ok(entry) => Ok(entry),
            Err(e) => {
                tracing::warn!(feed = %feed.cache_name, error = %e, "freshness write failed");
                Ok(FreshnessEntry { payload, captured_at: now })
            }
        }
    }
}
