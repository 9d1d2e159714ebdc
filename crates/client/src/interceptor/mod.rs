//! Background request interceptor.
//!
//! One [`Interceptor`] serves one origin. The host runtime feeds it
//! [`WorkerEvent`]s; lifecycle events move it through [`Phase`]s and fetch
//! events are answered from the versioned durable cache:
//!
//! ```text
//! Parsed ──install──▶ Installing ──ok──▶ Installed ──activate──▶ Activating ──▶ Activated
//!                          │
//!                          └──err──▶ Redundant ──install (retry)──▶ Installing
//! ```
//!
//! Only the interceptor writes cache stores.

pub mod classify;
pub mod notification;
pub mod strategy;

use std::sync::{Arc, Mutex};

use arcade_core::{AppConfig, CacheDb, CacheEntry, CachedResponse, Error};
use async_trait::async_trait;
use url::Url;

pub use classify::{Classifier, ResourceClass};
pub use notification::Notification;
pub use strategy::Strategy;

use crate::fetch::{Network, Request};

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; a later install starts over.
    Redundant,
}

/// Event delivered by the host runtime.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    /// Push message with its raw body, if any.
    Push(Option<Vec<u8>>),
    NotificationClick(Notification),
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Cached root page served because the network was unreachable.
    Fallback,
}

/// Answer to a fetch event.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the platform performs the request itself.
    Passthrough(ResourceClass),
    Respond { class: ResourceClass, response: CachedResponse, source: ResponseSource },
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Installed { assets: usize },
    Activated { removed: Vec<String> },
    Fetch(FetchOutcome),
    NotificationShown(Notification),
    WindowOpened(Url),
}

/// Effects the interceptor asks of its host runtime.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Take control of every open client without waiting for a reload.
    async fn claim_clients(&self) -> Result<(), Error>;

    async fn show_notification(&self, notification: &Notification) -> Result<(), Error>;

    async fn close_notification(&self, notification: &Notification) -> Result<(), Error>;

    /// Open or focus a window on `url`.
    async fn open_window(&self, url: &Url) -> Result<(), Error>;
}

/// Versioned caching interceptor.
pub struct Interceptor {
    db: CacheDb,
    network: Arc<dyn Network>,
    host: Arc<dyn WorkerHost>,
    classifier: Classifier,
    version: String,
    static_store: String,
    api_store: String,
    fallback: Url,
    root: Url,
    phase: Mutex<Phase>,
}

impl Interceptor {
    pub fn new(
        config: &AppConfig, db: CacheDb, network: Arc<dyn Network>, host: Arc<dyn WorkerHost>,
    ) -> Result<Self, Error> {
        let classifier = Classifier::from_config(config)?;
        let fallback = crate::fetch::resolve(classifier.origin(), &config.fallback_page)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", config.fallback_page, e)))?;
        let root = classifier.origin().join("/").map_err(|e| Error::InvalidUrl(e.to_string()))?;

        Ok(Self {
            db,
            network,
            host,
            classifier,
            version: config.cache_version.clone(),
            static_store: config.static_store_name(),
            api_store: config.api_store_name(),
            fallback,
            root,
            phase: Mutex::new(Phase::Parsed),
        })
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }

    /// Move to `next` if the current phase is one of `from`.
    fn transition(&self, from: &[Phase], next: Phase) -> Result<(), Error> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if !from.contains(&phase) {
            return Err(Error::InvalidPhase(format!("cannot enter {:?} from {:?}", next, *phase)));
        }
        *phase = next;
        Ok(())
    }

    /// Dispatch one event to its phase handler.
    pub async fn handle(&self, event: WorkerEvent) -> Result<WorkerOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(|assets| WorkerOutcome::Installed { assets }),
            WorkerEvent::Activate => self.activate().await.map(|removed| WorkerOutcome::Activated { removed }),
            WorkerEvent::Fetch(request) => self.fetch(&request).await.map(WorkerOutcome::Fetch),
            WorkerEvent::Push(data) => self.push(data.as_deref()).await.map(WorkerOutcome::NotificationShown),
            WorkerEvent::NotificationClick(notification) => {
                self.notification_click(&notification).await.map(WorkerOutcome::WindowOpened)
            }
        }
    }

    /// Fetch the whole shell manifest and write it to the static store in
    /// one transaction. Any failed asset abandons the install.
    pub async fn install(&self) -> Result<usize, Error> {
        self.transition(&[Phase::Parsed, Phase::Redundant], Phase::Installing)?;
        tracing::info!(version = %self.version, assets = self.classifier.manifest().len(), "installing app shell");

        match self.populate_shell().await {
            Ok(assets) => {
                self.set_phase(Phase::Installed);
                tracing::info!(version = %self.version, assets, "installed");
                Ok(assets)
            }
            Err(e) => {
                self.set_phase(Phase::Redundant);
                tracing::error!(version = %self.version, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn populate_shell(&self) -> Result<usize, Error> {
        let mut entries = Vec::with_capacity(self.classifier.manifest().len());
        for url in self.classifier.manifest() {
            let response = self
                .network
                .fetch(&Request::get(url.clone()))
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| Error::InstallFailed(format!("{}: {}", url, e)))?;
            entries.push(CacheEntry { method: "GET".into(), url: url.as_str().into(), response: response.to_cached() });
        }

        let store = self.db.open_store(&self.static_store).await?;
        store.put_all(&entries).await?;
        Ok(entries.len())
    }

    /// Drop every store not named for the current version, then claim clients.
    ///
    /// Returns the removed store names.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.transition(&[Phase::Installed], Phase::Activating)?;
        tracing::info!(version = %self.version, "activating, clearing old caches");

        match self.retire_stale_stores().await {
            Ok(removed) => {
                self.set_phase(Phase::Activated);
                Ok(removed)
            }
            Err(e) => {
                self.set_phase(Phase::Installed);
                tracing::error!(error = %e, "activation failed");
                Err(e)
            }
        }
    }

    async fn retire_stale_stores(&self) -> Result<Vec<String>, Error> {
        let mut removed = Vec::new();
        for name in self.db.list_store_names().await? {
            if name == self.static_store || name == self.api_store {
                continue;
            }
            if self.db.delete_store(&name).await? {
                tracing::info!(store = %name, "removed old cache");
                removed.push(name);
            }
        }

        self.db.open_store(&self.static_store).await?;
        self.db.open_store(&self.api_store).await?;
        self.host.claim_clients().await?;
        Ok(removed)
    }

    /// Answer a fetch event.
    ///
    /// Requests pass through untouched until the interceptor is activated.
    pub async fn fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let class = self.classifier.classify(request);
        let strategy = Strategy::for_class(class);
        tracing::debug!(url = %request.url, ?class, ?strategy, "classified");

        if self.phase() != Phase::Activated {
            return Ok(FetchOutcome::Passthrough(class));
        }

        match strategy {
            Strategy::Passthrough => Ok(FetchOutcome::Passthrough(class)),
            Strategy::CacheFirstPopulate => self.serve_navigation(request, class).await,
            Strategy::CacheFirstReadOnly => self.serve_static(request, class).await,
        }
    }

    /// Cache lookup across every store. A failing lookup counts as a miss.
    async fn lookup(&self, method: &str, url: &str) -> Option<CachedResponse> {
        match self.db.match_any(method, url).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn serve_navigation(&self, request: &Request, class: ResourceClass) -> Result<FetchOutcome, Error> {
        let method = request.method.as_str();
        let url = request.url.as_str();

        if let Some(response) = self.lookup(method, url).await {
            tracing::debug!(url, "navigation cache hit");
            return Ok(FetchOutcome::Respond { class, response, source: ResponseSource::Cache });
        }

        match self.network.fetch(request).await {
            Ok(fetched) => {
                let response = fetched.to_cached();
                if response.is_success() {
                    self.populate(method, url, &response).await;
                }
                Ok(FetchOutcome::Respond { class, response, source: ResponseSource::Network })
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "navigation offline, serving fallback page");
                match self.lookup("GET", self.fallback.as_str()).await {
                    Some(response) => Ok(FetchOutcome::Respond { class, response, source: ResponseSource::Fallback }),
                    None => Err(e),
                }
            }
        }
    }

    /// Write a navigation response to the static store. Failures are logged.
    async fn populate(&self, method: &str, url: &str, response: &CachedResponse) {
        let result = match self.db.open_store(&self.static_store).await {
            Ok(store) => store.put(method, url, response).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(url, error = %e, "failed to cache navigation response");
        }
    }

    async fn serve_static(&self, request: &Request, class: ResourceClass) -> Result<FetchOutcome, Error> {
        if let Some(response) = self.lookup(request.method.as_str(), request.url.as_str()).await {
            return Ok(FetchOutcome::Respond { class, response, source: ResponseSource::Cache });
        }

        let fetched = self.network.fetch(request).await?;
        Ok(FetchOutcome::Respond { class, response: fetched.to_cached(), source: ResponseSource::Network })
    }

    /// Show a notification for a push message.
    pub async fn push(&self, data: Option<&[u8]>) -> Result<Notification, Error> {
        let notification = Notification::from_push(data);
        self.host.show_notification(&notification).await?;
        tracing::info!(title = %notification.title, "notification shown");
        Ok(notification)
    }

    /// Close the clicked notification and open the root page.
    pub async fn notification_click(&self, notification: &Notification) -> Result<Url, Error> {
        self.host.close_notification(notification).await?;
        self.host.open_window(&self.root).await?;
        Ok(self.root.clone())
    }
}
