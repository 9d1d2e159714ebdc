//! Push subscription lifecycle.
//!
//! A [`PushManager`] is bound to one toggle control and one bell icon. With
//! either missing it is inert: no platform calls and no errors. Its state
//! always comes from the platform's current subscription, never from a
//! local assumption.
//!
//! Backend sync is asymmetric. A failed `/subscribe` leaves the platform
//! subscription in place and a failed `/unsubscribe` is only logged.

pub mod backend;
pub mod key;
pub mod platform;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arcade_core::{AppConfig, Error};

pub use backend::{BackendSync, HttpBackend};
pub use key::decode_application_server_key;
pub use platform::{Permission, PushPlatform, PushSubscription, SubscriptionKeys};

/// Script registered as the background interceptor.
pub const WORKER_SCRIPT: &str = "/static/service-worker.js";

pub const NOT_READY_ALERT: &str = "Service Worker not ready";
pub const PERMISSION_DENIED_ALERT: &str = "Permission denied";
pub const DISABLE_TITLE: &str = "Click to disable notifications";
pub const ENABLE_TITLE: &str = "Click to enable notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushState {
    Uninitialized,
    ReadyUnsubscribed,
    ReadySubscribed,
}

/// Bell glyph variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BellState {
    Filled,
    Outline,
}

/// Icon element showing the subscription state.
pub trait BellIcon: Send + Sync {
    fn render(&self, state: BellState);
}

/// Control the user clicks to toggle notifications.
pub trait ToggleControl: Send + Sync {
    fn set_title(&self, title: &str);
}

/// User-visible one-line notices.
pub trait Alerts: Send + Sync {
    fn alert(&self, message: &str);
}

/// Clears the busy flag when a toggle finishes, however it finishes.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PushManager {
    public_key: String,
    platform: Arc<dyn PushPlatform>,
    backend: Arc<dyn BackendSync>,
    alerts: Arc<dyn Alerts>,
    anchors: Option<(Arc<dyn ToggleControl>, Arc<dyn BellIcon>)>,
    state: Mutex<PushState>,
    busy: AtomicBool,
}

impl PushManager {
    pub fn new(
        public_key: impl Into<String>, platform: Arc<dyn PushPlatform>, backend: Arc<dyn BackendSync>,
        alerts: Arc<dyn Alerts>, toggle: Option<Arc<dyn ToggleControl>>, icon: Option<Arc<dyn BellIcon>>,
    ) -> Self {
        let anchors = toggle.zip(icon);
        if anchors.is_none() {
            tracing::debug!("push toggle or icon missing, manager inert");
        }

        Self {
            public_key: public_key.into(),
            platform,
            backend,
            alerts,
            anchors,
            state: Mutex::new(PushState::Uninitialized),
            busy: AtomicBool::new(false),
        }
    }

    /// Build a manager with the application server key from `config`.
    ///
    /// A missing key leaves push unusable and is reported as `NotReady`; a key
    /// that does not decode is a `ParseFailure`.
    pub fn from_config(
        config: &AppConfig, platform: Arc<dyn PushPlatform>, backend: Arc<dyn BackendSync>, alerts: Arc<dyn Alerts>,
        toggle: Option<Arc<dyn ToggleControl>>, icon: Option<Arc<dyn BellIcon>>,
    ) -> Result<Self, Error> {
        let key = config.require_vapid_public_key().map_err(|e| Error::NotReady(e.to_string()))?;
        decode_application_server_key(key)?;
        Ok(Self::new(key, platform, backend, alerts, toggle, icon))
    }

    pub fn state(&self) -> PushState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_inert(&self) -> bool {
        self.anchors.is_none()
    }

    fn set_state(&self, state: PushState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        if let Some((toggle, icon)) = &self.anchors {
            match state {
                PushState::ReadySubscribed => {
                    icon.render(BellState::Filled);
                    toggle.set_title(DISABLE_TITLE);
                }
                PushState::ReadyUnsubscribed => {
                    icon.render(BellState::Outline);
                    toggle.set_title(ENABLE_TITLE);
                }
                PushState::Uninitialized => {}
            }
        }
    }

    /// Register the interceptor and adopt the platform's current subscription.
    ///
    /// Unsupported platforms are left uninitialized without complaint.
    /// Registration errors are logged.
    pub async fn init(&self) -> PushState {
        if self.is_inert() {
            return self.state();
        }
        if let Err(e) = self.ensure_supported() {
            tracing::debug!(error = %e, "push unavailable");
            return self.state();
        }

        if let Err(e) = self.platform.register_worker(WORKER_SCRIPT).await {
            tracing::error!(error = %e, "worker registration failed");
            return self.state();
        }

        let subscribed = match self.platform.get_subscription().await {
            Ok(existing) => existing.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read existing subscription");
                false
            }
        };

        self.set_state(if subscribed { PushState::ReadySubscribed } else { PushState::ReadyUnsubscribed });
        tracing::info!(subscribed, "push manager ready");
        self.state()
    }

    fn ensure_supported(&self) -> Result<(), Error> {
        if self.platform.supports_push() {
            Ok(())
        } else {
            Err(Error::PlatformUnsupported("worker or push manager missing".into()))
        }
    }

    /// Flip the subscription. Failures are alerted once and returned.
    ///
    /// A toggle issued while another is running is dropped and reports the
    /// state as it stands then; the running toggle settles the final state.
    pub async fn toggle(&self) -> Result<PushState, Error> {
        if self.is_inert() {
            return Ok(self.state());
        }

        if self.busy.swap(true, Ordering::AcqRel) {
            tracing::debug!("toggle already in progress, ignoring");
            return Ok(self.state());
        }
        let _guard = BusyGuard(&self.busy);

        // state is only read while holding the busy flag
        let state = self.state();
        if state == PushState::Uninitialized {
            self.alerts.alert(NOT_READY_ALERT);
            return Err(Error::NotReady("push manager not initialized".into()));
        }

        let result = match state {
            PushState::ReadySubscribed => self.unsubscribe().await,
            _ => self.subscribe().await,
        };

        match result {
            Ok(state) => Ok(state),
            Err(e @ Error::PermissionDenied(_)) => {
                self.alerts.alert(PERMISSION_DENIED_ALERT);
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "push toggle failed");
                self.alerts.alert(&format!("Error: {}", e));
                Err(e)
            }
        }
    }

    /// Ask permission, subscribe at the platform, then register with the backend.
    pub async fn subscribe(&self) -> Result<PushState, Error> {
        let permission = self.platform.request_permission().await?;
        if permission != Permission::Granted {
            return Err(Error::PermissionDenied(format!("notification permission {:?}", permission)));
        }

        let key = decode_application_server_key(&self.public_key)?;
        let subscription = self.platform.subscribe(&key).await?;
        let registered = self.backend.register(&subscription).await;

        self.set_state(PushState::ReadySubscribed);
        registered?;

        tracing::info!(endpoint = %subscription.endpoint, "subscribed");
        Ok(self.state())
    }

    /// Cancel the platform subscription, if any, and tell the backend.
    ///
    /// Always ends unsubscribed once the platform call succeeds.
    pub async fn unsubscribe(&self) -> Result<PushState, Error> {
        if let Some(subscription) = self.platform.get_subscription().await? {
            self.platform.unsubscribe(&subscription).await?;
            if let Err(e) = self.backend.unregister(&subscription.endpoint).await {
                tracing::warn!(error = %e, "backend unsubscribe failed, keeping local state");
            }
        }

        self.set_state(PushState::ReadyUnsubscribed);
        tracing::info!("unsubscribed");
        Ok(self.state())
    }
}
