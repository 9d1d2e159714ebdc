//! Platform push primitives.

use arcade_core::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Notification permission as answered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The prompt was dismissed without a decision.
    Default,
}

/// Encryption keys of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Opaque push subscription, serialized the way the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

/// Worker registration and push subscription primitives of the host platform.
#[async_trait]
pub trait PushPlatform: Send + Sync {
    /// Whether background workers and push messaging are both available.
    fn supports_push(&self) -> bool;

    /// Register the interceptor script. Registering again is a no-op.
    async fn register_worker(&self, script_url: &str) -> Result<(), Error>;

    async fn get_subscription(&self) -> Result<Option<PushSubscription>, Error>;

    async fn request_permission(&self) -> Result<Permission, Error>;

    /// Create a user-visible-only subscription for `application_server_key`.
    async fn subscribe(&self, application_server_key: &[u8]) -> Result<PushSubscription, Error>;

    /// Cancel a subscription. Returns false if it was already gone.
    async fn unsubscribe(&self, subscription: &PushSubscription) -> Result<bool, Error>;
}
