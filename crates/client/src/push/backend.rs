//! Backend subscription sync.

use std::sync::Arc;

use arcade_core::Error;
use async_trait::async_trait;
use serde_json::json;
use url::Url;

use super::platform::PushSubscription;
use crate::fetch::{Network, Request};

/// Keeps the backend's copy of the subscription in step with the platform.
#[async_trait]
pub trait BackendSync: Send + Sync {
    async fn register(&self, subscription: &PushSubscription) -> Result<(), Error>;

    async fn unregister(&self, endpoint: &str) -> Result<(), Error>;
}

/// `POST /subscribe` and `POST /unsubscribe` over a [`Network`].
pub struct HttpBackend {
    network: Arc<dyn Network>,
    subscribe_url: Url,
    unsubscribe_url: Url,
}

impl HttpBackend {
    pub fn new(network: Arc<dyn Network>, origin: &Url) -> Result<Self, Error> {
        let join = |path: &str| origin.join(path).map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)));
        Ok(Self { network, subscribe_url: join("/subscribe")?, unsubscribe_url: join("/unsubscribe")? })
    }

    async fn post(&self, url: &Url, body: &serde_json::Value) -> Result<(), Error> {
        let request = Request::post_json(url.clone(), body)?;
        self.network
            .fetch(&request)
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| Error::BackendSyncFailure(format!("POST {}: {}", url.path(), e)))
    }
}

#[async_trait]
impl BackendSync for HttpBackend {
    async fn register(&self, subscription: &PushSubscription) -> Result<(), Error> {
        let body = serde_json::to_value(subscription)?;
        self.post(&self.subscribe_url, &body).await
    }

    async fn unregister(&self, endpoint: &str) -> Result<(), Error> {
        self.post(&self.unsubscribe_url, &json!({ "endpoint": endpoint })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::platform::SubscriptionKeys;
    use crate::testing::ScriptedNetwork;

    fn origin() -> Url {
        Url::parse("http://localhost:5000").unwrap()
    }

    fn subscription() -> PushSubscription {
        PushSubscription {
            endpoint: "https://push.example.net/send/abc".into(),
            expiration_time: None,
            keys: SubscriptionKeys { p256dh: "BNc".into(), auth: "tBH".into() },
        }
    }

    #[tokio::test]
    async fn test_register_posts_subscription() {
        let network = Arc::new(ScriptedNetwork::new());
        network.route("http://localhost:5000/subscribe", 201, "");
        let backend = HttpBackend::new(network.clone(), &origin()).unwrap();

        backend.register(&subscription()).await.unwrap();

        let request = network.last_request().unwrap();
        assert_eq!(request.method, reqwest::Method::POST);
        let body: PushSubscription = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, subscription());
    }

    #[tokio::test]
    async fn test_unregister_posts_endpoint() {
        let network = Arc::new(ScriptedNetwork::new());
        network.route("http://localhost:5000/unsubscribe", 200, "");
        let backend = HttpBackend::new(network.clone(), &origin()).unwrap();

        backend.unregister("https://push.example.net/send/abc").await.unwrap();

        let request = network.last_request().unwrap();
        let body: serde_json::Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"endpoint": "https://push.example.net/send/abc"}));
    }

    #[tokio::test]
    async fn test_server_error_is_sync_failure() {
        let network = Arc::new(ScriptedNetwork::new());
        network.route("http://localhost:5000/unsubscribe", 500, "");
        let backend = HttpBackend::new(network, &origin()).unwrap();

        let err = backend.unregister("e").await.unwrap_err();
        assert!(matches!(err, Error::BackendSyncFailure(_)));
    }
}
