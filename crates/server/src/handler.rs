//! JSON-lines event dispatch.
//!
//! Each stdin line is one event for the interceptor; each event yields
//! exactly one outcome line on stdout, preceded by any host effects it
//! triggered. Events are handled one at a time in arrival order.

use std::collections::BTreeMap;
use std::sync::Arc;

use arcade_client::interceptor::{
    FetchOutcome, Interceptor, Notification, Phase, ResourceClass, ResponseSource, WorkerEvent, WorkerOutcome,
};
use arcade_client::fetch::Method;
use arcade_client::{Request, RequestMode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use url::Url;

use crate::error::{ErrorOutput, WorkerError};
use crate::host::LineWriter;

fn default_method() -> String {
    "GET".into()
}

/// One event line.
#[derive(Debug, Deserialize)]
pub struct EventLine {
    /// Echoed back on the outcome line.
    #[serde(default)]
    pub id: Option<Value>,

    #[serde(flatten)]
    pub event: EventParams,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventParams {
    Install,
    Activate,
    Fetch {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        mode: RequestMode,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Push {
        /// JSON payload, or a string sent verbatim as the push body.
        #[serde(default)]
        data: Option<Value>,
    },
    NotificationClick {
        #[serde(default)]
        notification: Option<Notification>,
    },
}

impl EventParams {
    fn into_event(self) -> Result<WorkerEvent, WorkerError> {
        Ok(match self {
            EventParams::Install => WorkerEvent::Install,
            EventParams::Activate => WorkerEvent::Activate,
            EventParams::Fetch { url, method, mode, headers } => {
                let url = Url::parse(&url).map_err(|e| WorkerError::InvalidInput(format!("url `{}`: {}", url, e)))?;
                let method = method
                    .to_ascii_uppercase()
                    .parse::<Method>()
                    .map_err(|_| WorkerError::InvalidInput(format!("method `{}`", method)))?;
                let mut request = Request { method, mode, ..Request::get(url) };
                request.headers.extend(headers);
                WorkerEvent::Fetch(request)
            }
            EventParams::Push { data } => WorkerEvent::Push(data.map(|value| match value {
                Value::String(raw) => raw.into_bytes(),
                other => other.to_string().into_bytes(),
            })),
            EventParams::NotificationClick { notification } => {
                WorkerEvent::NotificationClick(notification.unwrap_or_default())
            }
        })
    }
}

/// How a response body is carried on an outcome line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    Utf8,
    Base64,
}

/// Text bodies stay readable; anything else is base64 so bytes survive the JSON line.
fn encode_body(body: &[u8]) -> (BodyEncoding, String) {
    match std::str::from_utf8(body) {
        Ok(text) => (BodyEncoding::Utf8, text.to_string()),
        Err(_) => (BodyEncoding::Base64, STANDARD.encode(body)),
    }
}

/// Outcome line body.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeOutput {
    Installed {
        assets: usize,
    },
    Activated {
        removed: Vec<String>,
    },
    Passthrough {
        class: ResourceClass,
    },
    Respond {
        class: ResourceClass,
        source: ResponseSource,
        status: u16,
        headers: Vec<(String, String)>,
        body_encoding: BodyEncoding,
        body: String,
    },
    NotificationShown {
        notification: Notification,
    },
    WindowOpened {
        url: String,
    },
    Error {
        #[serde(flatten)]
        error: ErrorOutput,
    },
}

impl From<WorkerOutcome> for OutcomeOutput {
    fn from(outcome: WorkerOutcome) -> Self {
        match outcome {
            WorkerOutcome::Installed { assets } => OutcomeOutput::Installed { assets },
            WorkerOutcome::Activated { removed } => OutcomeOutput::Activated { removed },
            WorkerOutcome::Fetch(FetchOutcome::Passthrough(class)) => OutcomeOutput::Passthrough { class },
            WorkerOutcome::Fetch(FetchOutcome::Respond { class, response, source }) => {
                let (body_encoding, body) = encode_body(&response.body);
                OutcomeOutput::Respond {
                    class,
                    source,
                    status: response.status,
                    headers: response.headers,
                    body_encoding,
                    body,
                }
            }
            WorkerOutcome::NotificationShown(notification) => OutcomeOutput::NotificationShown { notification },
            WorkerOutcome::WindowOpened(url) => OutcomeOutput::WindowOpened { url: url.into() },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OutcomeLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub phase: Phase,
    #[serde(flatten)]
    pub outcome: OutcomeOutput,
}

/// Routes event lines to the interceptor.
pub struct WorkerServer {
    interceptor: Interceptor,
    out: Arc<LineWriter>,
}

impl WorkerServer {
    pub fn new(interceptor: Interceptor, out: Arc<LineWriter>) -> Self {
        Self { interceptor, out }
    }

    /// Handle one line. Never fails; errors become error outcomes.
    pub async fn handle_line(&self, line: &str) -> OutcomeLine {
        let (id, result) = match serde_json::from_str::<EventLine>(line) {
            Ok(EventLine { id, event }) => (id, self.dispatch(event).await),
            Err(e) => (None, Err(WorkerError::InvalidInput(e.to_string()))),
        };

        let outcome = match result {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                tracing::warn!(error = %e, "event failed");
                OutcomeOutput::Error { error: ErrorOutput::from(&e) }
            }
        };

        OutcomeLine { id, phase: self.interceptor.phase(), outcome }
    }

    async fn dispatch(&self, params: EventParams) -> Result<WorkerOutcome, WorkerError> {
        let event = params.into_event()?;
        Ok(self.interceptor.handle(event).await?)
    }

    /// Serve until the input closes.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) -> anyhow::Result<()> {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let outcome = self.handle_line(&line).await;
            self.out.emit(&outcome)?;
        }

        tracing::info!("input closed, shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{SharedBuffer, StdioHost};
    use arcade_client::fetch::{FetchResponse, Network, StatusCode};
    use arcade_core::{AppConfig, CacheDb, Error};
    use async_trait::async_trait;

    const ICON: [u8; 10] = [137, 80, 78, 71, 13, 10, 26, 10, 255, 254];

    /// Serves every URL with a small page; fails everything while `offline`.
    struct StaticSite {
        offline: bool,
    }

    #[async_trait]
    impl Network for StaticSite {
        async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error> {
            if self.offline {
                return Err(Error::NetworkFailure("offline".into()));
            }
            if request.url.path() == "/static/pics/icon0.png" {
                return Ok(FetchResponse::new(request.url.clone(), StatusCode::OK, ICON.to_vec()));
            }
            let body = format!("page {}", request.url.path());
            Ok(FetchResponse::new(request.url.clone(), StatusCode::OK, body))
        }
    }

    async fn server(offline: bool) -> (WorkerServer, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let out = Arc::new(LineWriter::new(Box::new(buffer.clone())));
        let db = CacheDb::open_in_memory().await.unwrap();
        let host = Arc::new(StdioHost::new(out.clone()));
        let interceptor =
            Interceptor::new(&AppConfig::default(), db, Arc::new(StaticSite { offline }), host).unwrap();
        (WorkerServer::new(interceptor, out), buffer)
    }

    fn json(line: &OutcomeLine) -> Value {
        serde_json::to_value(line).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_over_lines() {
        let (server, buffer) = server(false).await;

        let installed = json(&server.handle_line(r#"{"id": 1, "event": "install"}"#).await);
        assert_eq!(installed["id"], 1);
        assert_eq!(installed["outcome"], "installed");
        assert_eq!(installed["assets"], 13);
        assert_eq!(installed["phase"], "installed");

        let activated = json(&server.handle_line(r#"{"event": "activate"}"#).await);
        assert_eq!(activated["phase"], "activated");
        assert!(activated.get("id").is_none());
        assert_eq!(buffer.lines()[0]["effect"], "claim_clients");

        let fetched = json(
            &server
                .handle_line(r#"{"event": "fetch", "url": "http://localhost:5000/week", "mode": "navigate"}"#)
                .await,
        );
        assert_eq!(fetched["outcome"], "respond");
        assert_eq!(fetched["source"], "cache");
        assert_eq!(fetched["class"], "navigation");
        assert_eq!(fetched["body"], "page /week");
        assert_eq!(fetched["body_encoding"], "utf8");
    }

    #[tokio::test]
    async fn test_binary_body_is_base64() {
        let (server, _) = server(false).await;
        server.handle_line(r#"{"event": "install"}"#).await;
        server.handle_line(r#"{"event": "activate"}"#).await;

        let line = json(
            &server
                .handle_line(r#"{"event": "fetch", "url": "http://localhost:5000/static/pics/icon0.png"}"#)
                .await,
        );
        assert_eq!(line["source"], "cache");
        assert_eq!(line["body_encoding"], "base64");

        let body = STANDARD.decode(line["body"].as_str().unwrap()).unwrap();
        assert_eq!(body, ICON);
    }

    #[tokio::test]
    async fn test_api_fetch_passes_through() {
        let (server, _) = server(false).await;
        server.handle_line(r#"{"event": "install"}"#).await;
        server.handle_line(r#"{"event": "activate"}"#).await;

        let line = json(&server.handle_line(r#"{"event": "fetch", "url": "http://localhost:5000/api/week-activity"}"#).await);
        assert_eq!(line["outcome"], "passthrough");
        assert_eq!(line["class"], "api");
    }

    #[tokio::test]
    async fn test_failed_install_reports_error() {
        let (server, _) = server(true).await;

        let line = json(&server.handle_line(r#"{"event": "install"}"#).await);
        assert_eq!(line["outcome"], "error");
        assert_eq!(line["code"], "INSTALL_FAILED");
        assert_eq!(line["phase"], "redundant");
    }

    #[tokio::test]
    async fn test_push_then_click() {
        let (server, buffer) = server(false).await;

        let shown = json(&server.handle_line(r#"{"event": "push", "data": {"body": "Ana is playing"}}"#).await);
        assert_eq!(shown["notification"]["title"], "Steam Tracker");
        assert_eq!(shown["notification"]["body"], "Ana is playing");

        let malformed = json(&server.handle_line(r#"{"event": "push", "data": "{oops"}"#).await);
        assert_eq!(malformed["notification"]["body"], "No message");

        let opened = json(&server.handle_line(r#"{"event": "notification_click"}"#).await);
        assert_eq!(opened["url"], "http://localhost:5000/");

        let effects: Vec<Value> = buffer.lines().into_iter().map(|l| l["effect"].clone()).collect();
        assert_eq!(effects, vec!["show_notification", "show_notification", "close_notification", "open_window"]);
    }

    #[tokio::test]
    async fn test_bad_lines() {
        let (server, _) = server(false).await;

        let unknown = json(&server.handle_line(r#"{"event": "sync"}"#).await);
        assert_eq!(unknown["code"], "INVALID_INPUT");

        let bad_url = json(&server.handle_line(r#"{"event": "fetch", "url": "not a url"}"#).await);
        assert_eq!(bad_url["code"], "INVALID_INPUT");

        let garbage = json(&server.handle_line("{").await);
        assert_eq!(garbage["outcome"], "error");
    }

    #[tokio::test]
    async fn test_run_writes_one_outcome_per_line() {
        let (server, buffer) = server(false).await;
        let input = "{\"event\":\"install\"}\n\n{\"event\":\"activate\"}\n";

        server.run(input.as_bytes()).await.unwrap();

        let outcomes: Vec<Value> = buffer.lines().into_iter().filter(|l| l.get("outcome").is_some()).collect();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1]["outcome"], "activated");
    }
}
