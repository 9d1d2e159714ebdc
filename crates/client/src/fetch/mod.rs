//! HTTP fetch pipeline shared by the interceptor, navigator and feeds.
//!
//! ### Network seam
//! - [`Network`] is the one place requests leave the process; components hold
//!   an `Arc<dyn Network>` so tests substitute scripted fakes.
//! - Like a browser `fetch`, a non-success status is still `Ok`; only an
//!   unreachable network is an error. [`FetchResponse::error_for_status`]
//!   converts when a caller needs success.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use std::time::{Duration, Instant};

use arcade_core::{CachedResponse, Error};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};

pub use reqwest::{Method, StatusCode};

pub use self::url::{UrlError, resolve, same_origin};

/// Header tagging programmatic navigations so the server may answer with a fragment.
pub const PARTIAL_NAVIGATION_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// How a request was issued by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

/// Outgoing request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: ::url::Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn get(url: ::url::Url) -> Self {
        Self { method: Method::GET, url, mode: RequestMode::SameOrigin, headers: Vec::new(), body: None }
    }

    /// Top-level page load of `url`.
    pub fn navigate(url: ::url::Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    /// POST with a JSON body.
    pub fn post_json(url: ::url::Url, body: &serde_json::Value) -> Result<Self, Error> {
        let body = serde_json::to_vec(body)?;
        Ok(Self {
            method: Method::POST,
            url,
            mode: RequestMode::SameOrigin,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(Bytes::from(body)),
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after redirects
    pub url: ::url::Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body bytes
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(url: ::url::Url, status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { url, status, headers: Vec::new(), body: body.into() }
    }

    /// Turn a non-success status into `Error::HttpError`.
    pub fn error_for_status(self) -> Result<Self, Error> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(Error::HttpError(format!("{} returned status {}", self.url, self.status.as_u16())))
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    pub fn json(&self) -> Result<serde_json::Value, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Snapshot for a durable cache store.
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse { status: self.status.as_u16(), headers: self.headers.clone(), body: self.body.to_vec() }
    }
}

/// Anything able to put a request on the wire.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. Errors mean the network was unreachable.
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "arcade/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "arcade/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&arcade_core::AppConfig> for FetchConfig {
    fn from(config: &arcade_core::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Self::default() }
    }
}

/// reqwest-backed [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkFailure(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::NetworkFailure(format!("{} {}: {}", request.method, request.url, e)))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect::<Vec<_>>();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::NetworkFailure(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::HttpError(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            content_type = headers
                .iter()
                .find(|(k, _)| k.as_str() == header::CONTENT_TYPE.as_str())
                .map(|(_, v)| v.as_str())
                .unwrap_or(""),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(FetchResponse { url, status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> ::url::Url {
        ::url::Url::parse("http://localhost:5000").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "arcade/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = arcade_core::AppConfig { timeout_ms: 1500, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_error_for_status() {
        let ok = FetchResponse::new(url("/week"), StatusCode::OK, "<main/>");
        assert!(ok.error_for_status().is_ok());

        let failed = FetchResponse::new(url("/week"), StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(matches!(failed.error_for_status(), Err(Error::HttpError(_))));
    }

    #[test]
    fn test_post_json_request() {
        let req = Request::post_json(url("/unsubscribe"), &serde_json::json!({"endpoint": "e"})).unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(br#"{"endpoint":"e"}"#.as_slice()));
    }

    #[test]
    fn test_to_cached() {
        let mut resp = FetchResponse::new(url("/"), StatusCode::OK, "home");
        resp.headers.push(("content-type".into(), "text/html".into()));
        let cached = resp.to_cached();
        assert_eq!(cached.status, 200);
        assert_eq!(cached.header("Content-Type"), Some("text/html"));
        assert_eq!(cached.body, b"home");
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }
}
