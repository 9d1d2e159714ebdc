//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ARCADE_*)
//! 2. TOML config file (if ARCADE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Assets pre-populated into the static store at install time.
pub const DEFAULT_SHELL_MANIFEST: &[&str] = &[
    "/",
    "/week",
    "/achievements",
    "/friends",
    "/profile",
    "/static/manifest.json",
    "/static/css/components/loaders.css",
    "/static/pics/icon0.png",
    "https://cdn.tailwindcss.com",
    "https://cdn.jsdelivr.net/npm/chart.js",
    "/static/js/pages/friends.js",
    "/static/js/pages/week.js",
    "/static/js/pages/index.js",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ARCADE_*)
/// 2. TOML config file (if ARCADE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the interceptor is installed for.
    ///
    /// Set via ARCADE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via ARCADE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Generation of cached static assets. Stores not named for it are
    /// removed on activation.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path prefix of static assets.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,

    /// Path prefix of backend API calls, never intercepted.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path prefix of the interceptor's own script, never intercepted.
    #[serde(default = "default_worker_path")]
    pub worker_path: String,

    /// Page served when a navigation fails offline.
    #[serde(default = "default_fallback_page")]
    pub fallback_page: String,

    /// Shell assets cached at install time.
    #[serde(default = "default_shell_manifest")]
    pub shell_manifest: Vec<String>,

    /// Application server key for push subscriptions (base64url).
    ///
    /// Set via ARCADE_VAPID_PUBLIC_KEY environment variable.
    #[serde(default)]
    pub vapid_public_key: Option<String>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause between fade-out and fade-in when the display surface has no
    /// atomic view transition.
    #[serde(default = "default_transition_delay_ms")]
    pub transition_delay_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./arcade-cache.sqlite")
}

fn default_cache_version() -> String {
    "core-v5".into()
}

fn default_static_prefix() -> String {
    "/static/".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_worker_path() -> String {
    "/static/service-worker".into()
}

fn default_fallback_page() -> String {
    "/".into()
}

fn default_shell_manifest() -> Vec<String> {
    DEFAULT_SHELL_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_user_agent() -> String {
    "arcade/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_transition_delay_ms() -> u64 {
    200
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            db_path: default_db_path(),
            cache_version: default_cache_version(),
            static_prefix: default_static_prefix(),
            api_prefix: default_api_prefix(),
            worker_path: default_worker_path(),
            fallback_page: default_fallback_page(),
            shell_manifest: default_shell_manifest(),
            vapid_public_key: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            transition_delay_ms: default_transition_delay_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Fade delay as Duration.
    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }

    /// Name of the static store for the current cache version.
    pub fn static_store_name(&self) -> String {
        format!("{}_static", self.cache_version)
    }

    /// Name of the api store for the current cache version.
    pub fn api_store_name(&self) -> String {
        format!("{}_api", self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ARCADE_`
    /// 2. TOML file from `ARCADE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be read, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ARCADE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ARCADE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check if the push application server key is available (for deferred validation).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the key is not set.
    pub fn require_vapid_public_key(&self) -> Result<&str, ConfigError> {
        self.vapid_public_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "vapid_public_key".into(),
            hint: "Set ARCADE_VAPID_PUBLIC_KEY environment variable".into(),
        })
    }
}
