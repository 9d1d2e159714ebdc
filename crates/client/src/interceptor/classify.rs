//! Request classification.
//!
//! Order of checks:
//! 1. Other origin → static asset if listed in the shell manifest, else pass through
//! 2. API prefix → pass through
//! 3. Interceptor's own script → pass through
//! 4. Navigate mode → navigation
//! 5. Static prefix or manifest path → static asset
//! 6. Everything else → pass through

use std::collections::HashSet;

use arcade_core::{AppConfig, Error};
use url::Url;

use crate::fetch::{Request, RequestMode, resolve, same_origin};

/// Serving bucket of a request. Derived per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    Navigation,
    StaticAsset,
    Api,
    OtherOrigin,
    /// The interceptor's own source.
    WorkerScript,
    /// Same origin, neither a page load nor a static asset.
    Other,
}

/// Classifies requests for one origin and shell manifest.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    static_prefix: String,
    api_prefix: String,
    worker_path: String,
    manifest: Vec<Url>,
    manifest_urls: HashSet<String>,
    manifest_paths: HashSet<String>,
}

impl Classifier {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {}", config.origin, e)))?;

        let manifest = config
            .shell_manifest
            .iter()
            .map(|entry| resolve(&origin, entry).map_err(|e| Error::InvalidUrl(format!("{}: {}", entry, e))))
            .collect::<Result<Vec<_>, _>>()?;

        let manifest_urls = manifest.iter().map(|u| u.as_str().to_string()).collect();
        let manifest_paths = manifest
            .iter()
            .filter(|u| same_origin(u, &origin))
            .map(|u| u.path().to_string())
            .collect();

        Ok(Self {
            origin,
            static_prefix: config.static_prefix.clone(),
            api_prefix: config.api_prefix.clone(),
            worker_path: config.worker_path.clone(),
            manifest,
            manifest_urls,
            manifest_paths,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolved shell manifest, in configured order.
    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    fn in_manifest(&self, url: &Url, same: bool) -> bool {
        let mut canonical = url.clone();
        canonical.set_fragment(None);
        self.manifest_urls.contains(canonical.as_str()) || (same && self.manifest_paths.contains(url.path()))
    }

    pub fn classify(&self, request: &Request) -> ResourceClass {
        let url = &request.url;
        let same = same_origin(url, &self.origin);
        let path = url.path();

        if !same {
            return if self.in_manifest(url, same) { ResourceClass::StaticAsset } else { ResourceClass::OtherOrigin };
        }
        if path.starts_with(&self.api_prefix) {
            return ResourceClass::Api;
        }
        if path.starts_with(&self.worker_path) {
            return ResourceClass::WorkerScript;
        }
        if request.mode == RequestMode::Navigate {
            return ResourceClass::Navigation;
        }
        if path.starts_with(&self.static_prefix) || self.in_manifest(url, same) {
            return ResourceClass::StaticAsset;
        }
        ResourceClass::Other
    }
}
