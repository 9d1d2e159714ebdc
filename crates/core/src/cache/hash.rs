//! Request key generation for cache stores.
//!
//! Keys are derived from the uppercased method and the URL with its
//! fragment removed, so `GET /week#top` and `get /week` share an entry.

use sha2::{Digest, Sha256};

/// Normalized identifier of a request: `METHOD url`.
pub fn normalize_request(method: &str, url: &str) -> String {
    let url = url.trim();
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    format!("{} {}", method.trim().to_ascii_uppercase(), url)
}

/// Compute the fixed-length store key for a request.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_request(method, url).as_bytes());
    hex::encode(hasher.finalize())
}
