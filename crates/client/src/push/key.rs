//! Application server key decoding.

use arcade_core::Error;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

/// Decode a base64url application server key into raw bytes.
///
/// Keys are often stored with their `=` padding stripped, and some are
/// copied out of tools that emit the standard alphabet, so padding is
/// restored to a multiple of four and `+`/`/` are folded into the url-safe
/// alphabet before decoding.
pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, Error> {
    let key = key.trim().trim_end_matches('=');
    let padding = (4 - key.len() % 4) % 4;

    let mut normalized = String::with_capacity(key.len() + padding);
    normalized.extend(key.chars().map(|c| match c {
        '+' => '-',
        '/' => '_',
        c => c,
    }));
    normalized.extend(std::iter::repeat_n('=', padding));

    URL_SAFE
        .decode(normalized.as_bytes())
        .map_err(|e| Error::ParseFailure(format!("application server key: {}", e)))
}
