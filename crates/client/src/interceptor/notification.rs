//! Push payload decoding and notification defaults.

use arcade_core::Error;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Steam Tracker";
pub const DEFAULT_BODY: &str = "No message";
pub const DEFAULT_ICON: &str = "/static/pics/icon0.png";
pub const VIBRATE_PATTERN: [u32; 3] = [200, 100, 200];

/// Optional fields a push message may carry.
#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
}

/// Notification handed to the host for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.into(),
            body: DEFAULT_BODY.into(),
            icon: DEFAULT_ICON.into(),
            badge: DEFAULT_ICON.into(),
            vibrate: VIBRATE_PATTERN.to_vec(),
        }
    }
}

impl Notification {
    /// Build from a push body. Missing fields take defaults; an unparseable
    /// body is logged and yields the default notification.
    pub fn from_push(data: Option<&[u8]>) -> Self {
        let payload = match data.map(parse_payload).transpose() {
            Ok(payload) => payload.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed push payload");
                PushPayload::default()
            }
        };

        let defaults = Self::default();
        Self {
            title: payload.title.filter(|s| !s.is_empty()).unwrap_or(defaults.title),
            body: payload.body.filter(|s| !s.is_empty()).unwrap_or(defaults.body),
            icon: payload.icon.filter(|s| !s.is_empty()).unwrap_or(defaults.icon),
            ..defaults
        }
    }
}

fn parse_payload(data: &[u8]) -> Result<PushPayload, Error> {
    serde_json::from_slice(data).map_err(|e| Error::ParseFailure(format!("push payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_body_uses_defaults() {
        let n = Notification::from_push(None);
        assert_eq!(n.title, "Steam Tracker");
        assert_eq!(n.body, "No message");
        assert_eq!(n.icon, "/static/pics/icon0.png");
        assert_eq!(n.badge, "/static/pics/icon0.png");
        assert_eq!(n.vibrate, vec![200, 100, 200]);
    }

    #[test]
    fn test_partial_payload() {
        let n = Notification::from_push(Some(br#"{"title":"New achievement"}"#));
        assert_eq!(n.title, "New achievement");
        assert_eq!(n.body, "No message");
    }

    #[test]
    fn test_full_payload_keeps_badge() {
        let n = Notification::from_push(Some(br#"{"title":"t","body":"b","icon":"/i.png"}"#));
        assert_eq!(n.icon, "/i.png");
        assert_eq!(n.badge, DEFAULT_ICON);
    }

    #[test]
    fn test_malformed_payload() {
        assert_eq!(Notification::from_push(Some(b"not json")), Notification::default());
    }
}
