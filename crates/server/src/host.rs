//! Host effects written as JSON lines.
//!
//! The embedding runtime reads stdout line by line. Outcomes and effects
//! share the stream; effects carry an `effect` field, outcomes an `outcome`.

use std::io::Write;
use std::sync::{Arc, Mutex};

use arcade_client::interceptor::{Notification, WorkerHost};
use arcade_core::Error;
use async_trait::async_trait;
use serde::Serialize;
use url::Url;

/// Serialized, line-at-a-time writer shared by the handler and the host.
pub struct LineWriter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl LineWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Write `value` as one JSON line and flush.
    pub fn emit<T: Serialize>(&self, value: &T) -> Result<(), Error> {
        let line = serde_json::to_string(value)?;
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
enum Effect<'a> {
    ClaimClients,
    ShowNotification { notification: &'a Notification },
    CloseNotification { title: &'a str },
    OpenWindow { url: &'a str },
}

/// [`WorkerHost`] that asks the embedding runtime to act by writing effect lines.
pub struct StdioHost {
    out: Arc<LineWriter>,
}

impl StdioHost {
    pub fn new(out: Arc<LineWriter>) -> Self {
        Self { out }
    }
}

#[async_trait]
impl WorkerHost for StdioHost {
    async fn claim_clients(&self) -> Result<(), Error> {
        self.out.emit(&Effect::ClaimClients)
    }

    async fn show_notification(&self, notification: &Notification) -> Result<(), Error> {
        self.out.emit(&Effect::ShowNotification { notification })
    }

    async fn close_notification(&self, notification: &Notification) -> Result<(), Error> {
        self.out.emit(&Effect::CloseNotification { title: &notification.title })
    }

    async fn open_window(&self, url: &Url) -> Result<(), Error> {
        self.out.emit(&Effect::OpenWindow { url: url.as_str() })
    }
}

/// In-memory sink for tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub fn lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_effects_are_json_lines() {
        let buffer = SharedBuffer::default();
        let host = StdioHost::new(Arc::new(LineWriter::new(Box::new(buffer.clone()))));

        host.claim_clients().await.unwrap();
        host.show_notification(&Notification::default()).await.unwrap();
        host.open_window(&Url::parse("http://localhost:5000/").unwrap()).await.unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["effect"], "claim_clients");
        assert_eq!(lines[1]["notification"]["title"], "Steam Tracker");
        assert_eq!(lines[1]["notification"]["vibrate"][1], 100);
        assert_eq!(lines[2], serde_json::json!({"effect": "open_window", "url": "http://localhost:5000/"}));
    }
}
