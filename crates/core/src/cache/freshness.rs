//! Freshness-windowed key-value slots.
//!
//! Each page feed owns one slot named after its cache name. Entries are
//! returned whether fresh or stale; callers decide with
//! [`FreshnessEntry::is_fresh`]. A slot holding malformed JSON is removed
//! and reported as absent.

use std::time::Duration;

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Cached payload and the moment it was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessEntry {
    pub payload: Value,
    pub captured_at: DateTime<Utc>,
}

impl FreshnessEntry {
    /// `now - captured_at < ttl`. An entry stamped in the future counts as fresh.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.captured_at).to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }
}

/// On-disk shape of a slot value.
#[derive(Serialize, Deserialize)]
struct Slot {
    data: Value,
    timestamp: i64,
}

impl CacheDb {
    /// Read a slot. Malformed contents are discarded.
    pub async fn read_freshness(&self, name: &str) -> Result<Option<FreshnessEntry>, Error> {
        let slot = name.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result =
                    conn.query_row("SELECT value FROM kv_slots WHERE name = ?1", params![slot], |row| row.get(0));
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match decode_slot(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(name, error = %e, "discarding malformed freshness entry");
                self.remove_freshness(name).await?;
                Ok(None)
            }
        }
    }

    /// Write a slot stamped with the current time.
    pub async fn write_freshness(&self, name: &str, payload: &Value) -> Result<FreshnessEntry, Error> {
        self.write_freshness_at(name, payload, Utc::now()).await
    }

    /// Write a slot stamped with `captured_at`.
    pub async fn write_freshness_at(
        &self, name: &str, payload: &Value, captured_at: DateTime<Utc>,
    ) -> Result<FreshnessEntry, Error> {
        let value = serde_json::to_string(&Slot { data: payload.clone(), timestamp: captured_at.timestamp_millis() })?;
        let slot = name.to_string();
        let updated_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_slots (name, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![slot, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(FreshnessEntry { payload: payload.clone(), captured_at })
    }

    /// Remove a slot. Returns false if it did not exist.
    pub async fn remove_freshness(&self, name: &str) -> Result<bool, Error> {
        let slot = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM kv_slots WHERE name = ?1", params![slot])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

fn decode_slot(raw: &str) -> Result<FreshnessEntry, Error> {
    let slot: Slot = serde_json::from_str(raw)?;
    let captured_at = Utc
        .timestamp_millis_opt(slot.timestamp)
        .single()
        .ok_or_else(|| Error::ParseFailure(format!("timestamp out of range: {}", slot.timestamp)))?;
    Ok(FreshnessEntry { payload: slot.data, captured_at })
}
