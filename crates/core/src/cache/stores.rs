//! Named request/response stores.
//!
//! A store only exists after an explicit [`CacheDb::open_store`]; writes
//! through a handle whose store was deleted fail instead of recreating it.
//! Concurrent `put`s for the same key are last-write-wins.

use std::collections::BTreeSet;

use super::connection::CacheDb;
use super::hash::{compute_request_key, normalize_request};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Serialized response snapshot held by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One request/response pair for a batch write.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub method: String,
    pub url: String,
    pub response: CachedResponse,
}

/// Handle to one opened store.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    name: String,
}

/// Row ready to insert, serialized outside the database thread.
struct EntryRow {
    key: String,
    method: String,
    url: String,
    status: u16,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(method: &str, url: &str, response: &CachedResponse) -> Result<Self, Error> {
        Ok(Self {
            key: compute_request_key(method, url),
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            status: response.status,
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.clone(),
        })
    }
}

fn store_exists(conn: &rusqlite::Connection, name: &str) -> Result<bool, Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn insert_row(conn: &rusqlite::Connection, store: &str, row: &EntryRow, stored_at: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO cache_entries (store, request_key, method, url, status, headers_json, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(store, request_key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![store, &row.key, &row.method, &row.url, row.status, &row.headers_json, &row.body, stored_at],
    )?;
    Ok(())
}

fn read_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u16, String, Vec<u8>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_response((status, headers_json, body): (u16, String, Vec<u8>)) -> Result<CachedResponse, Error> {
    let headers = serde_json::from_str(&headers_json)?;
    Ok(CachedResponse { status, headers, body })
}

impl CacheDb {
    /// Open a store, creating it if it does not exist yet.
    pub async fn open_store(&self, name: &str) -> Result<CacheStore, Error> {
        let store = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_stores (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![store, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheStore { db: self.clone(), name: name.to_string() })
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no store had that name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every existing store.
    pub async fn list_store_names(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up across all stores, oldest store first.
    pub async fn match_any(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let key = compute_request_key(method, url);
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<(u16, String, Vec<u8>)>, Error> {
                let result = conn.query_row(
                    "SELECT e.status, e.headers_json, e.body
                    FROM cache_entries e JOIN cache_stores s ON s.name = e.store
                    WHERE e.request_key = ?1
                    ORDER BY s.created_at ASC, s.rowid ASC
                    LIMIT 1",
                    params![key],
                    read_response,
                );
                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_response).transpose()
    }
}

impl CacheStore {
    /// Store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a request in this store.
    pub async fn match_request(&self, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let key = compute_request_key(method, url);
        let store = self.name.clone();
        let raw = self
            .db
            .conn
            .call(move |conn| -> Result<Option<(u16, String, Vec<u8>)>, Error> {
                let result = conn.query_row(
                    "SELECT status, headers_json, body FROM cache_entries WHERE store = ?1 AND request_key = ?2",
                    params![store, key],
                    read_response,
                );
                match result {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_response).transpose()
    }

    /// Insert or replace the response for a request.
    pub async fn put(&self, method: &str, url: &str, response: &CachedResponse) -> Result<(), Error> {
        let row = EntryRow::new(method, url, response)?;
        let store = self.name.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                if !store_exists(conn, &store)? {
                    return Err(Error::StoreMissing(store));
                }
                insert_row(conn, &store, &row, &stored_at)
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(store = %self.name, request = %normalize_request(method, url), "cache put");
        Ok(())
    }

    /// Write a batch of entries in one transaction; either all land or none do.
    pub async fn put_all(&self, entries: &[CacheEntry]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|e| EntryRow::new(&e.method, &e.url, &e.response))
            .collect::<Result<Vec<_>, _>>()?;
        let store = self.name.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                if !store_exists(&tx, &store)? {
                    return Err(Error::StoreMissing(store));
                }
                for row in &rows {
                    insert_row(&tx, &store, row, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Normalized requests (`METHOD url`) held by this store, sorted.
    pub async fn requests(&self) -> Result<Vec<String>, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM cache_entries WHERE store = ?1")?;
                let mut requests = stmt
                    .query_map(params![store], |row| {
                        Ok(normalize_request(&row.get::<_, String>(0)?, &row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                requests.sort();
                Ok(requests)
            })
            .await
            .map_err(Error::from)
    }
}
