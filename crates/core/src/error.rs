//! Unified error types for the arcade delivery core.
//!
//! Every message carries a stable code prefix so logs and the worker's
//! stdio protocol can be matched on without parsing prose.

use tokio_rusqlite::rusqlite;

/// Unified error types for the delivery core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network unreachable or the request could not be sent.
    #[error("NETWORK_FAILURE: {0}")]
    NetworkFailure(String),

    /// The network answered with a non-success status.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Push permission refused by the user.
    #[error("PERMISSION_DENIED: {0}")]
    PermissionDenied(String),

    /// Worker or push primitives are absent on this platform.
    #[error("PLATFORM_UNSUPPORTED: {0}")]
    PlatformUnsupported(String),

    /// Subscribe/unsubscribe call to the backend failed after the
    /// local platform state already changed.
    #[error("BACKEND_SYNC_FAILURE: {0}")]
    BackendSyncFailure(String),

    /// Malformed cached or fetched JSON.
    #[error("PARSE_FAILURE: {0}")]
    ParseFailure(String),

    /// A shell manifest asset could not be fetched during install.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// A lifecycle event arrived in a phase that cannot handle it.
    #[error("INVALID_PHASE: {0}")]
    InvalidPhase(String),

    /// The component has not finished initializing.
    #[error("NOT_READY: {0}")]
    NotReady(String),

    /// The cache store behind a handle no longer exists.
    #[error("STORE_MISSING: {0}")]
    StoreMissing(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Local I/O failed (directories, stdio).
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether a retry could succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::NetworkFailure(_) | Error::HttpError(_) | Error::BackendSyncFailure(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseFailure(err.to_string())
    }
}
