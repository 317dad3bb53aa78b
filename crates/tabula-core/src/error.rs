//! Error types for the Tabula note engine.

use thiserror::Error;

/// Result type alias using Tabula's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Tabula operations.
///
/// Variants double as the failure taxonomy the sync layer classifies remote
/// responses into: [`Error::is_retryable`] is the single source of truth for
/// what the backoff wrapper may retry.
#[derive(Error, Debug)]
pub enum Error {
    /// No valid credential is available; fatal to the current sync attempt.
    #[error("Not signed in")]
    NotSignedIn,

    /// Connectivity or 5xx-class remote failure; retryable with backoff.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Remote quota/throttling signal; retryable with more aggressive backoff.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Remote access-control rejection; requires user re-authorization.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Local validation failure on an attachment (bad type or too large).
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    /// A remote or local object failed to decode under the current or legacy format.
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    /// Another sync of the same kind is in progress.
    #[error("Sync lock busy")]
    LockBusy,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The underlying storage engine failed to open.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the backoff wrapper may retry after this error.
    ///
    /// Only connectivity-class failures qualify; validation, permission, and
    /// decode errors propagate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientNetwork(_) | Error::RateLimited(_))
    }

    /// Classify an HTTP response status (plus response body, for services that
    /// report throttling as 403) into the error taxonomy.
    pub fn from_status(status: u16, context: &str, body: &str) -> Error {
        match status {
            401 => Error::NotSignedIn,
            403 if body.to_ascii_lowercase().contains("ratelimitexceeded") => {
                Error::RateLimited(format!("{context}: {status}"))
            }
            403 => Error::PermissionDenied(format!("{context}: {status}")),
            404 => Error::NotFound(context.to_string()),
            429 => Error::RateLimited(format!("{context}: {status}")),
            s if s >= 500 => Error::TransientNetwork(format!("{context}: {status}")),
            s => Error::Internal(format!("{context}: unexpected status {s}")),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            return Error::TransientNetwork(e.to_string());
        }
        match e.status() {
            Some(status) => Error::from_status(status.as_u16(), "request", ""),
            None => Error::TransientNetwork(e.to_string()),
        }
    }
}
