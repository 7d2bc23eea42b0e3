//! Unified error types for stratus.
//!
//! Every fallible engine and storage operation surfaces one of these
//! variants at its boundary. Parse failures inside the HTTP semantics
//! layer are not errors: an unparseable directive or date degrades to
//! "absent" (or "already expired" for `Expires`) without propagating.

use tokio_rusqlite::rusqlite;

/// Unified error type for the caching engine and its storage tiers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a response time earlier than its
    /// request time, or an unparseable URI).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Durable-tier database operation failed.
    #[error("database error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// A stored entry could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation attempted on a closed storage tier.
    #[error("storage is closed")]
    StorageClosed,
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::StorageClosed,
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::StorageClosed,
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::ConnectionClosed => Error::StorageClosed,
            other => Error::Database(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
