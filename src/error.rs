//! Store error types for typed error handling.
//!
//! Every fallible store operation returns [`Error`]. Errors are surfaced to
//! the caller as-is; the store never retries internally.

use std::time::Duration;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Exact read found no live record.
    #[error("record not found: {key}")]
    NotFound { key: String },

    /// Key rejected before reaching the database.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// No endpoint reachable, or the shared handle could not be acquired.
    #[error("connection error: {0}")]
    Connection(String),

    /// Upsert rejected by the database.
    #[error("write failed for key '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Schema setup failed.
    #[error("schema initialization failed: {0}")]
    Initialization(String),

    /// Operation attempted before a successful `init()`.
    #[error("store is not initialized")]
    NotInitialized,

    /// Operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Operation attempted after `close()`.
    #[error("store is closed")]
    Closed,

    /// Invalid store configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// Blocking worker panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Coarse error classification for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Connection,
    ConstraintViolation,
    WriteFailed,
    Initialization,
    Timeout,
    Closed,
    Config,
    Backend,
}

impl Error {
    /// Create a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a connection error.
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection(reason.into())
    }

    /// Create a write error for the given key.
    pub fn write(key: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Write {
            key: key.into(),
            source,
        }
    }

    /// Returns true if this is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidKey(_) => ErrorKind::ConstraintViolation,
            Self::Write { source, .. } if is_constraint_violation(source) => {
                ErrorKind::ConstraintViolation
            },
            Self::Write { .. } => ErrorKind::WriteFailed,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Initialization(_) | Self::NotInitialized => ErrorKind::Initialization,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Closed => ErrorKind::Closed,
            Self::Config(_) => ErrorKind::Config,
            Self::Backend(_) | Self::Join(_) => ErrorKind::Backend,
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::not_found("k").kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::InvalidKey("empty".into()).kind(),
            ErrorKind::ConstraintViolation
        );
        assert_eq!(Error::connection("down").kind(), ErrorKind::Connection);
        assert_eq!(Error::NotInitialized.kind(), ErrorKind::Initialization);
        assert_eq!(
            Error::Timeout(Duration::from_millis(5)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::Closed.kind(), ErrorKind::Closed);
    }

    #[test]
    fn test_write_error_kind() {
        let generic = Error::write("k", rusqlite::Error::InvalidQuery);
        assert_eq!(generic.kind(), ErrorKind::WriteFailed);
        assert!(generic.to_string().starts_with("write failed for key 'k'"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("missing").is_not_found());
        assert!(!Error::Closed.is_not_found());
        assert_eq!(
            Error::not_found("missing").to_string(),
            "record not found: missing"
        );
    }
}
