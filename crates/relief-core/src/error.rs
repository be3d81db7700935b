//! Error types for the coordination core.
//!
//! Every public operation returns [`CoreError`]. Validation and not-found
//! failures are detected before any side effect; store failures may occur
//! after earlier steps of a multi-step operation have committed.

use relief_db::DbError;
use validator::ValidationErrors;

/// Stable, client-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller input was missing or malformed.
    Validation,
    /// The referenced record does not exist.
    NotFound,
    /// An upstream collaborator (geocoder, feed) failed.
    Upstream,
    /// The backing store failed.
    Internal,
}

impl ErrorKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Upstream => "upstream",
            Self::Internal => "internal",
        }
    }
}

/// Errors surfaced by coordination operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Caller input was missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An upstream collaborator failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(DbError),
}

impl CoreError {
    /// Stable classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::MissingReference(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

impl From<ValidationErrors> for CoreError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map_or_else(|| e.code.to_string(), ToString::to_string)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{field}: {detail}")
            })
            .collect();
        fields.sort();
        Self::Validation(fields.join("; "))
    }
}

/// Failure inside the TTL cache. Never leaves the cache module; logged
/// and treated as a miss or a no-op.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CacheFault {
    /// The store read or write failed.
    #[error("cache store: {0}")]
    Store(#[from] DbError),

    /// The value could not be encoded or decoded.
    #[error("cache value: {0}")]
    Codec(#[from] serde_json::Error),
}
