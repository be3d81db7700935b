//! Error types for the data layer.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors with additional context about which operation failed.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row referenced another row that does not exist.
    #[error("Missing reference: {0}")]
    MissingReference(String),

    /// A stored value could not be decoded into its record type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// The table cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Map a foreign-key violation to [`DbError::MissingReference`];
    /// every other error passes through unchanged.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        let is_fk_violation = err
            .as_database_error()
            .is_some_and(|db| db.is_foreign_key_violation());
        if is_fk_violation {
            Self::MissingReference(what.to_owned())
        } else {
            Self::Postgres(err)
        }
    }
}
