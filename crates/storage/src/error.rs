//! Typed error enum for the storage layer.
//!
//! Callers match on specific failure modes (missing row, broken reference,
//! missing destination context) instead of downcasting opaque boxes.

use thiserror::Error;

/// Storage-layer error with variants covering every expected failure mode.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Row not found for expected-present entity.
    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A row points at a destination row that does not exist.
    #[error("foreign key violation: {target} {id} does not exist")]
    ForeignKey { target: String, id: String },

    /// The destination lacks the pre-created org or admin user.
    #[error("destination has no active {0}; create it from the destination frontend first")]
    MissingContext(&'static str),

    /// A value could not be converted to its column type.
    #[error("invalid value for {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    /// SQL / connection / timeout failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Row data could not be deserialized into domain type.
    #[error("data corruption: {context}")]
    DataCorruption {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)))
    }

    /// Whether this error is a referential-integrity violation.
    pub const fn is_foreign_key(&self) -> bool {
        matches!(self, Self::ForeignKey { .. })
    }
}

/// Custom `From<sqlx::Error>`, not blanket `#[from]`.
///
/// - `RowNotFound` → `NotFound` (generic; callers remap with entity context)
/// - SQLSTATE 23505 → `Duplicate`
/// - SQLSTATE 23503 → `ForeignKey`
/// - Everything else → `Database`
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound { entity: "row", id: "unknown".into() },
            sqlx::Error::Database(db_err) if db_err.code().is_some_and(|c| c == "23505") => {
                Self::Duplicate(db_err.message().to_owned())
            },
            sqlx::Error::Database(db_err) if db_err.code().is_some_and(|c| c == "23503") => {
                Self::ForeignKey {
                    target: db_err.constraint().unwrap_or("constraint").to_owned(),
                    id: db_err.message().to_owned(),
                }
            },
            _ => Self::Database(err),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption {
            context: "JSON serialization/deserialization".to_owned(),
            source: Box::new(err),
        }
    }
}
