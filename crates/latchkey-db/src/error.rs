//! Database-specific error types and conversions.

use std::fmt;

use latchkey_core::error::LatchkeyError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    Conflict { entity: String, key: String },

    #[error("Corrupt {entity} row: {reason}")]
    Decode { entity: String, reason: String },
}

impl DbError {
    /// Classify a failed write. Unique-index violations become
    /// [`DbError::Conflict`] keyed by `key`.
    pub(crate) fn write(err: impl fmt::Display, entity: &str, key: &str) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Conflict {
                entity: entity.into(),
                key: key.into(),
            }
        } else {
            DbError::Query(message)
        }
    }

    pub(crate) fn decode(entity: &str, reason: impl fmt::Display) -> Self {
        DbError::Decode {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<DbError> for LatchkeyError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict { entity, key } if entity == "user" => {
                LatchkeyError::UserAlreadyExists { email: key }
            }
            other => LatchkeyError::Database(other.to_string()),
        }
    }
}
