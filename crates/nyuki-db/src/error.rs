//! Database error types for nyuki-db.

use nyuki_core::errors::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// The addressed row does not exist or belongs to another user.
    #[error("{table} row not found: {id}")]
    NotFound { table: &'static str, id: String },

    /// A constraint (foreign key, uniqueness, check) refused the write.
    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Classify a libSQL error raised by a write statement.
    #[must_use]
    pub fn from_write(e: libsql::Error) -> Self {
        let msg = e.to_string();
        if msg.contains("constraint failed") {
            Self::Constraint(msg)
        } else {
            Self::LibSql(e)
        }
    }
}

impl From<DatabaseError> for BackendError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { table, id } => Self::NotFound {
                collection: table.to_string(),
                id,
            },
            DatabaseError::Constraint(msg) => Self::Rejected(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}
