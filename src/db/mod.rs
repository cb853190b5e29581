pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid stored value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// Map a rusqlite UNIQUE/CHECK/FK failure to `ConstraintViolation`,
    /// passing every other error through.
    pub fn from_write(err: rusqlite::Error, what: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let detail = msg.clone().unwrap_or_else(|| e.to_string());
                DatabaseError::ConstraintViolation(format!("{what}: {detail}"))
            }
            _ => DatabaseError::Sqlite(err),
        }
    }

    /// True for stored-data problems that concern a single row rather
    /// than the store itself.
    pub fn is_bad_row(&self) -> bool {
        matches!(
            self,
            DatabaseError::InvalidEnum { .. } | DatabaseError::InvalidValue { .. }
        )
    }
}
