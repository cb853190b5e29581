//! Error types for the carry-forward engine.

use thiserror::Error;

use crate::config::ConfigError;
use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum CarryForwardError {
    /// Store unreachable or a statement failed. Fatal to the run.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// One patient's stored history cannot be read. The engine skips the
    /// patient and keeps going.
    #[error("Malformed schedule record for patient {patient_id}: {reason}")]
    MalformedRecord { patient_id: String, reason: String },

    /// The uniqueness index rejected the batch: another writer inserted
    /// the same (patient, date) first. Nothing from this run was committed.
    #[error("Duplicate schedule detected during insert: {0}")]
    DuplicateConflict(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot spawn carry-forward scheduler thread: {0}")]
    SchedulerSpawn(#[source] std::io::Error),

    #[error("Carry-forward run lock poisoned")]
    LockPoisoned,
}

impl CarryForwardError {
    /// Data anomalies are handled per patient; everything else aborts the run.
    pub fn is_data_anomaly(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}
