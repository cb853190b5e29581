//! Transport-agnostic application state.
//!
//! `CoreState` is the single shared state between the HTTP server, the
//! background scheduler and the CLI. Each caller opens its own SQLite
//! connection; the carry-forward run lock lives here so that every trigger
//! in the process goes through the same mutex.

use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::carry_forward::{run_carry_forward, CarryForwardError, CarryForwardReport, Clock};
use crate::config::AppConfig;
use crate::db;
use crate::models::RunTrigger;

pub struct CoreState {
    config: AppConfig,
    /// Serializes carry-forward runs within this process.
    carry_forward_lock: Mutex<()>,
}

impl CoreState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            carry_forward_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        &self.config.db_path
    }

    /// Open a connection to the clinic database, creating the parent
    /// directory and applying migrations on first use.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        if let Some(parent) = self.config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        db::open_database(&self.config.db_path).map_err(CoreError::Database)
    }

    /// "Today" is always derived in the configured offset.
    pub fn clock(&self) -> Clock {
        Clock::new(self.config.utc_offset)
    }

    pub fn carry_forward_lock(&self) -> &Mutex<()> {
        &self.carry_forward_lock
    }

    /// Run carry-forward for `date`, or for today in the configured offset.
    pub fn carry_forward(
        &self,
        date: Option<NaiveDate>,
        trigger: RunTrigger,
    ) -> Result<CarryForwardReport, CoreError> {
        let conn = self.open_db()?;
        let today = date.unwrap_or_else(|| self.clock().today());
        Ok(run_carry_forward(&conn, &self.carry_forward_lock, today, trigger)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Carry-forward failed: {0}")]
    CarryForward(#[from] CarryForwardError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
