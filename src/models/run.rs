use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{RunStatus, RunTrigger};

/// One recorded invocation of the carry-forward engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarryForwardRun {
    pub id: Uuid,
    pub run_date: NaiveDate,
    pub trigger: RunTrigger,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub created_count: u32,
    pub skipped_count: u32,
    pub status: RunStatus,
    pub error: Option<String>,
}
