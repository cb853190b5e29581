//! Decision and report types for a carry-forward run.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{NewScheduleEntry, ScheduleEntry};

/// Why a patient did not get an entry on this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Listed as open, but no entry could be found.
    NoEntries,
    NotDue { day_gap: i64, frequency: i64 },
    /// Most recent entry lies after `today`.
    FutureDated { last_date: NaiveDate },
    AlreadyScheduled,
    MalformedRecord { reason: String },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoEntries => "no_entries",
            Self::NotDue { .. } => "not_due",
            Self::FutureDated { .. } => "future_dated",
            Self::AlreadyScheduled => "already_scheduled",
            Self::MalformedRecord { .. } => "malformed_record",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPatient {
    pub patient_id: String,
    pub reason: SkipReason,
}

/// Outcome of the read and decide phases, before anything is written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CarryForwardPlan {
    pub to_create: Vec<NewScheduleEntry>,
    pub skipped: Vec<SkippedPatient>,
}

/// What one run did.
#[derive(Debug, Clone, Serialize)]
pub struct CarryForwardReport {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub created: Vec<ScheduleEntry>,
    pub skipped: Vec<SkippedPatient>,
    pub duration_ms: u64,
}

impl CarryForwardReport {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}
