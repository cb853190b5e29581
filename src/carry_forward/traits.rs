//! The engine's contract with the persisted schedule collection.

use chrono::NaiveDate;
use uuid::Uuid;

use super::error::CarryForwardError;
use crate::models::{NewScheduleEntry, ScheduleEntry};

pub trait ScheduleStore {
    /// Distinct patients with at least one entry that is neither completed
    /// nor cancelled.
    fn find_open_patient_ids(&self) -> Result<Vec<Uuid>, CarryForwardError>;

    /// The patient's entry with the greatest date, whatever its status.
    /// A stored row that cannot be decoded is reported as
    /// `CarryForwardError::MalformedRecord`.
    fn find_latest_entry(
        &self,
        patient_id: &Uuid,
    ) -> Result<Option<ScheduleEntry>, CarryForwardError>;

    fn exists(&self, patient_id: &Uuid, date: NaiveDate) -> Result<bool, CarryForwardError>;

    /// Insert all entries atomically, returning them with store-assigned
    /// ids and timestamps.
    fn bulk_insert(
        &self,
        entries: &[NewScheduleEntry],
    ) -> Result<Vec<ScheduleEntry>, CarryForwardError>;
}
