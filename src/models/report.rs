use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A clinical progress note written by staff after seeing a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Author. Cleared when the staff account is removed.
    pub staff_id: Option<Uuid>,
    pub date: NaiveDate,
    pub health_status: Option<String>,
    pub current_condition: Option<String>,
    pub suggestions: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Report joined with the patient's display name, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ReportListing {
    #[serde(flatten)]
    pub report: Report,
    pub patient_first_name: Option<String>,
    pub patient_last_name: Option<String>,
}
