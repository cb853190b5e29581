use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Primary staff member responsible for the patient.
    pub staff_id: Option<Uuid>,
    pub diagnosed: Option<String>,
    pub created_at: NaiveDateTime,
}
