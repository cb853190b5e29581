use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ScheduleStatus;

/// Storage formats shared by the repository and API layers.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A persisted appointment slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub fees: Option<f64>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: ScheduleStatus,
    pub session_frequency_days: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl ScheduleEntry {
    /// Days between recurring sessions. Unset or non-positive means daily.
    pub fn effective_frequency(&self) -> i64 {
        match self.session_frequency_days {
            Some(days) if days >= 1 => days,
            _ => 1,
        }
    }
}

/// An entry that has not been stored yet: the store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScheduleEntry {
    pub patient_id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub fees: Option<f64>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub status: ScheduleStatus,
    pub session_frequency_days: Option<i64>,
}

impl NewScheduleEntry {
    pub fn into_entry(self, id: Uuid, created_at: NaiveDateTime) -> ScheduleEntry {
        ScheduleEntry {
            id,
            patient_id: self.patient_id,
            staff_id: self.staff_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            fees: self.fees,
            location: self.location,
            notes: self.notes,
            status: self.status,
            session_frequency_days: self.session_frequency_days,
            created_at,
        }
    }
}

/// Schedule row joined with the patient's display name, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleListing {
    #[serde(flatten)]
    pub entry: ScheduleEntry,
    pub patient_first_name: Option<String>,
    pub patient_last_name: Option<String>,
}

/// Parse a time of day as `HH:MM:SS` or `HH:MM`.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Parse a calendar date as `YYYY-MM-DD`, tolerating a trailing time part
/// (`2024-01-02T00:00:00.000Z`).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}
