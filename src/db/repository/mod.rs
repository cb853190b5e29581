//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table.

mod carry_forward_run;
mod decode;
mod patient;
mod report;
mod schedule;
mod staff;

pub use carry_forward_run::*;
pub use patient::*;
pub use report::*;
pub use schedule::*;
pub use staff::*;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use rusqlite::Connection;
    use uuid::Uuid;

    use super::*;
    use crate::models::*;

    pub fn seed_staff(conn: &Connection, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        insert_staff(
            conn,
            &Staff {
                id,
                first_name: "Asha".into(),
                last_name: "Rao".into(),
                email: format!("{id}@clinic.test"),
                phone: None,
                role,
                session_charge: Some(500.0),
                created_at: NaiveDateTime::default(),
            },
            None,
        )
        .unwrap();
        id
    }

    pub fn seed_patient(conn: &Connection, staff_id: Option<Uuid>, first_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        insert_patient(
            conn,
            &Patient {
                id,
                first_name: first_name.into(),
                last_name: "Patel".into(),
                email: None,
                phone: None,
                staff_id,
                diagnosed: None,
                created_at: NaiveDateTime::default(),
            },
        )
        .unwrap();
        id
    }

    pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn new_entry(
        patient_id: Uuid,
        staff_id: Uuid,
        date: NaiveDate,
        status: ScheduleStatus,
        frequency: Option<i64>,
    ) -> NewScheduleEntry {
        NewScheduleEntry {
            patient_id,
            staff_id,
            date,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 45, 0).unwrap(),
            fees: Some(750.0),
            location: Some("Room 4".into()),
            notes: Some("physiotherapy".into()),
            status,
            session_frequency_days: frequency,
        }
    }
}
