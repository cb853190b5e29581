//! SQLite-backed schedule store.

use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

use super::error::CarryForwardError;
use super::traits::ScheduleStore;
use crate::db::{self, DatabaseError};
use crate::models::{NewScheduleEntry, ScheduleEntry};

/// Borrows a connection for the duration of one run.
pub struct SqliteScheduleStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteScheduleStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ScheduleStore for SqliteScheduleStore<'_> {
    fn find_open_patient_ids(&self) -> Result<Vec<Uuid>, CarryForwardError> {
        let raw = db::find_open_patient_ids(self.conn)?;
        let mut ids = Vec::with_capacity(raw.len());
        for value in raw {
            match Uuid::parse_str(&value) {
                Ok(id) => ids.push(id),
                Err(_) => {
                    tracing::warn!(patient_id = %value, "Ignoring schedule rows with unparseable patient id");
                }
            }
        }
        Ok(ids)
    }

    fn find_latest_entry(
        &self,
        patient_id: &Uuid,
    ) -> Result<Option<ScheduleEntry>, CarryForwardError> {
        db::get_latest_schedule_for_patient(self.conn, patient_id).map_err(|e| {
            if e.is_bad_row() {
                CarryForwardError::MalformedRecord {
                    patient_id: patient_id.to_string(),
                    reason: e.to_string(),
                }
            } else {
                CarryForwardError::Database(e)
            }
        })
    }

    fn exists(&self, patient_id: &Uuid, date: NaiveDate) -> Result<bool, CarryForwardError> {
        Ok(db::schedule_exists(self.conn, patient_id, date)?)
    }

    fn bulk_insert(
        &self,
        entries: &[NewScheduleEntry],
    ) -> Result<Vec<ScheduleEntry>, CarryForwardError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        db::insert_schedules(self.conn, entries).map_err(|e| match e {
            DatabaseError::ConstraintViolation(detail) => {
                CarryForwardError::DuplicateConflict(detail)
            }
            other => CarryForwardError::Database(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::repository::test_support::*;
    use crate::models::{Role, ScheduleStatus};

    #[test]
    fn bad_row_becomes_malformed_record() {
        let conn = open_memory_database().unwrap();
        let staff = seed_staff(&conn, Role::Staff);
        let patient = seed_patient(&conn, None, "Meera");
        db::insert_schedule(
            &conn,
            &new_entry(patient, staff, day(2024, 1, 1), ScheduleStatus::Scheduled, None),
        )
        .unwrap();
        conn.execute(
            "UPDATE schedules SET start_time = 'noon' WHERE patient_id = ?1",
            params![patient.to_string()],
        )
        .unwrap();

        let store = SqliteScheduleStore::new(&conn);
        let err = store.find_latest_entry(&patient).unwrap_err();
        assert!(err.is_data_anomaly());
    }

    #[test]
    fn unique_violation_becomes_duplicate_conflict() {
        let conn = open_memory_database().unwrap();
        let staff = seed_staff(&conn, Role::Staff);
        let patient = seed_patient(&conn, None, "Meera");
        let entry = new_entry(patient, staff, day(2024, 1, 1), ScheduleStatus::Scheduled, None);
        db::insert_schedule(&conn, &entry).unwrap();

        let store = SqliteScheduleStore::new(&conn);
        let err = store.bulk_insert(&[entry]).unwrap_err();
        assert!(matches!(err, CarryForwardError::DuplicateConflict(_)));
    }

    #[test]
    fn unparseable_patient_ids_are_dropped() {
        let conn = open_memory_database().unwrap();
        let staff = seed_staff(&conn, Role::Staff);
        let patient = seed_patient(&conn, None, "Meera");
        db::insert_schedule(
            &conn,
            &new_entry(patient, staff, day(2024, 1, 1), ScheduleStatus::Scheduled, None),
        )
        .unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys=OFF;
             INSERT INTO schedules (id, patient_id, staff_id, date, start_time, end_time, status, created_at)
             VALUES ('x', 'not-a-uuid', 'y', '2024-01-01', '10:00:00', '11:00:00', 'scheduled', '2024-01-01 00:00:00');
             PRAGMA foreign_keys=ON;",
        )
        .unwrap();

        let store = SqliteScheduleStore::new(&conn);
        assert_eq!(store.find_open_patient_ids().unwrap(), vec![patient]);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let conn = open_memory_database().unwrap();
        let store = SqliteScheduleStore::new(&conn);
        assert!(store.bulk_insert(&[]).unwrap().is_empty());
    }
}
