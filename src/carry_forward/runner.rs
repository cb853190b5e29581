//! Run driver: serializes runs, executes the engine against SQLite and
//! records the outcome in `carry_forward_runs`.

use std::sync::Mutex;

use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

use super::engine::CarryForwardEngine;
use super::error::CarryForwardError;
use super::store::SqliteScheduleStore;
use super::types::{CarryForwardPlan, CarryForwardReport};
use crate::db;
use crate::models::{CarryForwardRun, RunStatus, RunTrigger};

/// Run the engine for `today` while holding `lock`.
///
/// Every attempt, successful or not, is recorded. Failing to record is
/// logged and does not change the result.
pub fn run_carry_forward(
    conn: &Connection,
    lock: &Mutex<()>,
    today: NaiveDate,
    trigger: RunTrigger,
) -> Result<CarryForwardReport, CarryForwardError> {
    let _guard = lock.lock().map_err(|_| CarryForwardError::LockPoisoned)?;

    let started_at = db::now_timestamp();
    tracing::info!(run_date = %today, trigger = trigger.as_str(), "Carry-forward run starting");

    let store = SqliteScheduleStore::new(conn);
    let result = CarryForwardEngine::new().run(&store, today);

    let run = match &result {
        Ok(report) => {
            tracing::info!(
                run_date = %today,
                created = report.created_count(),
                skipped = report.skipped_count(),
                duration_ms = report.duration_ms,
                "Carry-forward run completed"
            );
            CarryForwardRun {
                id: report.run_id,
                run_date: today,
                trigger,
                started_at,
                finished_at: Some(db::now_timestamp()),
                created_count: report.created_count() as u32,
                skipped_count: report.skipped_count() as u32,
                status: RunStatus::Succeeded,
                error: None,
            }
        }
        Err(e) => {
            tracing::error!(run_date = %today, error = %e, "Carry-forward run failed");
            CarryForwardRun {
                id: Uuid::new_v4(),
                run_date: today,
                trigger,
                started_at,
                finished_at: Some(db::now_timestamp()),
                created_count: 0,
                skipped_count: 0,
                status: RunStatus::Failed,
                error: Some(e.to_string()),
            }
        }
    };

    if let Err(e) = db::insert_carry_forward_run(conn, &run) {
        tracing::warn!(run_id = %run.id, error = %e, "Failed to record carry-forward run");
    }

    result
}

/// Compute what a run would create without writing anything.
pub fn preview_carry_forward(
    conn: &Connection,
    today: NaiveDate,
) -> Result<CarryForwardPlan, CarryForwardError> {
    let store = SqliteScheduleStore::new(conn);
    CarryForwardEngine::new().plan(&store, today)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use super::*;
    use crate::db::repository::test_support::*;
    use crate::db::sqlite::{open_database, open_memory_database};
    use crate::models::{Role, ScheduleStatus};

    #[test]
    fn successful_run_is_recorded() {
        let conn = open_memory_database().unwrap();
        let staff = seed_staff(&conn, Role::Staff);
        let patient = seed_patient(&conn, Some(staff), "Meera");
        db::insert_schedule(
            &conn,
            &new_entry(patient, staff, day(2024, 1, 1), ScheduleStatus::Scheduled, None),
        )
        .unwrap();

        let lock = Mutex::new(());
        let report = run_carry_forward(&conn, &lock, day(2024, 1, 2), RunTrigger::Cli).unwrap();
        assert_eq!(report.created_count(), 1);

        let runs = db::list_carry_forward_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, report.run_id);
        assert_eq!(runs[0].status, RunStatus::Succeeded);
        assert_eq!(runs[0].trigger, RunTrigger::Cli);
        assert_eq!(runs[0].created_count, 1);
    }

    #[test]
    fn failed_run_is_recorded_with_error() {
        let conn = open_memory_database().unwrap();
        let staff = seed_staff(&conn, Role::Staff);
        let patient = seed_patient(&conn, Some(staff), "Meera");
        db::insert_schedule(
            &conn,
            &new_entry(patient, staff, day(2024, 1, 1), ScheduleStatus::Scheduled, None),
        )
        .unwrap();
        // Make the batch insert fail while reads still succeed
        conn.execute_batch(
            "CREATE TRIGGER reject_inserts BEFORE INSERT ON schedules
             BEGIN SELECT RAISE(ABORT, 'read only'); END;",
        )
        .unwrap();

        let lock = Mutex::new(());
        let result = run_carry_forward(&conn, &lock, day(2024, 1, 2), RunTrigger::Manual);
        assert!(result.is_err());

        let runs = db::list_carry_forward_runs(&conn, 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].error.is_some());
        assert_eq!(db::get_schedules_by_staff(&conn, &staff).unwrap().len(), 1);
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let conn = open_memory_database().unwrap();
        let lock = Arc::new(Mutex::new(()));
        let poisoner = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err = run_carry_forward(&conn, &lock, day(2024, 1, 2), RunTrigger::Manual).unwrap_err();
        assert!(matches!(err, CarryForwardError::LockPoisoned));
    }

    #[test]
    fn concurrent_runs_on_one_file_create_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clinic.db");
        let staff;
        {
            let conn = open_database(&path).unwrap();
            staff = seed_staff(&conn, Role::Staff);
            for name in ["A", "B", "C"] {
                let p = seed_patient(&conn, Some(staff), name);
                db::insert_schedule(
                    &conn,
                    &new_entry(p, staff, day(2024, 1, 1), ScheduleStatus::Scheduled, None),
                )
                .unwrap();
            }
        }

        let lock = Arc::new(Mutex::new(()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let lock = lock.clone();
                std::thread::spawn(move || {
                    let conn = open_database(&path).unwrap();
                    run_carry_forward(&conn, &lock, day(2024, 1, 2), RunTrigger::Manual)
                        .map(|r| r.created_count())
                        .unwrap_or(0)
                })
            })
            .collect();
        let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(created, 3);

        let conn = open_database(&path).unwrap();
        assert_eq!(db::get_schedules_by_staff(&conn, &staff).unwrap().len(), 6);
    }

    #[test]
    fn preview_leaves_store_untouched() {
        let conn = open_memory_database().unwrap();
        let staff = seed_staff(&conn, Role::Staff);
        let patient = seed_patient(&conn, Some(staff), "Meera");
        db::insert_schedule(
            &conn,
            &new_entry(patient, staff, day(2024, 1, 1), ScheduleStatus::Scheduled, None),
        )
        .unwrap();

        let plan = preview_carry_forward(&conn, day(2024, 1, 2)).unwrap();
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(db::get_schedules_by_staff(&conn, &staff).unwrap().len(), 1);
        assert!(db::list_carry_forward_runs(&conn, 10).unwrap().is_empty());
    }
}
