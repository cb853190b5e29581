//! Carry-forward engine: regenerates a patient's recurring session for a
//! given day.
//!
//! A run has three phases:
//! 1. Read: patients with at least one open entry, then each one's latest entry.
//! 2. Decide: per patient, compare the day gap with the session frequency and
//!    check that no entry exists for `today` yet.
//! 3. Write: one atomic bulk insert of every synthesized entry.
//!
//! Only one entry is produced per patient per run, dated `today`. Missed days
//! are not backfilled.

use std::time::Instant;

use chrono::NaiveDate;
use uuid::Uuid;

use super::error::CarryForwardError;
use super::traits::ScheduleStore;
use super::types::*;
use crate::models::{NewScheduleEntry, ScheduleEntry, ScheduleStatus};

/// Outcome of comparing a patient's latest entry against `today`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Due {
    Yes,
    No(SkipReason),
}

/// Whether a session is due on `today`, given the patient's latest entry.
///
/// Does not consult the store; the duplicate check happens separately.
pub fn evaluate(last: &ScheduleEntry, today: NaiveDate) -> Due {
    let day_gap = (today - last.date).num_days();
    if day_gap < 0 {
        return Due::No(SkipReason::FutureDated {
            last_date: last.date,
        });
    }

    let frequency = last.effective_frequency();
    if day_gap < frequency {
        return Due::No(SkipReason::NotDue { day_gap, frequency });
    }

    Due::Yes
}

/// Copy of `last` for `today`, reset to `Scheduled`. The store assigns the
/// new id and creation time.
pub fn carry_forward_entry(last: &ScheduleEntry, today: NaiveDate) -> NewScheduleEntry {
    NewScheduleEntry {
        patient_id: last.patient_id,
        staff_id: last.staff_id,
        date: today,
        start_time: last.start_time,
        end_time: last.end_time,
        fees: last.fees,
        location: last.location.clone(),
        notes: last.notes.clone(),
        status: ScheduleStatus::Scheduled,
        session_frequency_days: last.session_frequency_days,
    }
}

#[derive(Debug, Default)]
pub struct CarryForwardEngine;

impl CarryForwardEngine {
    pub fn new() -> Self {
        Self
    }

    /// Read and decide phases only. Nothing is written.
    pub fn plan(
        &self,
        store: &dyn ScheduleStore,
        today: NaiveDate,
    ) -> Result<CarryForwardPlan, CarryForwardError> {
        let mut plan = CarryForwardPlan::default();

        for patient_id in store.find_open_patient_ids()? {
            match self.plan_patient(store, &patient_id, today) {
                Ok(Some(entry)) => plan.to_create.push(entry),
                Ok(None) => {}
                Err(Skip(reason)) => {
                    tracing::debug!(
                        patient_id = %patient_id,
                        reason = reason.as_str(),
                        "Carry-forward skipped patient"
                    );
                    plan.skipped.push(SkippedPatient {
                        patient_id: patient_id.to_string(),
                        reason,
                    });
                }
                Err(Fatal(e)) => return Err(e),
            }
        }

        Ok(plan)
    }

    fn plan_patient(
        &self,
        store: &dyn ScheduleStore,
        patient_id: &Uuid,
        today: NaiveDate,
    ) -> Result<Option<NewScheduleEntry>, PatientOutcome> {
        let last = match store.find_latest_entry(patient_id) {
            Ok(Some(last)) => last,
            Ok(None) => return Err(Skip(SkipReason::NoEntries)),
            Err(e) if e.is_data_anomaly() => {
                tracing::warn!(patient_id = %patient_id, error = %e, "Skipping malformed schedule history");
                return Err(Skip(SkipReason::MalformedRecord {
                    reason: e.to_string(),
                }));
            }
            Err(e) => return Err(Fatal(e)),
        };

        if let Due::No(reason) = evaluate(&last, today) {
            return Err(Skip(reason));
        }

        if store.exists(patient_id, today).map_err(Fatal)? {
            return Err(Skip(SkipReason::AlreadyScheduled));
        }

        Ok(Some(carry_forward_entry(&last, today)))
    }

    /// Full run: plan, then insert the batch atomically.
    ///
    /// Any store failure aborts the run with nothing committed. Per-patient
    /// anomalies are reported in `skipped`.
    pub fn run(
        &self,
        store: &dyn ScheduleStore,
        today: NaiveDate,
    ) -> Result<CarryForwardReport, CarryForwardError> {
        let start = Instant::now();
        let plan = self.plan(store, today)?;
        let created = store.bulk_insert(&plan.to_create)?;

        Ok(CarryForwardReport {
            run_id: Uuid::new_v4(),
            run_date: today,
            created,
            skipped: plan.skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

enum PatientOutcome {
    Skip(SkipReason),
    Fatal(CarryForwardError),
}

use PatientOutcome::{Fatal, Skip};

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use chrono::{NaiveDateTime, NaiveTime};
    use rusqlite::{params, Connection};

    use super::*;
    use crate::carry_forward::store::SqliteScheduleStore;
    use crate::db::repository::test_support::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::{self, DatabaseError};
    use crate::models::{Role, ScheduleFilter};

    struct Fixture {
        conn: Connection,
        staff: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            let conn = open_memory_database().unwrap();
            let staff = seed_staff(&conn, Role::Staff);
            Self { conn, staff }
        }

        fn patient(&self) -> Uuid {
            seed_patient(&self.conn, Some(self.staff), "Meera")
        }

        fn add(
            &self,
            patient: Uuid,
            date: NaiveDate,
            status: ScheduleStatus,
            frequency: Option<i64>,
        ) -> ScheduleEntry {
            db::insert_schedule(
                &self.conn,
                &new_entry(patient, self.staff, date, status, frequency),
            )
            .unwrap()
        }

        fn run(&self, today: NaiveDate) -> CarryForwardReport {
            let store = SqliteScheduleStore::new(&self.conn);
            CarryForwardEngine::new().run(&store, today).unwrap()
        }

        fn entries_for(&self, patient: Uuid) -> Vec<ScheduleEntry> {
            let (rows, _) = db::list_schedules(
                &self.conn,
                &ScheduleFilter {
                    patient_id: Some(patient),
                    ..Default::default()
                },
            )
            .unwrap();
            rows.into_iter().map(|l| l.entry).collect()
        }

        fn total(&self) -> u64 {
            db::list_schedules(&self.conn, &ScheduleFilter::default()).unwrap().1
        }
    }

    fn last_entry(date: NaiveDate, frequency: Option<i64>) -> ScheduleEntry {
        ScheduleEntry {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            date,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            fees: Some(300.0),
            location: Some("Home visit".into()),
            notes: Some("bring reports".into()),
            status: ScheduleStatus::Completed,
            session_frequency_days: frequency,
            created_at: NaiveDateTime::default(),
        }
    }

    // ── evaluate ───────────────────────────────────────────

    #[test]
    fn due_exactly_at_frequency_boundary() {
        let last = last_entry(day(2024, 1, 1), Some(3));
        assert_eq!(evaluate(&last, day(2024, 1, 4)), Due::Yes);
        assert_eq!(
            evaluate(&last, day(2024, 1, 3)),
            Due::No(SkipReason::NotDue { day_gap: 2, frequency: 3 })
        );
    }

    #[test]
    fn same_day_is_never_due() {
        let last = last_entry(day(2024, 1, 1), None);
        assert!(matches!(evaluate(&last, day(2024, 1, 1)), Due::No(SkipReason::NotDue { .. })));
    }

    #[test]
    fn future_dated_last_entry_is_not_due() {
        let last = last_entry(day(2024, 1, 10), None);
        assert_eq!(
            evaluate(&last, day(2024, 1, 2)),
            Due::No(SkipReason::FutureDated { last_date: day(2024, 1, 10) })
        );
    }

    #[test]
    fn non_positive_frequency_behaves_as_daily() {
        let last = last_entry(day(2024, 1, 1), Some(0));
        assert_eq!(evaluate(&last, day(2024, 1, 2)), Due::Yes);
    }

    #[test]
    fn carried_entry_copies_fields_and_resets_status() {
        let last = last_entry(day(2024, 1, 1), Some(2));
        let next = carry_forward_entry(&last, day(2024, 1, 3));
        assert_eq!(next.patient_id, last.patient_id);
        assert_eq!(next.staff_id, last.staff_id);
        assert_eq!(next.start_time, last.start_time);
        assert_eq!(next.end_time, last.end_time);
        assert_eq!(next.fees, last.fees);
        assert_eq!(next.location, last.location);
        assert_eq!(next.notes, last.notes);
        assert_eq!(next.session_frequency_days, Some(2));
        assert_eq!(next.status, ScheduleStatus::Scheduled);
        assert_eq!(next.date, day(2024, 1, 3));
    }

    // ── full runs against SQLite ───────────────────────────

    #[test]
    fn daily_patient_is_carried_to_next_day() {
        let fx = Fixture::new();
        let p = fx.patient();
        fx.add(p, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(1));

        let report = fx.run(day(2024, 1, 2));
        assert_eq!(report.created_count(), 1);
        let created = &report.created[0];
        assert_eq!(created.patient_id, p);
        assert_eq!(created.date, day(2024, 1, 2));
        assert_eq!(created.status, ScheduleStatus::Scheduled);

        // Second run the same day is a no-op
        let again = fx.run(day(2024, 1, 2));
        assert_eq!(again.created_count(), 0);
        assert_eq!(again.skipped[0].reason, SkipReason::NotDue { day_gap: 0, frequency: 1 });
        assert_eq!(fx.entries_for(p).len(), 2);
    }

    #[test]
    fn repeated_runs_leave_store_unchanged() {
        let fx = Fixture::new();
        for freq in [1, 2, 3] {
            let p = fx.patient();
            fx.add(p, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(freq));
        }

        fx.run(day(2024, 1, 3));
        let after_first = fx.total();
        fx.run(day(2024, 1, 3));
        fx.run(day(2024, 1, 3));
        assert_eq!(fx.total(), after_first);
        // freq 1 and 2 are due on the 3rd, freq 3 is not
        assert_eq!(after_first, 5);
    }

    #[test]
    fn created_entry_has_fresh_identity_and_matches_source() {
        let fx = Fixture::new();
        let p = fx.patient();
        let source = fx.add(p, day(2024, 1, 1), ScheduleStatus::Completed, Some(2));
        // Keep the patient open through an earlier pending entry
        fx.add(p, day(2023, 12, 30), ScheduleStatus::Scheduled, Some(2));

        let report = fx.run(day(2024, 1, 3));
        assert_eq!(report.created_count(), 1);
        let created = &report.created[0];
        assert_ne!(created.id, source.id);
        assert_eq!(created.staff_id, source.staff_id);
        assert_eq!(created.start_time, source.start_time);
        assert_eq!(created.end_time, source.end_time);
        assert_eq!(created.fees, source.fees);
        assert_eq!(created.location, source.location);
        assert_eq!(created.notes, source.notes);
        assert_eq!(created.session_frequency_days, source.session_frequency_days);
        assert_eq!(created.status, ScheduleStatus::Scheduled);

        let stored = db::get_schedule(&fx.conn, &created.id).unwrap().unwrap();
        assert_eq!(&stored, created);
    }

    #[test]
    fn closed_patients_are_never_revisited() {
        let fx = Fixture::new();
        let p = fx.patient();
        fx.add(p, day(2024, 1, 1), ScheduleStatus::Completed, Some(1));
        fx.add(p, day(2024, 1, 2), ScheduleStatus::Cancelled, Some(1));

        let report = fx.run(day(2024, 1, 10));
        assert_eq!(report.created_count(), 0);
        assert!(report.skipped.is_empty());
        assert_eq!(fx.entries_for(p).len(), 2);
    }

    #[test]
    fn missed_days_produce_a_single_entry_for_today() {
        let fx = Fixture::new();
        let p = fx.patient();
        fx.add(p, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(1));

        let report = fx.run(day(2024, 1, 4));
        assert_eq!(report.created_count(), 1);
        assert_eq!(report.created[0].date, day(2024, 1, 4));
        let dates: Vec<_> = fx.entries_for(p).iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day(2024, 1, 1), day(2024, 1, 4)]);
    }

    #[test]
    fn existing_entry_for_today_blocks_carry() {
        let fx = Fixture::new();
        let p = fx.patient();
        fx.add(p, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(1));
        // A manual booking for today is the latest entry, so the gap check stops it
        fx.add(p, day(2024, 1, 2), ScheduleStatus::Scheduled, Some(1));

        let report = fx.run(day(2024, 1, 2));
        assert_eq!(report.created_count(), 0);
        assert_eq!(fx.entries_for(p).len(), 2);
    }

    #[test]
    fn future_dated_history_is_skipped_not_fatal() {
        let fx = Fixture::new();
        let future = fx.patient();
        let normal = fx.patient();
        fx.add(future, day(2024, 2, 1), ScheduleStatus::Scheduled, None);
        fx.add(normal, day(2024, 1, 1), ScheduleStatus::Scheduled, None);

        let report = fx.run(day(2024, 1, 2));
        assert_eq!(report.created_count(), 1);
        assert_eq!(report.created[0].patient_id, normal);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].patient_id, future.to_string());
        assert!(matches!(report.skipped[0].reason, SkipReason::FutureDated { .. }));
    }

    #[test]
    fn malformed_history_does_not_block_other_patients() {
        let fx = Fixture::new();
        let broken = fx.patient();
        let healthy = fx.patient();
        let bad = fx.add(broken, day(2024, 1, 1), ScheduleStatus::Scheduled, None);
        fx.add(healthy, day(2024, 1, 1), ScheduleStatus::Scheduled, None);
        fx.conn
            .execute(
                "UPDATE schedules SET end_time = 'later' WHERE id = ?1",
                params![bad.id.to_string()],
            )
            .unwrap();

        let report = fx.run(day(2024, 1, 2));
        assert_eq!(report.created_count(), 1);
        assert_eq!(report.created[0].patient_id, healthy);
        assert!(matches!(report.skipped[0].reason, SkipReason::MalformedRecord { .. }));
    }

    #[test]
    fn mistyped_fees_or_frequency_is_a_skip_not_a_failure() {
        for (column, value) in [("fees", "free"), ("session_frequency_days", "weekly")] {
            let fx = Fixture::new();
            let broken = fx.patient();
            let healthy = fx.patient();
            let bad = fx.add(broken, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(1));
            fx.add(healthy, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(1));
            fx.conn
                .execute(
                    &format!("UPDATE schedules SET {column} = ?1 WHERE id = ?2"),
                    params![value, bad.id.to_string()],
                )
                .unwrap();

            let report = fx.run(day(2024, 1, 2));
            assert_eq!(report.created_count(), 1, "{column}");
            assert_eq!(report.created[0].patient_id, healthy);
            assert_eq!(report.skipped.len(), 1);
            assert_eq!(report.skipped[0].patient_id, broken.to_string());
            match &report.skipped[0].reason {
                SkipReason::MalformedRecord { reason } => assert!(reason.contains(column), "{reason}"),
                other => panic!("expected malformed record, got {other:?}"),
            }
        }
    }

    #[test]
    fn numeric_text_in_typed_columns_still_decodes() {
        let fx = Fixture::new();
        let p = fx.patient();
        let entry = fx.add(p, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(2));
        // Stored as REAL rather than INTEGER
        fx.conn
            .execute(
                "UPDATE schedules SET session_frequency_days = 2.0 WHERE id = ?1",
                params![entry.id.to_string()],
            )
            .unwrap();

        assert_eq!(fx.run(day(2024, 1, 2)).created_count(), 0);
        let report = fx.run(day(2024, 1, 3));
        assert_eq!(report.created_count(), 1);
        assert_eq!(report.created[0].session_frequency_days, Some(2));
    }

    #[test]
    fn plan_does_not_write() {
        let fx = Fixture::new();
        let p = fx.patient();
        fx.add(p, day(2024, 1, 1), ScheduleStatus::Scheduled, None);

        let store = SqliteScheduleStore::new(&fx.conn);
        let plan = CarryForwardEngine::new().plan(&store, day(2024, 1, 2)).unwrap();
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(fx.total(), 1);
    }

    #[test]
    fn worked_example_from_one_daily_entry() {
        let fx = Fixture::new();
        let p = fx.patient();
        fx.add(p, day(2024, 1, 1), ScheduleStatus::Scheduled, Some(1));

        let first = fx.run(day(2024, 1, 2));
        assert_eq!(first.created.len(), 1);
        assert_eq!(first.created[0].date, day(2024, 1, 2));

        let second = fx.run(day(2024, 1, 2));
        assert!(second.created.is_empty());
    }

    // ── failure semantics with a scripted store ────────────

    /// In-memory store that can be told to fail at a given step.
    #[derive(Default)]
    struct ScriptedStore {
        entries: RefCell<Vec<ScheduleEntry>>,
        fail_latest_for: Option<Uuid>,
        fail_insert: bool,
        inserts: Cell<usize>,
    }

    impl ScheduleStore for ScriptedStore {
        fn find_open_patient_ids(&self) -> Result<Vec<Uuid>, CarryForwardError> {
            let mut ids: Vec<Uuid> = self
                .entries
                .borrow()
                .iter()
                .filter(|e| !e.status.is_terminal())
                .map(|e| e.patient_id)
                .collect();
            ids.sort();
            ids.dedup();
            Ok(ids)
        }

        fn find_latest_entry(
            &self,
            patient_id: &Uuid,
        ) -> Result<Option<ScheduleEntry>, CarryForwardError> {
            if self.fail_latest_for == Some(*patient_id) {
                return Err(CarryForwardError::Database(DatabaseError::ConstraintViolation(
                    "connection reset".into(),
                )));
            }
            Ok(self
                .entries
                .borrow()
                .iter()
                .filter(|e| e.patient_id == *patient_id)
                .max_by_key(|e| e.date)
                .cloned())
        }

        fn exists(&self, patient_id: &Uuid, date: NaiveDate) -> Result<bool, CarryForwardError> {
            Ok(self
                .entries
                .borrow()
                .iter()
                .any(|e| e.patient_id == *patient_id && e.date == date))
        }

        fn bulk_insert(
            &self,
            entries: &[NewScheduleEntry],
        ) -> Result<Vec<ScheduleEntry>, CarryForwardError> {
            self.inserts.set(self.inserts.get() + 1);
            if self.fail_insert {
                return Err(CarryForwardError::DuplicateConflict("schedules".into()));
            }
            let created: Vec<ScheduleEntry> = entries
                .iter()
                .cloned()
                .map(|e| e.into_entry(Uuid::new_v4(), NaiveDateTime::default()))
                .collect();
            self.entries.borrow_mut().extend(created.iter().cloned());
            Ok(created)
        }
    }

    fn scripted_with(entries: Vec<ScheduleEntry>) -> ScriptedStore {
        ScriptedStore {
            entries: RefCell::new(entries),
            ..Default::default()
        }
    }

    #[test]
    fn store_read_failure_aborts_before_any_write() {
        let a = last_entry(day(2024, 1, 1), None);
        let mut b = last_entry(day(2024, 1, 1), None);
        b.status = ScheduleStatus::Scheduled;
        let mut a_open = a.clone();
        a_open.status = ScheduleStatus::Scheduled;

        let mut store = scripted_with(vec![a_open.clone(), b.clone()]);
        store.fail_latest_for = Some(b.patient_id);

        let result = CarryForwardEngine::new().run(&store, day(2024, 1, 2));
        assert!(matches!(result, Err(CarryForwardError::Database(_))));
        assert_eq!(store.inserts.get(), 0);
        assert_eq!(store.entries.borrow().len(), 2);
    }

    #[test]
    fn insert_failure_is_reported_as_run_failure() {
        let mut open = last_entry(day(2024, 1, 1), None);
        open.status = ScheduleStatus::Scheduled;
        let mut store = scripted_with(vec![open]);
        store.fail_insert = true;

        let result = CarryForwardEngine::new().run(&store, day(2024, 1, 2));
        assert!(matches!(result, Err(CarryForwardError::DuplicateConflict(_))));
        assert_eq!(store.entries.borrow().len(), 1);
    }

    #[test]
    fn scripted_store_never_duplicates_across_runs() {
        let mut open = last_entry(day(2024, 1, 1), Some(1));
        open.status = ScheduleStatus::Scheduled;
        let store = scripted_with(vec![open]);
        let engine = CarryForwardEngine::new();

        for d in 2..=5 {
            engine.run(&store, day(2024, 1, d)).unwrap();
            engine.run(&store, day(2024, 1, d)).unwrap();
        }

        let entries = store.entries.borrow();
        let mut keys: Vec<_> = entries.iter().map(|e| (e.patient_id, e.date)).collect();
        let before = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), before);
        assert_eq!(before, 5);
    }
}
