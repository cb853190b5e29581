use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use super::decode::{invalid, opt_timestamp_field, required, text_at, timestamp_field, uuid_field};
use crate::db::DatabaseError;
use crate::models::*;

struct RunRow {
    id: Option<String>,
    run_date: Option<String>,
    trigger: Option<String>,
    started_at: Option<String>,
    finished_at: Option<String>,
    created_count: u32,
    skipped_count: u32,
    status: Option<String>,
    error: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        id: text_at(row, 0)?,
        run_date: text_at(row, 1)?,
        trigger: text_at(row, 2)?,
        started_at: text_at(row, 3)?,
        finished_at: text_at(row, 4)?,
        created_count: row.get(5)?,
        skipped_count: row.get(6)?,
        status: text_at(row, 7)?,
        error: text_at(row, 8)?,
    })
}

fn build_run(row: RunRow) -> Result<CarryForwardRun, DatabaseError> {
    let run_date = required("carry_forward_runs.run_date", row.run_date)?;
    Ok(CarryForwardRun {
        id: uuid_field("carry_forward_runs.id", row.id)?,
        run_date: NaiveDate::parse_from_str(&run_date, DATE_FORMAT)
            .map_err(|_| invalid("carry_forward_runs.run_date", &run_date))?,
        trigger: RunTrigger::from_str(&required("carry_forward_runs.trigger_kind", row.trigger)?)?,
        started_at: timestamp_field("carry_forward_runs.started_at", row.started_at)?,
        finished_at: opt_timestamp_field("carry_forward_runs.finished_at", row.finished_at)?,
        created_count: row.created_count,
        skipped_count: row.skipped_count,
        status: RunStatus::from_str(&required("carry_forward_runs.status", row.status)?)?,
        error: row.error,
    })
}

pub fn insert_carry_forward_run(
    conn: &Connection,
    run: &CarryForwardRun,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO carry_forward_runs
         (id, run_date, trigger_kind, started_at, finished_at, created_count, skipped_count, status, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            run.id.to_string(),
            run.run_date.format(DATE_FORMAT).to_string(),
            run.trigger.as_str(),
            run.started_at.format(TIMESTAMP_FORMAT).to_string(),
            run.finished_at.map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
            run.created_count,
            run.skipped_count,
            run.status.as_str(),
            run.error,
        ],
    )?;
    Ok(())
}

/// Most recent runs first. Undecodable rows are logged and left out.
pub fn list_carry_forward_runs(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<CarryForwardRun>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, run_date, trigger_kind, started_at, finished_at, created_count,
                skipped_count, status, error
         FROM carry_forward_runs
         ORDER BY started_at DESC, run_date DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], read_row)?;
    let mut runs = Vec::new();
    for row in rows {
        let raw = row?;
        let id = raw.id.clone().unwrap_or_default();
        match build_run(raw) {
            Ok(run) => runs.push(run),
            Err(e) => tracing::warn!(run_id = %id, error = %e, "Skipping undecodable carry-forward run"),
        }
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(started_at: Option<&str>, finished_at: Option<&str>) -> RunRow {
        RunRow {
            id: Some(uuid::Uuid::new_v4().to_string()),
            run_date: Some("2024-01-02".into()),
            trigger: Some("manual".into()),
            started_at: started_at.map(Into::into),
            finished_at: finished_at.map(Into::into),
            created_count: 1,
            skipped_count: 0,
            status: Some("succeeded".into()),
            error: None,
        }
    }

    #[test]
    fn timestamps_are_parsed_not_defaulted() {
        let run = build_run(raw(Some("2024-01-02 10:22:00"), None)).unwrap();
        assert_eq!(run.started_at.to_string(), "2024-01-02 10:22:00");
        assert!(run.finished_at.is_none());

        let err = build_run(raw(Some("soon"), None)).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::InvalidValue { ref field, .. } if field == "carry_forward_runs.started_at"
        ));

        let err = build_run(raw(Some("2024-01-02 10:22:00"), Some("later"))).unwrap_err();
        assert!(err.to_string().contains("carry_forward_runs.finished_at"));

        let mut bad_id = raw(Some("2024-01-02 10:22:00"), None);
        bad_id.id = Some("run-1".into());
        assert!(build_run(bad_id).unwrap_err().is_bad_row());
    }
}
