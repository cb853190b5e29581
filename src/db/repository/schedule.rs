use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::decode::{
    amount_field, invalid, like_pattern, page_clause, required, text_at, timestamp_field, uuid_field,
};
use crate::db::DatabaseError;
use crate::models::*;

const SCHEDULE_COLUMNS: &str = "s.id, s.patient_id, s.staff_id, s.date, s.start_time, s.end_time,
     s.fees, s.location, s.notes, s.status, s.session_frequency_days, s.created_at";

/// Raw row, converted separately so a bad value surfaces as a typed error
/// instead of a silent default or a driver-level type error.
struct ScheduleRow {
    id: Option<String>,
    patient_id: Option<String>,
    staff_id: Option<String>,
    date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    fees: Option<String>,
    location: Option<String>,
    notes: Option<String>,
    status: Option<String>,
    session_frequency_days: Option<String>,
    created_at: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok(ScheduleRow {
        id: text_at(row, 0)?,
        patient_id: text_at(row, 1)?,
        staff_id: text_at(row, 2)?,
        date: text_at(row, 3)?,
        start_time: text_at(row, 4)?,
        end_time: text_at(row, 5)?,
        fees: text_at(row, 6)?,
        location: text_at(row, 7)?,
        notes: text_at(row, 8)?,
        status: text_at(row, 9)?,
        session_frequency_days: text_at(row, 10)?,
        created_at: text_at(row, 11)?,
    })
}

/// Whole number of days, or NULL. `7.0` is accepted; `weekly` and `1.5` are not.
fn parse_frequency(value: Option<String>) -> Result<Option<i64>, DatabaseError> {
    let Some(raw) = value else { return Ok(None) };
    let trimmed = raw.trim();
    if let Ok(days) = trimmed.parse::<i64>() {
        return Ok(Some(days));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        _ => Err(invalid("schedules.session_frequency_days", &raw)),
    }
}

fn entry_from_row(row: ScheduleRow) -> Result<ScheduleEntry, DatabaseError> {
    let date = required("schedules.date", row.date)?;
    let start_time = required("schedules.start_time", row.start_time)?;
    let end_time = required("schedules.end_time", row.end_time)?;
    Ok(ScheduleEntry {
        id: uuid_field("schedules.id", row.id)?,
        patient_id: uuid_field("schedules.patient_id", row.patient_id)?,
        staff_id: uuid_field("schedules.staff_id", row.staff_id)?,
        date: parse_date(&date).ok_or_else(|| invalid("schedules.date", &date))?,
        start_time: parse_time(&start_time)
            .ok_or_else(|| invalid("schedules.start_time", &start_time))?,
        end_time: parse_time(&end_time).ok_or_else(|| invalid("schedules.end_time", &end_time))?,
        fees: amount_field("schedules.fees", row.fees)?,
        location: row.location,
        notes: row.notes,
        status: ScheduleStatus::parse(&required("schedules.status", row.status)?)?,
        session_frequency_days: parse_frequency(row.session_frequency_days)?,
        created_at: timestamp_field("schedules.created_at", row.created_at)?,
    })
}

/// Decode a listing row. Undecodable rows are logged and left out so one
/// bad record cannot take down a whole page.
fn decode_or_skip(row: ScheduleRow) -> Option<ScheduleEntry> {
    let id = row.id.clone().unwrap_or_default();
    match entry_from_row(row) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(schedule_id = %id, error = %e, "Skipping undecodable schedule row");
            None
        }
    }
}

/// Current UTC time truncated to whole seconds, matching the stored format.
pub fn now_timestamp() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

fn insert_with(
    conn: &Connection,
    entry: &NewScheduleEntry,
    created_at: NaiveDateTime,
) -> Result<ScheduleEntry, DatabaseError> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO schedules
         (id, patient_id, staff_id, date, start_time, end_time, fees, location, notes,
          status, session_frequency_days, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id.to_string(),
            entry.patient_id.to_string(),
            entry.staff_id.to_string(),
            entry.date.format(DATE_FORMAT).to_string(),
            entry.start_time.format(TIME_FORMAT).to_string(),
            entry.end_time.format(TIME_FORMAT).to_string(),
            entry.fees,
            entry.location,
            entry.notes,
            entry.status.as_str(),
            entry.session_frequency_days,
            created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )
    .map_err(|e| DatabaseError::from_write(e, "schedules"))?;
    Ok(entry.clone().into_entry(id, created_at))
}

pub fn insert_schedule(
    conn: &Connection,
    entry: &NewScheduleEntry,
) -> Result<ScheduleEntry, DatabaseError> {
    insert_with(conn, entry, now_timestamp())
}

/// Insert every entry or none of them.
pub fn insert_schedules(
    conn: &Connection,
    entries: &[NewScheduleEntry],
) -> Result<Vec<ScheduleEntry>, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let created_at = now_timestamp();

    let mut stored = Vec::with_capacity(entries.len());
    for entry in entries {
        // An early return drops `tx`, which rolls back
        stored.push(insert_with(&tx, entry, created_at)?);
    }

    tx.commit()?;
    Ok(stored)
}

pub fn get_schedule(conn: &Connection, id: &Uuid) -> Result<Option<ScheduleEntry>, DatabaseError> {
    let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules s WHERE s.id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], read_row)
        .optional()?;
    row.map(entry_from_row).transpose()
}

pub fn update_schedule(
    conn: &Connection,
    id: &Uuid,
    entry: &NewScheduleEntry,
) -> Result<ScheduleEntry, DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE schedules
             SET patient_id = ?1, staff_id = ?2, date = ?3, start_time = ?4, end_time = ?5,
                 fees = ?6, location = ?7, notes = ?8, status = ?9, session_frequency_days = ?10
             WHERE id = ?11",
            params![
                entry.patient_id.to_string(),
                entry.staff_id.to_string(),
                entry.date.format(DATE_FORMAT).to_string(),
                entry.start_time.format(TIME_FORMAT).to_string(),
                entry.end_time.format(TIME_FORMAT).to_string(),
                entry.fees,
                entry.location,
                entry.notes,
                entry.status.as_str(),
                entry.session_frequency_days,
                id.to_string(),
            ],
        )
        .map_err(|e| DatabaseError::from_write(e, "schedules"))?;

    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Schedule".into(),
            id: id.to_string(),
        });
    }

    get_schedule(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Schedule".into(),
        id: id.to_string(),
    })
}

pub fn delete_schedule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Schedule".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Filtered, sorted, optionally paged listing. Returns the page and the
/// total number of matching rows. Rows that cannot be decoded are left out
/// of the page but still counted in the total.
pub fn list_schedules(
    conn: &Connection,
    filter: &ScheduleFilter,
) -> Result<(Vec<ScheduleListing>, u64), DatabaseError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        values.push(like_pattern(term));
        let n = values.len();
        clauses.push(format!(
            "(s.date LIKE ?{n} ESCAPE '\\' OR s.start_time LIKE ?{n} ESCAPE '\\'
              OR s.end_time LIKE ?{n} ESCAPE '\\' OR s.location LIKE ?{n} ESCAPE '\\'
              OR s.notes LIKE ?{n} ESCAPE '\\' OR s.status LIKE ?{n} ESCAPE '\\')"
        ));
    }
    if let Some(staff_id) = filter.staff_id {
        values.push(staff_id.to_string());
        clauses.push(format!("s.staff_id = ?{}", values.len()));
    }
    if let Some(patient_id) = filter.patient_id {
        values.push(patient_id.to_string());
        clauses.push(format!("s.patient_id = ?{}", values.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM schedules s {where_sql}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let direction = match filter.sort_order {
        Some(SortOrder::Desc) => "DESC",
        _ => "ASC",
    };
    let mut sql = format!(
        "SELECT {SCHEDULE_COLUMNS}, p.first_name, p.last_name
         FROM schedules s
         LEFT JOIN patients p ON p.id = s.patient_id
         {where_sql}
         ORDER BY {} {direction}, s.id ASC",
        filter.sort_key.column()
    );
    sql.push_str(&page_clause(filter.page, filter.page_size));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        Ok((read_row(row)?, text_at(row, 12)?, text_at(row, 13)?))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (raw, first, last) = row?;
        if let Some(entry) = decode_or_skip(raw) {
            listings.push(ScheduleListing {
                entry,
                patient_first_name: first,
                patient_last_name: last,
            });
        }
    }

    Ok((listings, total.max(0) as u64))
}

pub fn get_schedules_by_staff(
    conn: &Connection,
    staff_id: &Uuid,
) -> Result<Vec<ScheduleEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules s WHERE s.staff_id = ?1
         ORDER BY s.date ASC, s.start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![staff_id.to_string()], read_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.extend(decode_or_skip(row?));
    }
    Ok(entries)
}

/// Distinct patients with at least one non-terminal entry.
///
/// Returned as raw strings so one unparseable id cannot hide the rest.
pub fn find_open_patient_ids(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT patient_id FROM schedules
         WHERE LOWER(status) NOT IN (?1, ?2, 'canceled')
         ORDER BY patient_id",
    )?;
    let rows = stmt.query_map(params![TERMINAL_STATUSES[0], TERMINAL_STATUSES[1]], |row| {
        text_at(row, 0)
    })?;
    let mut ids = Vec::new();
    for row in rows {
        ids.extend(row?);
    }
    Ok(ids)
}

/// The patient's entry with the greatest date, regardless of status.
pub fn get_latest_schedule_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<ScheduleEntry>, DatabaseError> {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules s WHERE s.patient_id = ?1
         ORDER BY s.date DESC, s.created_at DESC LIMIT 1"
    );
    let row = conn
        .query_row(&sql, params![patient_id.to_string()], read_row)
        .optional()?;
    row.map(entry_from_row).transpose()
}

pub fn schedule_exists(
    conn: &Connection,
    patient_id: &Uuid,
    date: NaiveDate,
) -> Result<bool, DatabaseError> {
    let found: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM schedules WHERE patient_id = ?1 AND date = ?2)",
        params![patient_id.to_string(), date.format(DATE_FORMAT).to_string()],
        |row| row.get(0),
    )?;
    Ok(found != 0)
}
