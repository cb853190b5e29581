use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::decode::{
    invalid, like_pattern, opt_uuid_field, page_clause, required, text_at, timestamp_field,
    uuid_field,
};
use crate::db::DatabaseError;
use crate::models::*;

const REPORT_COLUMNS: &str = "r.id, r.patient_id, r.staff_id, r.date, r.health_status,
     r.current_condition, r.suggestions, r.created_at, r.updated_at";

struct ReportRow {
    id: Option<String>,
    patient_id: Option<String>,
    staff_id: Option<String>,
    date: Option<String>,
    health_status: Option<String>,
    current_condition: Option<String>,
    suggestions: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: text_at(row, 0)?,
        patient_id: text_at(row, 1)?,
        staff_id: text_at(row, 2)?,
        date: text_at(row, 3)?,
        health_status: text_at(row, 4)?,
        current_condition: text_at(row, 5)?,
        suggestions: text_at(row, 6)?,
        created_at: text_at(row, 7)?,
        updated_at: text_at(row, 8)?,
    })
}

fn build_report(row: ReportRow) -> Result<Report, DatabaseError> {
    let date = required("reports.date", row.date)?;
    Ok(Report {
        id: uuid_field("reports.id", row.id)?,
        patient_id: uuid_field("reports.patient_id", row.patient_id)?,
        staff_id: opt_uuid_field("reports.staff_id", row.staff_id)?,
        date: parse_date(&date).ok_or_else(|| invalid("reports.date", &date))?,
        health_status: row.health_status,
        current_condition: row.current_condition,
        suggestions: row.suggestions,
        created_at: timestamp_field("reports.created_at", row.created_at)?,
        updated_at: timestamp_field("reports.updated_at", row.updated_at)?,
    })
}

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports
         (id, patient_id, staff_id, date, health_status, current_condition, suggestions,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            report.id.to_string(),
            report.patient_id.to_string(),
            report.staff_id.map(|id| id.to_string()),
            report.date.format(DATE_FORMAT).to_string(),
            report.health_status,
            report.current_condition,
            report.suggestions,
            report.created_at.format(TIMESTAMP_FORMAT).to_string(),
            report.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )
    .map_err(|e| DatabaseError::from_write(e, "reports"))?;
    Ok(())
}

pub fn get_report(conn: &Connection, id: &Uuid) -> Result<Option<Report>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM reports r WHERE r.id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(build_report).transpose()
}

/// Replace every editable field and stamp `updated_at`.
pub fn update_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE reports
             SET patient_id = ?1, staff_id = ?2, date = ?3, health_status = ?4,
                 current_condition = ?5, suggestions = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                report.patient_id.to_string(),
                report.staff_id.map(|id| id.to_string()),
                report.date.format(DATE_FORMAT).to_string(),
                report.health_status,
                report.current_condition,
                report.suggestions,
                report.updated_at.format(TIMESTAMP_FORMAT).to_string(),
                report.id.to_string(),
            ],
        )
        .map_err(|e| DatabaseError::from_write(e, "reports"))?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: report.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_report(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM reports WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Filtered, sorted, optionally paged listing joined with patient names.
/// Returns the page and the total match count; undecodable rows are
/// logged and left out of the page.
pub fn list_reports(
    conn: &Connection,
    filter: &ReportFilter,
) -> Result<(Vec<ReportListing>, u64), DatabaseError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        values.push(like_pattern(term));
        let n = values.len();
        clauses.push(format!(
            "(r.date LIKE ?{n} ESCAPE '\\' OR r.health_status LIKE ?{n} ESCAPE '\\')"
        ));
    }
    if let Some(patient_id) = filter.patient_id {
        values.push(patient_id.to_string());
        clauses.push(format!("r.patient_id = ?{}", values.len()));
    }
    if let Some(staff_id) = filter.staff_id {
        values.push(staff_id.to_string());
        clauses.push(format!("r.staff_id = ?{}", values.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM reports r {where_sql}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let direction = match filter.sort_order {
        Some(SortOrder::Desc) => "DESC",
        _ => "ASC",
    };
    let order = filter
        .sort_key
        .columns()
        .iter()
        .map(|col| format!("{col} {direction}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "SELECT {REPORT_COLUMNS}, p.first_name, p.last_name
         FROM reports r
         LEFT JOIN patients p ON p.id = r.patient_id
         {where_sql}
         ORDER BY {order}, r.id ASC"
    );
    sql.push_str(&page_clause(filter.page, filter.page_size));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
        Ok((read_row(row)?, text_at(row, 9)?, text_at(row, 10)?))
    })?;

    let mut listings = Vec::new();
    for row in rows {
        let (raw, first, last) = row?;
        let id = raw.id.clone().unwrap_or_default();
        match build_report(raw) {
            Ok(report) => listings.push(ReportListing {
                report,
                patient_first_name: first,
                patient_last_name: last,
            }),
            Err(e) => tracing::warn!(report_id = %id, error = %e, "Skipping undecodable report row"),
        }
    }

    Ok((listings, total.max(0) as u64))
}
