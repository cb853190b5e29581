use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::decode::{
    like_pattern, opt_uuid_field, page_clause, required, text_at, timestamp_field, uuid_field,
};
use crate::db::DatabaseError;
use crate::models::*;

const PATIENT_COLUMNS: &str =
    "id, first_name, last_name, email, phone, staff_id, diagnosed, created_at";

struct PatientRow {
    id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    staff_id: Option<String>,
    diagnosed: Option<String>,
    created_at: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: text_at(row, 0)?,
        first_name: text_at(row, 1)?,
        last_name: text_at(row, 2)?,
        email: text_at(row, 3)?,
        phone: text_at(row, 4)?,
        staff_id: text_at(row, 5)?,
        diagnosed: text_at(row, 6)?,
        created_at: text_at(row, 7)?,
    })
}

fn build_patient(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: uuid_field("patients.id", row.id)?,
        first_name: required("patients.first_name", row.first_name)?,
        last_name: row.last_name.unwrap_or_default(),
        email: row.email,
        phone: row.phone,
        staff_id: opt_uuid_field("patients.staff_id", row.staff_id)?,
        diagnosed: row.diagnosed,
        created_at: timestamp_field("patients.created_at", row.created_at)?,
    })
}

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, first_name, last_name, email, phone, staff_id, diagnosed, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            patient.id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.email,
            patient.phone,
            patient.staff_id.map(|id| id.to_string()),
            patient.diagnosed,
            patient.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )
    .map_err(|e| DatabaseError::from_write(e, "patients"))?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            read_row,
        )
        .optional()?;
    row.map(build_patient).transpose()
}

/// Case-insensitive lookup used to reject duplicate registrations.
pub fn find_patient_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE LOWER(email) = LOWER(?1)"),
            params![email.trim()],
            read_row,
        )
        .optional()?;
    row.map(build_patient).transpose()
}

/// Replace every editable field. `id` and `created_at` are kept.
pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE patients
             SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4, staff_id = ?5, diagnosed = ?6
             WHERE id = ?7",
            params![
                patient.first_name,
                patient.last_name,
                patient.email,
                patient.phone,
                patient.staff_id.map(|id| id.to_string()),
                patient.diagnosed,
                patient.id.to_string(),
            ],
        )
        .map_err(|e| DatabaseError::from_write(e, "patients"))?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a patient. Their schedule entries and reports go with them.
pub fn delete_patient(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Filtered, sorted, optionally paged listing with the total match count.
/// Undecodable rows are logged and left out of the page.
pub fn list_patients(
    conn: &Connection,
    filter: &PatientFilter,
) -> Result<(Vec<Patient>, u64), DatabaseError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        values.push(like_pattern(term));
        let n = values.len();
        clauses.push(format!(
            "(first_name LIKE ?{n} ESCAPE '\\' OR last_name LIKE ?{n} ESCAPE '\\'
              OR email LIKE ?{n} ESCAPE '\\' OR phone LIKE ?{n} ESCAPE '\\'
              OR diagnosed LIKE ?{n} ESCAPE '\\')"
        ));
    }
    if let Some(staff_id) = filter.staff_id {
        values.push(staff_id.to_string());
        clauses.push(format!("staff_id = ?{}", values.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM patients {where_sql}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let direction = match filter.sort_order {
        Some(SortOrder::Desc) => "DESC",
        _ => "ASC",
    };
    let mut sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patients {where_sql}
         ORDER BY {} COLLATE NOCASE {direction}, id ASC",
        filter.sort_key.column()
    );
    sql.push_str(&page_clause(filter.page, filter.page_size));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), read_row)?;
    let mut patients = Vec::new();
    for row in rows {
        let raw = row?;
        let id = raw.id.clone().unwrap_or_default();
        match build_patient(raw) {
            Ok(patient) => patients.push(patient),
            Err(e) => tracing::warn!(patient_id = %id, error = %e, "Skipping undecodable patient row"),
        }
    }
    Ok((patients, total.max(0) as u64))
}
