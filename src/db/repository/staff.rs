use std::str::FromStr;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::decode::{amount_field, like_pattern, page_clause, required, text_at, timestamp_field, uuid_field};
use crate::db::DatabaseError;
use crate::models::*;

const STAFF_COLUMNS: &str = "id, first_name, last_name, email, phone, role, session_charge, created_at";

struct StaffRow {
    id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    role: Option<String>,
    session_charge: Option<String>,
    created_at: Option<String>,
}

fn staff_from_row(row: &Row<'_>) -> rusqlite::Result<StaffRow> {
    Ok(StaffRow {
        id: text_at(row, 0)?,
        first_name: text_at(row, 1)?,
        last_name: text_at(row, 2)?,
        email: text_at(row, 3)?,
        phone: text_at(row, 4)?,
        role: text_at(row, 5)?,
        session_charge: text_at(row, 6)?,
        created_at: text_at(row, 7)?,
    })
}

fn build_staff(row: StaffRow) -> Result<Staff, DatabaseError> {
    Ok(Staff {
        id: uuid_field("staff.id", row.id)?,
        first_name: required("staff.first_name", row.first_name)?,
        last_name: row.last_name.unwrap_or_default(),
        email: required("staff.email", row.email)?,
        phone: row.phone,
        role: Role::from_str(&required("staff.role", row.role)?)?,
        session_charge: amount_field("staff.session_charge", row.session_charge)?,
        created_at: timestamp_field("staff.created_at", row.created_at)?,
    })
}

/// Insert a staff member. `token_hash` is the hex SHA-256 of their bearer
/// token; the token itself is never stored.
pub fn insert_staff(
    conn: &Connection,
    staff: &Staff,
    token_hash: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO staff (id, first_name, last_name, email, phone, role, session_charge, token_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            staff.id.to_string(),
            staff.first_name,
            staff.last_name,
            staff.email,
            staff.phone,
            staff.role.as_str(),
            staff.session_charge,
            token_hash,
            staff.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )
    .map_err(|e| DatabaseError::from_write(e, "staff"))?;
    Ok(())
}

pub fn get_staff(conn: &Connection, id: &Uuid) -> Result<Option<Staff>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?1"),
            params![id.to_string()],
            staff_from_row,
        )
        .optional()?;
    row.map(build_staff).transpose()
}

pub fn get_staff_by_token_hash(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<Staff>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE token_hash = ?1"),
            params![token_hash],
            staff_from_row,
        )
        .optional()?;
    row.map(build_staff).transpose()
}

/// Replace a staff member's token hash (token rotation).
pub fn set_staff_token_hash(
    conn: &Connection,
    id: &Uuid,
    token_hash: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE staff SET token_hash = ?1 WHERE id = ?2",
        params![token_hash, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Staff".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Update profile fields. Role, token and `created_at` are not touched.
pub fn update_staff(conn: &Connection, staff: &Staff) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE staff SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4, session_charge = ?5
             WHERE id = ?6",
            params![
                staff.first_name,
                staff.last_name,
                staff.email,
                staff.phone,
                staff.session_charge,
                staff.id.to_string(),
            ],
        )
        .map_err(|e| DatabaseError::from_write(e, "staff"))?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Staff".into(),
            id: staff.id.to_string(),
        });
    }
    Ok(())
}

/// Delete a staff member. Fails with `ConstraintViolation` while schedule
/// entries still reference them; their patients and reports are unlinked.
pub fn delete_staff(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn
        .execute("DELETE FROM staff WHERE id = ?1", params![id.to_string()])
        .map_err(|e| DatabaseError::from_write(e, "staff"))?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Staff".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Filtered, optionally paged listing ordered by name, with the total
/// match count. Undecodable rows are logged and left out of the page.
pub fn list_staff(
    conn: &Connection,
    filter: &StaffFilter,
) -> Result<(Vec<Staff>, u64), DatabaseError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        values.push(like_pattern(term));
        let n = values.len();
        clauses.push(format!(
            "(first_name LIKE ?{n} ESCAPE '\\' OR last_name LIKE ?{n} ESCAPE '\\')"
        ));
    }
    if let Some(role) = filter.role {
        values.push(role.as_str().to_string());
        clauses.push(format!("role = ?{}", values.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM staff {where_sql}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    let mut sql = format!(
        "SELECT {STAFF_COLUMNS} FROM staff {where_sql}
         ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE, id"
    );
    sql.push_str(&page_clause(filter.page, filter.page_size));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), staff_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        let raw = row?;
        let id = raw.id.clone().unwrap_or_default();
        match build_staff(raw) {
            Ok(staff) => out.push(staff),
            Err(e) => tracing::warn!(staff_id = %id, error = %e, "Skipping undecodable staff row"),
        }
    }
    Ok((out, total.max(0) as u64))
}
