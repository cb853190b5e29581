//! Column decoding shared by the repositories.
//!
//! SQLite does not enforce column types, so values are read back as text
//! and converted here. A value that does not convert is reported as
//! `DatabaseError::InvalidValue` naming the column, never replaced by a
//! default.

use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::TIMESTAMP_FORMAT;

/// Read any storage class as text. NULL stays `None`.
pub(crate) fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get::<_, Value>(idx)? {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    })
}

pub(crate) fn invalid(field: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    }
}

pub(crate) fn required(field: &str, value: Option<String>) -> Result<String, DatabaseError> {
    value.ok_or_else(|| invalid(field, "NULL"))
}

pub(crate) fn uuid_field(field: &str, value: Option<String>) -> Result<Uuid, DatabaseError> {
    let value = required(field, value)?;
    Uuid::parse_str(&value).map_err(|_| invalid(field, &value))
}

pub(crate) fn opt_uuid_field(
    field: &str,
    value: Option<String>,
) -> Result<Option<Uuid>, DatabaseError> {
    value
        .map(|v| Uuid::parse_str(&v).map_err(|_| invalid(field, &v)))
        .transpose()
}

pub(crate) fn timestamp_field(
    field: &str,
    value: Option<String>,
) -> Result<NaiveDateTime, DatabaseError> {
    let value = required(field, value)?;
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(|_| invalid(field, &value))
}

pub(crate) fn opt_timestamp_field(
    field: &str,
    value: Option<String>,
) -> Result<Option<NaiveDateTime>, DatabaseError> {
    value
        .map(|v| NaiveDateTime::parse_from_str(&v, TIMESTAMP_FORMAT).map_err(|_| invalid(field, &v)))
        .transpose()
}

/// Non-negative finite amount, or NULL.
pub(crate) fn amount_field(field: &str, value: Option<String>) -> Result<Option<f64>, DatabaseError> {
    let Some(raw) = value else { return Ok(None) };
    match raw.trim().parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Ok(Some(f)),
        _ => Err(invalid(field, &raw)),
    }
}

/// `%term%` with LIKE wildcards escaped; pair with `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// ` LIMIT n OFFSET m` for a 1-based page, or nothing when unpaged.
pub(crate) fn page_clause(page: u32, page_size: Option<u32>) -> String {
    match page_size.filter(|s| *s > 0) {
        Some(size) => {
            let offset = u64::from(page.max(1) - 1) * u64::from(size);
            format!(" LIMIT {size} OFFSET {offset}")
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a%b_c"), "%a\\%b\\_c%");
    }

    #[test]
    fn page_clause_is_one_based() {
        assert_eq!(page_clause(1, None), "");
        assert_eq!(page_clause(0, Some(5)), " LIMIT 5 OFFSET 0");
        assert_eq!(page_clause(3, Some(5)), " LIMIT 5 OFFSET 10");
    }

    #[test]
    fn bad_values_name_the_column() {
        let err = uuid_field("patients.id", Some("not-a-uuid".into())).unwrap_err();
        assert!(err.to_string().contains("patients.id"));
        assert!(timestamp_field("staff.created_at", None).unwrap_err().is_bad_row());
        assert_eq!(opt_uuid_field("patients.staff_id", None).unwrap(), None);
        assert!(opt_timestamp_field("runs.finished_at", Some("yesterday".into())).is_err());
        assert!(amount_field("staff.session_charge", Some("-1".into())).is_err());
    }
}
