//! HTTP endpoint handlers, one module per resource.

pub mod carry_forward;
pub mod health;
pub mod patients;
pub mod reports;
pub mod schedules;
pub mod staff;

use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::db;

/// A referenced patient must exist; a dangling id is the caller's mistake.
pub(crate) fn ensure_patient_exists(conn: &Connection, id: &Uuid) -> Result<(), ApiError> {
    match db::get_patient(conn, id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest(format!("Unknown patient: {id}"))),
    }
}

pub(crate) fn ensure_staff_exists(conn: &Connection, id: &Uuid) -> Result<(), ApiError> {
    match db::get_staff(conn, id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::BadRequest(format!("Unknown staff member: {id}"))),
    }
}
