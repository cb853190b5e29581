//! Patient endpoints.
//!
//! - `GET /api/patients`: search, sort and page patients
//! - `POST /api/patients`: register a patient
//! - `GET /api/patients/:id`: one patient
//! - `PATCH /api/patients/:id`: edit a patient
//! - `DELETE /api/patients/:id`: remove a patient with their sessions and reports

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ensure_staff_exists;
use crate::api::error::ApiError;
use crate::api::types::{
    check_page_size, sort_order, total_pages_with, ApiContext, CallerContext, DeleteResponse,
};
use crate::db;
use crate::models::{Patient, PatientFilter, PatientSortKey};

/// Page size used for `total_pages` when the request does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct PatientRequest {
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "staff")]
    pub staff_id: Option<Uuid>,
    pub diagnosed: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Reject an email already used by a different patient.
fn ensure_email_free(conn: &Connection, email: &str, owner: Option<Uuid>) -> Result<(), ApiError> {
    match db::find_patient_by_email(conn, email)? {
        Some(existing) if Some(existing.id) != owner => {
            Err(ApiError::Conflict("Patient with this email already exists".into()))
        }
        _ => Ok(()),
    }
}

/// `POST /api/patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<PatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let first_name = trimmed(request.first_name)
        .ok_or_else(|| ApiError::BadRequest("First name is required".into()))?;
    let email = trimmed(request.email);

    let conn = ctx.open_db()?;
    if let Some(email) = email.as_deref() {
        ensure_email_free(&conn, email, None)?;
    }
    let staff_id = request.staff_id.unwrap_or(caller.staff_id);
    ensure_staff_exists(&conn, &staff_id)?;

    let patient = Patient {
        id: Uuid::new_v4(),
        first_name,
        last_name: trimmed(request.last_name).unwrap_or_default(),
        email,
        phone: trimmed(request.phone),
        staff_id: Some(staff_id),
        diagnosed: trimmed(request.diagnosed),
        created_at: db::now_timestamp(),
    };
    db::insert_patient(&conn, &patient)?;

    tracing::info!(patient_id = %patient.id, staff_id = %staff_id, "Patient registered");
    Ok((StatusCode::CREATED, Json(patient)))
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientListQuery {
    pub search: Option<String>,
    #[serde(alias = "sortKey")]
    pub sort_key: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
    pub staff_id: Option<Uuid>,
}

impl PatientListQuery {
    pub fn into_filter(self) -> Result<PatientFilter, ApiError> {
        check_page_size(self.page_size)?;
        Ok(PatientFilter {
            search: self.search,
            staff_id: self.staff_id,
            sort_key: self
                .sort_key
                .as_deref()
                .map(PatientSortKey::parse)
                .unwrap_or_default(),
            sort_order: Some(sort_order(self.sort_order.as_deref())),
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PatientListResponse {
    pub patients: Vec<Patient>,
    pub total: u64,
    pub total_pages: u64,
}

/// `GET /api/patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<PatientListResponse>, ApiError> {
    let filter = query.into_filter()?;
    let conn = ctx.open_db()?;
    let (patients, total) = db::list_patients(&conn, &filter)?;
    Ok(Json(PatientListResponse {
        patients,
        total,
        total_pages: total_pages_with(total, filter.page_size, DEFAULT_PAGE_SIZE),
    }))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.open_db()?;
    db::get_patient(&conn, &id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Patient {id} not found")))
}

/// `PATCH /api/patients/:id`
///
/// Fields left out of the body keep their stored value; an empty string
/// clears an optional field.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<PatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.open_db()?;
    let mut patient = db::get_patient(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Patient {id} not found")))?;

    if let Some(first_name) = request.first_name {
        patient.first_name = trimmed(Some(first_name))
            .ok_or_else(|| ApiError::BadRequest("First name is required".into()))?;
    }
    if let Some(last_name) = request.last_name {
        patient.last_name = last_name.trim().to_string();
    }
    if let Some(email) = request.email {
        patient.email = trimmed(Some(email));
        if let Some(email) = patient.email.as_deref() {
            ensure_email_free(&conn, email, Some(id))?;
        }
    }
    if let Some(phone) = request.phone {
        patient.phone = trimmed(Some(phone));
    }
    if let Some(staff_id) = request.staff_id {
        ensure_staff_exists(&conn, &staff_id)?;
        patient.staff_id = Some(staff_id);
    }
    if let Some(diagnosed) = request.diagnosed {
        patient.diagnosed = trimmed(Some(diagnosed));
    }

    db::update_patient(&conn, &patient)?;
    tracing::info!(patient_id = %id, "Patient updated");
    Ok(Json(patient))
}

/// `DELETE /api/patients/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let conn = ctx.open_db()?;
    db::delete_patient(&conn, &id)?;
    tracing::info!(patient_id = %id, "Patient deleted");
    Ok(Json(DeleteResponse { success: true, id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SortOrder;

    #[test]
    fn list_query_defaults_to_first_name() {
        let filter = PatientListQuery::default().into_filter().unwrap();
        assert_eq!(filter.sort_key, PatientSortKey::FirstName);
        assert_eq!(filter.sort_order, Some(SortOrder::Asc));
        assert_eq!(filter.page, 1);
    }

    #[test]
    fn legacy_query_names_are_accepted() {
        let query: PatientListQuery = serde_json::from_value(serde_json::json!({
            "sortKey": "createdAt",
            "sortOrder": "DESC",
            "pageSize": 10,
        }))
        .unwrap();
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.sort_key, PatientSortKey::CreatedAt);
        assert_eq!(filter.sort_order, Some(SortOrder::Desc));
        assert_eq!(filter.page_size, Some(10));
    }
}
