//! Schedule endpoints.
//!
//! - `GET /api/schedule`: search, sort and page schedule entries
//! - `POST /api/schedule`: create an entry for the caller
//! - `PATCH /api/schedule/:id`: replace an entry's fields
//! - `DELETE /api/schedule/:id`: remove an entry
//! - `GET /api/staff/:id/schedule`: all entries assigned to a staff member

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ensure_patient_exists, ensure_staff_exists};
use crate::api::error::ApiError;
use crate::api::types::{
    check_page_size, sort_order, total_pages_with, ApiContext, CallerContext, DeleteResponse,
};
use crate::db;
use crate::models::{
    parse_date, parse_time, NewScheduleEntry, ScheduleEntry, ScheduleFilter, ScheduleListing,
    ScheduleSortKey, ScheduleStatus,
};

/// Page size used for `total_pages` when the request does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Create/update payload. Aliases accept the legacy field names.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    #[serde(alias = "patient")]
    pub patient_id: Option<String>,
    pub staff_id: Option<Uuid>,
    #[serde(alias = "Date")]
    pub date: Option<String>,
    #[serde(alias = "StartTime")]
    pub start_time: Option<String>,
    #[serde(alias = "EndTime")]
    pub end_time: Option<String>,
    #[serde(alias = "Fees")]
    pub fees: Option<f64>,
    #[serde(alias = "Location")]
    pub location: Option<String>,
    #[serde(alias = "Notes")]
    pub notes: Option<String>,
    #[serde(alias = "Status")]
    pub status: Option<String>,
    #[serde(alias = "sessionGap")]
    pub session_frequency_days: Option<i64>,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ScheduleRequest {
    /// Validate and convert into a storable entry assigned to `staff_id`.
    pub fn into_new_entry(self, staff_id: Uuid) -> Result<NewScheduleEntry, ApiError> {
        let (Some(patient), Some(date), Some(start), Some(end), Some(status)) = (
            required(&self.patient_id),
            required(&self.date),
            required(&self.start_time),
            required(&self.end_time),
            required(&self.status),
        ) else {
            return Err(ApiError::BadRequest("All fields are required".into()));
        };

        let patient_id = Uuid::parse_str(patient)
            .map_err(|_| ApiError::BadRequest(format!("Invalid patient id: {patient}")))?;
        let date = parse_date(date)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid date (expected YYYY-MM-DD): {date}")))?;
        let start_time = parse_time(start)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid start time: {start}")))?;
        let end_time = parse_time(end)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid end time: {end}")))?;
        if end_time <= start_time {
            return Err(ApiError::BadRequest("End time must be after start time".into()));
        }
        let status = ScheduleStatus::parse(status)
            .map_err(|_| ApiError::BadRequest("Status is required".into()))?;
        if matches!(self.fees, Some(f) if f < 0.0 || !f.is_finite()) {
            return Err(ApiError::BadRequest("Fees must be a non-negative amount".into()));
        }

        Ok(NewScheduleEntry {
            patient_id,
            staff_id: self.staff_id.unwrap_or(staff_id),
            date,
            start_time,
            end_time,
            fees: self.fees,
            location: optional_text(self.location),
            notes: optional_text(self.notes),
            status,
            session_frequency_days: Some(self.session_frequency_days.filter(|d| *d >= 1).unwrap_or(1)),
        })
    }
}

/// The only constraint a valid entry can break is one session per
/// patient per day.
fn session_conflict(err: db::DatabaseError, entry: &NewScheduleEntry) -> ApiError {
    match err {
        db::DatabaseError::ConstraintViolation(_) => ApiError::Conflict(format!(
            "Patient {} already has a session on {}",
            entry.patient_id, entry.date
        )),
        other => other.into(),
    }
}

/// `POST /api/schedule`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleEntry>), ApiError> {
    let entry = request.into_new_entry(caller.staff_id)?;
    let conn = ctx.open_db()?;
    ensure_patient_exists(&conn, &entry.patient_id)?;
    ensure_staff_exists(&conn, &entry.staff_id)?;

    let stored = db::insert_schedule(&conn, &entry).map_err(|e| session_conflict(e, &entry))?;

    tracing::info!(
        schedule_id = %stored.id,
        patient_id = %stored.patient_id,
        date = %stored.date,
        "Schedule created"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleListQuery {
    pub search: Option<String>,
    #[serde(alias = "sortKey")]
    pub sort_key: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
    pub staff_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}

impl ScheduleListQuery {
    pub fn into_filter(self) -> Result<ScheduleFilter, ApiError> {
        check_page_size(self.page_size)?;
        let sort_order = sort_order(self.sort_order.as_deref());
        Ok(ScheduleFilter {
            search: self.search,
            staff_id: self.staff_id,
            patient_id: self.patient_id,
            sort_key: self
                .sort_key
                .as_deref()
                .map(ScheduleSortKey::parse)
                .unwrap_or_default(),
            sort_order: Some(sort_order),
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ScheduleListResponse {
    pub schedules: Vec<ScheduleListing>,
    pub total: u64,
    pub total_pages: u64,
}

/// `ceil(total / page_size)`, with the default page size when unset.
pub fn total_pages(total: u64, page_size: Option<u32>) -> u64 {
    total_pages_with(total, page_size, DEFAULT_PAGE_SIZE)
}

/// `GET /api/schedule`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ScheduleListQuery>,
) -> Result<Json<ScheduleListResponse>, ApiError> {
    let filter = query.into_filter()?;
    let conn = ctx.open_db()?;
    let (schedules, total) = db::list_schedules(&conn, &filter)?;

    Ok(Json(ScheduleListResponse {
        schedules,
        total,
        total_pages: total_pages(total, filter.page_size),
    }))
}

/// `PATCH /api/schedule/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleEntry>, ApiError> {
    let conn = ctx.open_db()?;
    let existing = db::get_schedule(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Schedule {id} not found")))?;

    let entry = request.into_new_entry(existing.staff_id)?;
    ensure_patient_exists(&conn, &entry.patient_id)?;
    ensure_staff_exists(&conn, &entry.staff_id)?;

    let updated =
        db::update_schedule(&conn, &id, &entry).map_err(|e| session_conflict(e, &entry))?;
    tracing::info!(schedule_id = %id, status = %updated.status, "Schedule updated");
    Ok(Json(updated))
}

/// `DELETE /api/schedule/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let conn = ctx.open_db()?;
    db::delete_schedule(&conn, &id)?;
    tracing::info!(schedule_id = %id, "Schedule deleted");
    Ok(Json(DeleteResponse { success: true, id }))
}

#[derive(Debug, Serialize)]
pub struct StaffScheduleResponse {
    pub staff_id: Uuid,
    pub schedules: Vec<ScheduleEntry>,
}

/// `GET /api/staff/:id/schedule`
pub async fn by_staff(
    State(ctx): State<ApiContext>,
    Path(staff_id): Path<Uuid>,
) -> Result<Json<StaffScheduleResponse>, ApiError> {
    let conn = ctx.open_db()?;
    if db::get_staff(&conn, &staff_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Staff {staff_id} not found")));
    }
    let schedules = db::get_schedules_by_staff(&conn, &staff_id)?;
    Ok(Json(StaffScheduleResponse { staff_id, schedules }))
}
