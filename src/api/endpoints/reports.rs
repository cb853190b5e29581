//! Patient progress report endpoints.
//!
//! - `GET /api/reports`: search, sort and page reports
//! - `POST /api/reports`: file a report, authored by the caller by default
//! - `GET /api/reports/:id`: one report
//! - `PATCH /api/reports/:id`: edit a report
//! - `DELETE /api/reports/:id`: remove a report

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
use crate::models::{parse_date, Report, ReportFilter, ReportListing, ReportSortKey};

/// Page size used for `total_pages` when the request does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Create/update payload. Aliases accept the legacy field names.
#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(alias = "patient")]
    pub patient_id: Option<Uuid>,
    #[serde(alias = "staff")]
    pub staff_id: Option<Uuid>,
    pub date: Option<String>,
    #[serde(alias = "healthStatus")]
    pub health_status: Option<String>,
    #[serde(alias = "currentCondition")]
    pub current_condition: Option<String>,
    pub suggestions: Option<String>,
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn report_date(raw: &str) -> Result<chrono::NaiveDate, ApiError> {
    parse_date(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid date (expected YYYY-MM-DD): {raw}")))
}

/// `POST /api/reports`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let (Some(patient_id), Some(date)) = (request.patient_id, optional_text(request.date)) else {
        return Err(ApiError::BadRequest("Patient and date are required".into()));
    };
    let date = report_date(&date)?;
    let staff_id = request.staff_id.unwrap_or(caller.staff_id);

    let conn = ctx.open_db()?;
    ensure_patient_exists(&conn, &patient_id)?;
    ensure_staff_exists(&conn, &staff_id)?;

    let now = db::now_timestamp();
    let report = Report {
        id: Uuid::new_v4(),
        patient_id,
        staff_id: Some(staff_id),
        date,
        health_status: optional_text(request.health_status),
        current_condition: optional_text(request.current_condition),
        suggestions: optional_text(request.suggestions),
        created_at: now,
        updated_at: now,
    };
    db::insert_report(&conn, &report)?;

    tracing::info!(report_id = %report.id, patient_id = %patient_id, "Report filed");
    Ok((StatusCode::CREATED, Json(report)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub search: Option<String>,
    #[serde(alias = "sortKey")]
    pub sort_key: Option<String>,
    #[serde(alias = "sortOrder")]
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
    pub patient_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
}

impl ReportListQuery {
    pub fn into_filter(self) -> Result<ReportFilter, ApiError> {
        check_page_size(self.page_size)?;
        Ok(ReportFilter {
            search: self.search,
            patient_id: self.patient_id,
            staff_id: self.staff_id,
            sort_key: self
                .sort_key
                .as_deref()
                .map(ReportSortKey::parse)
                .unwrap_or_default(),
            sort_order: Some(sort_order(self.sort_order.as_deref())),
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<ReportListing>,
    pub total: u64,
    pub total_pages: u64,
}

/// `GET /api/reports`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<ReportListResponse>, ApiError> {
    let filter = query.into_filter()?;
    let conn = ctx.open_db()?;
    let (reports, total) = db::list_reports(&conn, &filter)?;
    Ok(Json(ReportListResponse {
        reports,
        total,
        total_pages: total_pages_with(total, filter.page_size, DEFAULT_PAGE_SIZE),
    }))
}

/// `GET /api/reports/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Report>, ApiError> {
    let conn = ctx.open_db()?;
    db::get_report(&conn, &id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Report {id} not found")))
}

/// `PATCH /api/reports/:id`
///
/// Fields left out of the body keep their stored value.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<Report>, ApiError> {
    let conn = ctx.open_db()?;
    let mut report = db::get_report(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Report {id} not found")))?;

    if let Some(patient_id) = request.patient_id {
        ensure_patient_exists(&conn, &patient_id)?;
        report.patient_id = patient_id;
    }
    if let Some(staff_id) = request.staff_id {
        ensure_staff_exists(&conn, &staff_id)?;
        report.staff_id = Some(staff_id);
    }
    if let Some(date) = request.date {
        report.date = report_date(&date)?;
    }
    if request.health_status.is_some() {
        report.health_status = optional_text(request.health_status);
    }
    if request.current_condition.is_some() {
        report.current_condition = optional_text(request.current_condition);
    }
    if request.suggestions.is_some() {
        report.suggestions = optional_text(request.suggestions);
    }
    report.updated_at = db::now_timestamp();

    db::update_report(&conn, &report)?;
    tracing::info!(report_id = %id, "Report updated");
    Ok(Json(report))
}

/// `DELETE /api/reports/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let conn = ctx.open_db()?;
    db::delete_report(&conn, &id)?;
    tracing::info!(report_id = %id, "Report deleted");
    Ok(Json(DeleteResponse { success: true, id }))
}
