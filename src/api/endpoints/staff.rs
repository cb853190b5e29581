//! Staff administration endpoints (admin only).
//!
//! - `GET /api/staff`: search and page staff accounts
//! - `PATCH /api/staff/:id`: edit a staff member's profile
//! - `DELETE /api/staff/:id`: remove a staff member
//!
//! Accounts are created with the `staff add` CLI command, which prints the
//! bearer token once.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{check_page_size, total_pages_with, ApiContext, CallerContext, DeleteResponse};
use crate::db;
use crate::models::{Role, Staff, StaffFilter};

/// Page size used for `total_pages` when the request does not set one.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct StaffListQuery {
    #[serde(alias = "searchVal")]
    pub search: Option<String>,
    /// `staff` (default), `admin` or `all`.
    pub role: Option<String>,
    pub page: Option<u32>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<u32>,
}

impl StaffListQuery {
    pub fn into_filter(self) -> Result<StaffFilter, ApiError> {
        check_page_size(self.page_size)?;
        let role = match self.role.as_deref().map(str::trim) {
            None | Some("") => Some(Role::Staff),
            Some(r) if r.eq_ignore_ascii_case("all") => None,
            Some(r) => Some(
                Role::from_str(&r.to_ascii_lowercase())
                    .map_err(|_| ApiError::BadRequest(format!("Unknown role: {r}")))?,
            ),
        };
        Ok(StaffFilter {
            // The legacy client sends the literal string "undefined" for no search.
            search: self.search.filter(|s| s != "undefined"),
            role,
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StaffListResponse {
    pub staff: Vec<Staff>,
    pub total: u64,
    pub total_pages: u64,
}

/// `GET /api/staff`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<StaffListQuery>,
) -> Result<Json<StaffListResponse>, ApiError> {
    caller.require_admin()?;
    let filter = query.into_filter()?;
    let conn = ctx.open_db()?;
    let (staff, total) = db::list_staff(&conn, &filter)?;
    Ok(Json(StaffListResponse {
        staff,
        total,
        total_pages: total_pages_with(total, filter.page_size, DEFAULT_PAGE_SIZE),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StaffUpdateRequest {
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "sessionCharge")]
    pub session_charge: Option<f64>,
}

impl StaffUpdateRequest {
    /// Apply the fields present in the request. An empty phone clears it.
    fn apply(self, staff: &mut Staff) -> Result<(), ApiError> {
        if let Some(first_name) = self.first_name {
            let first_name = first_name.trim();
            if first_name.is_empty() {
                return Err(ApiError::BadRequest("First name is required".into()));
            }
            staff.first_name = first_name.to_string();
        }
        if let Some(last_name) = self.last_name {
            staff.last_name = last_name.trim().to_string();
        }
        if let Some(email) = self.email {
            let email = email.trim();
            if !email.contains('@') {
                return Err(ApiError::BadRequest(format!("Invalid email: {email}")));
            }
            staff.email = email.to_string();
        }
        if let Some(phone) = self.phone {
            staff.phone = Some(phone.trim().to_string()).filter(|p| !p.is_empty());
        }
        if let Some(charge) = self.session_charge {
            if !charge.is_finite() || charge < 0.0 {
                return Err(ApiError::BadRequest("Session charge must be a non-negative amount".into()));
            }
            staff.session_charge = Some(charge);
        }
        Ok(())
    }
}

/// `PATCH /api/staff/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<StaffUpdateRequest>,
) -> Result<Json<Staff>, ApiError> {
    caller.require_admin()?;
    let conn = ctx.open_db()?;
    let mut staff = db::get_staff(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("Staff {id} not found")))?;
    request.apply(&mut staff)?;

    db::update_staff(&conn, &staff).map_err(|e| match e {
        db::DatabaseError::ConstraintViolation(_) => {
            ApiError::Conflict(format!("Email {} is already in use", staff.email))
        }
        other => other.into(),
    })?;
    tracing::info!(staff_id = %id, "Staff member updated");
    Ok(Json(staff))
}

/// `DELETE /api/staff/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    caller.require_admin()?;
    if id == caller.staff_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".into()));
    }
    let conn = ctx.open_db()?;
    db::delete_staff(&conn, &id).map_err(|e| match e {
        db::DatabaseError::ConstraintViolation(_) => ApiError::Conflict(format!(
            "Staff member {id} still has schedule entries; reassign or delete them first"
        )),
        other => other.into(),
    })?;
    tracing::info!(staff_id = %id, "Staff member deleted");
    Ok(Json(DeleteResponse { success: true, id }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_to_staff_role() {
        let filter = StaffListQuery::default().into_filter().unwrap();
        assert_eq!(filter.role, Some(Role::Staff));
        assert_eq!(filter.page, 1);

        let all = StaffListQuery {
            role: Some("All".into()),
            search: Some("undefined".into()),
            ..Default::default()
        };
        let filter = all.into_filter().unwrap();
        assert_eq!(filter.role, None);
        assert!(filter.search.is_none());

        let bad = StaffListQuery {
            role: Some("doctor".into()),
            ..Default::default()
        };
        assert!(bad.into_filter().is_err());
    }

    #[test]
    fn update_rejects_negative_charge() {
        let mut staff = Staff {
            id: Uuid::new_v4(),
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            email: "asha@clinic.test".into(),
            phone: Some("555".into()),
            role: Role::Staff,
            session_charge: None,
            created_at: chrono::NaiveDateTime::default(),
        };
        let request = StaffUpdateRequest {
            session_charge: Some(-5.0),
            ..Default::default()
        };
        assert!(request.apply(&mut staff).is_err());

        let request = StaffUpdateRequest {
            phone: Some("  ".into()),
            session_charge: Some(650.0),
            ..Default::default()
        };
        request.apply(&mut staff).unwrap();
        assert_eq!(staff.phone, None);
        assert_eq!(staff.session_charge, Some(650.0));
    }
}
