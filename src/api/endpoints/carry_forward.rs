//! Carry-forward endpoints (admin only).
//!
//! - `POST /api/carry-schedule`: run the engine now
//! - `GET /api/carry-schedule/runs`: recent run history

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CallerContext};
use crate::carry_forward::{preview_carry_forward, CarryForwardReport, SkippedPatient};
use crate::db;
use crate::models::{CarryForwardRun, NewScheduleEntry, RunTrigger};

const DEFAULT_RUN_LIMIT: u32 = 20;
const MAX_RUN_LIMIT: u32 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    /// Overrides "today" (YYYY-MM-DD). Defaults to the configured clock.
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum TriggerResponse {
    Report(CarryForwardReport),
    Preview(PreviewResponse),
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub run_date: NaiveDate,
    pub dry_run: bool,
    pub to_create: Vec<NewScheduleEntry>,
    pub skipped: Vec<SkippedPatient>,
}

/// `POST /api/carry-schedule`
///
/// Database work is blocking, so the run executes on the blocking pool.
pub async fn trigger(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<TriggerQuery>,
) -> Result<Json<TriggerResponse>, ApiError> {
    caller.require_admin()?;
    let core = ctx.core.clone();
    let staff_id = caller.staff_id;

    let response = tokio::task::spawn_blocking(move || -> Result<TriggerResponse, ApiError> {
        let today = query.date.unwrap_or_else(|| core.clock().today());
        if query.dry_run {
            let conn = core.open_db()?;
            let plan = preview_carry_forward(&conn, today)?;
            return Ok(TriggerResponse::Preview(PreviewResponse {
                run_date: today,
                dry_run: true,
                to_create: plan.to_create,
                skipped: plan.skipped,
            }));
        }

        tracing::info!(staff_id = %staff_id, run_date = %today, "Manual carry-forward requested");
        let report = core.carry_forward(Some(today), RunTrigger::Manual)?;
        Ok(TriggerResponse::Report(report))
    })
    .await??;

    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub runs: Vec<CarryForwardRun>,
}

/// `GET /api/carry-schedule/runs`
pub async fn runs(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<RunsResponse>, ApiError> {
    caller.require_admin()?;
    let limit = query.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);
    let conn = ctx.open_db()?;
    let runs = db::list_carry_forward_runs(&conn, limit)?;
    Ok(Json(RunsResponse { runs }))
}
