//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, looks up the staff member by
//! token hash, and injects `CallerContext` into request extensions for
//! downstream handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{hash_token, ApiContext, CallerContext};
use crate::db;

/// Require a valid bearer token belonging to a staff member.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `CallerContext` for the handler.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    // 1. Extract bearer token
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    // 2. Resolve staff member; the connection is dropped before any .await
    let staff = {
        let conn = ctx.open_db()?;
        db::get_staff_by_token_hash(&conn, &hash_token(&token))?
    };
    let Some(staff) = staff else {
        tracing::debug!("Rejected request with unknown bearer token");
        return Err(ApiError::Unauthorized);
    };

    // 3. Inject caller context for downstream handlers
    req.extensions_mut().insert(CallerContext {
        staff_id: staff.id,
        role: staff.role,
    });

    // 4. Process request
    Ok(next.run(req).await)
}
