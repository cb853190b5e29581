//! Clinic API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS + `Cache-Control: no-store` → 2. Auth validator → 3. Access logger

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the clinic API router.
///
/// Every route except `/api/health` requires a staff bearer token.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn clinic_api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes: role admin or staff. Admin-only checks live in the
    // handlers that need them.
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/schedule",
            get(endpoints::schedules::list).post(endpoints::schedules::create),
        )
        .route(
            "/schedule/:id",
            patch(endpoints::schedules::update).delete(endpoints::schedules::remove),
        )
        .route("/staff", get(endpoints::staff::list))
        .route(
            "/staff/:id",
            patch(endpoints::staff::update).delete(endpoints::staff::remove),
        )
        .route("/staff/:id/schedule", get(endpoints::schedules::by_staff))
        .route(
            "/patients",
            get(endpoints::patients::list).post(endpoints::patients::create),
        )
        .route(
            "/patients/:id",
            get(endpoints::patients::detail)
                .patch(endpoints::patients::update)
                .delete(endpoints::patients::remove),
        )
        .route(
            "/reports",
            get(endpoints::reports::list).post(endpoints::reports::create),
        )
        .route(
            "/reports/:id",
            get(endpoints::reports::detail)
                .patch(endpoints::reports::update)
                .delete(endpoints::reports::remove),
        )
        .route("/carry-schedule", post(endpoints::carry_forward::trigger))
        .route("/carry-schedule/runs", get(endpoints::carry_forward::runs))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
}
