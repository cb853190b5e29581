//! Access logging middleware.
//!
//! Logs every API request with the caller's staff id, method, path,
//! response status and latency. Runs innermost, after auth has injected
//! `CallerContext`.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::CallerContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let caller = req.extensions().get::<CallerContext>().cloned();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        staff_id = caller.as_ref().map(|c| c.staff_id.to_string()).unwrap_or_default(),
        role = caller.as_ref().map(|c| c.role.as_str()).unwrap_or("anonymous"),
        %method,
        path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "API request"
    );

    response
}
