//! Health handlers.
//!
//! - GET /healthz -> writes one liveness row, 200 or 503, never a body
//! - anything else on /healthz -> 405
//!
//! A GET carrying a body, a query string, route parameters or a
//! `Content-Type` header is rejected with 400 before the database is touched.

use crate::{
    errors::{AppError, CachePolicy},
    observability::{millis, record_api_call},
    services::file_service::FileService,
};
use axum::{
    body::{Body, Bytes},
    extract::{RawQuery, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{error, info, warn};

const HEALTH_API: &str = "healthcheck";

/// `GET /healthz`
pub async fn healthz(
    State(service): State<FileService>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    info!(
        method = %method,
        user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-"),
        "health check request received"
    );

    if let Some(violation) = payload_violation(&headers, query.as_deref(), &body) {
        return reject_payload(start, violation);
    }

    match service.record_health_check().await {
        Ok(_) => {
            info!(
                status = "success",
                total_duration_ms = millis(start.elapsed()),
                "health check completed"
            );
            record_api_call(HEALTH_API, "success", start.elapsed());

            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::OK;
            CachePolicy::NoStore.apply(response.headers_mut());
            response
        }
        Err(err) => {
            error!(
                error = %err,
                failed_component = "database",
                status = "service_unavailable",
                duration_ms = millis(start.elapsed()),
                "health check failed"
            );
            record_api_call(HEALTH_API, "error", start.elapsed());
            AppError::service_unavailable().into_response()
        }
    }
}

/// `GET /healthz/{*rest}`: route parameters are never accepted.
pub async fn healthz_with_route_params(method: Method) -> Response {
    let start = Instant::now();
    info!(method = %method, "health check request received");
    reject_payload(start, "route_params")
}

fn reject_payload(start: Instant, violation: &'static str) -> Response {
    warn!(
        violation,
        status = "bad_request",
        "health check request contained unexpected payload"
    );
    record_api_call(HEALTH_API, "invalid_parameters", start.elapsed());
    AppError::bad_request().into_response()
}

/// Any method other than GET on `/healthz`.
pub async fn healthz_method_not_allowed(method: Method) -> Response {
    let start = Instant::now();
    warn!(
        method = %method,
        allowed_method = "GET",
        status = "method_not_allowed",
        "invalid HTTP method for health check endpoint"
    );
    record_api_call(HEALTH_API, "invalid_method", start.elapsed());
    AppError::method_not_allowed().into_response()
}

/// Name of the first disallowed part of a health request, if any.
fn payload_violation(
    headers: &HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> Option<&'static str> {
    if !body.is_empty() {
        Some("body")
    } else if query.is_some_and(|q| !q.is_empty()) {
        Some("query")
    } else if headers.contains_key(header::CONTENT_TYPE) {
        Some("content_type")
    } else {
        None
    }
}
