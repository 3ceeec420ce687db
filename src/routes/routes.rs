//! Defines routes for the health probe and the file API.
//!
//! ## Structure
//! - `GET    /healthz`        — liveness probe backed by a database insert
//! - `POST   /v1/file`        — multipart upload (field `profilePic`)
//! - `GET    /v1/file/{id}`   — file descriptor
//! - `DELETE /v1/file/{id}`   — remove object and metadata
//!
//! Every other method on these paths answers 405, including `HEAD`, which
//! axum would otherwise route to the GET handler. Unknown paths answer 404.

use crate::{
    errors::AppError,
    handlers::{
        file_handlers::{delete_file, file_method_not_allowed, get_file, upload_file},
        health_handlers::{healthz, healthz_method_not_allowed, healthz_with_route_params},
    },
    routes::guards::reject_malformed_json,
    services::file_service::FileService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the routes that share `FileService` state.
pub fn routes(max_upload_bytes: usize) -> Router<FileService> {
    Router::new()
        .route(
            "/healthz",
            get(healthz)
                .head(healthz_method_not_allowed)
                .fallback(healthz_method_not_allowed),
        )
        .route(
            "/healthz/{*params}",
            get(healthz_with_route_params)
                .head(healthz_method_not_allowed)
                .fallback(healthz_method_not_allowed),
        )
        .route(
            "/v1/file",
            post(upload_file)
                .fallback(file_method_not_allowed)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/v1/file/{id}",
            get(get_file)
                .head(file_method_not_allowed)
                .delete(delete_file)
                .fallback(file_method_not_allowed),
        )
        .fallback(route_not_found)
}

/// The complete application: routes, state, JSON guard and request tracing.
///
/// The JSON guard wraps every route, so a malformed body is rejected before
/// method checks or handlers run.
pub fn app(service: FileService, max_upload_bytes: usize) -> Router {
    routes(max_upload_bytes)
        .with_state(service)
        .layer(middleware::from_fn(reject_malformed_json))
        .layer(TraceLayer::new_for_http())
}

async fn route_not_found() -> AppError {
    AppError::route_not_found()
}
