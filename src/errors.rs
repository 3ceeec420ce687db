use axum::{
    Json,
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Custom header carrying a short human-readable status.
pub const X_STATUS_MESSAGE: HeaderName = HeaderName::from_static("x-status-message");

/// Caching headers attached to an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// `Cache-Control: no-cache` only.
    NoCache,
    /// `Cache-Control: no-cache, no-store, must-revalidate`, `Pragma: no-cache`
    /// and `X-Content-Type-Options: nosniff`.
    NoStore,
}

impl CachePolicy {
    pub fn apply(self, headers: &mut HeaderMap) {
        match self {
            CachePolicy::NoCache => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            }
            CachePolicy::NoStore => {
                headers.insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, no-store, must-revalidate"),
                );
                headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
                headers.insert(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                );
            }
        }
    }
}

/// An HTTP error outcome. Bodies are empty unless `message` is set, and
/// never carry internal error text.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub cache: CachePolicy,
    pub status_message: Option<&'static str>,
    pub message: Option<&'static str>,
}

impl AppError {
    /// Create an empty-bodied AppError with a specific status and cache policy.
    pub fn new(status: StatusCode, cache: CachePolicy) -> Self {
        Self {
            status,
            cache,
            status_message: None,
            message: None,
        }
    }

    /// 400 for a rejected method payload or malformed body.
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST, CachePolicy::NoCache)
    }

    /// 405 for a method outside the path's allowed set.
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, CachePolicy::NoCache)
    }

    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, CachePolicy::NoCache)
    }

    /// 404 for a path no route matches.
    pub fn route_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, CachePolicy::NoCache)
    }

    /// 404 for a file id with no metadata row.
    pub fn not_found() -> Self {
        Self {
            status_message: Some("Not Found"),
            ..Self::new(StatusCode::NOT_FOUND, CachePolicy::NoStore)
        }
    }

    /// Shortcut for an empty 500 Internal Server Error.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CachePolicy::NoStore)
    }

    /// 500 with a generic JSON `message` body.
    pub fn internal_with_message() -> Self {
        Self {
            message: Some("Internal server error"),
            ..Self::internal()
        }
    }

    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, CachePolicy::NoStore)
    }

    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self.status {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::METHOD_NOT_ALLOWED => "invalid_method",
            StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
            _ => "error",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = match self.message {
            Some(message) => Json(json!({ "message": message })).into_response(),
            None => Response::new(Body::empty()),
        };
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        self.cache.apply(headers);
        if let Some(status_message) = self.status_message {
            headers.insert(X_STATUS_MESSAGE, HeaderValue::from_static(status_message));
        }

        response
    }
}
