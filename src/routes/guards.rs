//! Request guards that run before any handler.
//!
//! `reject_malformed_json` buffers every body declared as JSON and answers
//! 400 with an empty body when it does not parse. The parser's message is
//! only logged.

use crate::{errors::AppError, observability::record_api_call};
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::de::IgnoredAny;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

/// Largest JSON body the guard will buffer.
pub const MAX_JSON_BODY_BYTES: usize = 1024 * 1024;

/// Why a JSON body was refused.
#[derive(Debug, Error)]
pub enum BodyRejection {
    #[error("request body is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read request body: {0}")]
    Read(#[from] axum::Error),
}

/// Middleware: 400 for any request whose JSON body fails to parse.
pub async fn reject_malformed_json(req: Request, next: Next) -> Response {
    if !declares_json(req.headers()) {
        return next.run(req).await;
    }

    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let (parts, body) = req.into_parts();

    match decode_json_body(body).await {
        Ok(bytes) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
        Err(rejection) => {
            debug!(error = %rejection, "JSON body rejected");
            let outcome = match rejection {
                BodyRejection::Parse(_) => "malformed_json",
                BodyRejection::Read(_) => "unreadable_body",
            };
            warn!(method = %method, path = %path, outcome, "rejected request body");
            record_api_call("request", outcome, start.elapsed());
            AppError::bad_request().into_response()
        }
    }
}

/// Buffer `body` and check it parses as JSON. An empty body is accepted.
pub async fn decode_json_body(body: Body) -> Result<Bytes, BodyRejection> {
    let bytes = axum::body::to_bytes(body, MAX_JSON_BODY_BYTES).await?;
    if !bytes.is_empty() {
        serde_json::from_slice::<IgnoredAny>(&bytes)?;
    }
    Ok(bytes)
}

/// `application/json` or any `+json` media type.
fn declares_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn detects_json_media_types() {
        assert!(declares_json(&with_content_type("application/json")));
        assert!(declares_json(&with_content_type(
            "Application/JSON; charset=utf-8"
        )));
        assert!(declares_json(&with_content_type("application/merge-patch+json")));
        assert!(!declares_json(&with_content_type("multipart/form-data; boundary=x")));
        assert!(!declares_json(&HeaderMap::new()));
    }

    #[tokio::test]
    async fn parse_errors_are_tagged() {
        let err = decode_json_body(Body::from("{ broken_json: true"))
            .await
            .unwrap_err();
        assert!(matches!(err, BodyRejection::Parse(_)));
    }

    #[tokio::test]
    async fn valid_and_empty_bodies_pass_through() {
        let bytes = decode_json_body(Body::from(r#"{"a":[1,2]}"#)).await.unwrap();
        assert_eq!(&bytes[..], br#"{"a":[1,2]}"#);
        assert!(decode_json_body(Body::empty()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_bodies_are_read_errors() {
        let big = vec![b' '; MAX_JSON_BODY_BYTES + 1];
        let err = decode_json_body(Body::from(big)).await.unwrap_err();
        assert!(matches!(err, BodyRejection::Read(_)));
    }
}
