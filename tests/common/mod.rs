//! Shared helpers for router-level tests.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use file_service::{
    routes,
    services::{
        FileService,
        memory::{MemoryMetadataStore, MemoryObjectStore},
    },
};
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "X-FILE-SERVICE-BOUNDARY";

/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub objects: MemoryObjectStore,
    pub metadata: MemoryMetadataStore,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::with_upload_limit(1024 * 1024)
    }

    pub fn with_upload_limit(max_upload_bytes: usize) -> Self {
        let objects = MemoryObjectStore::new();
        let metadata = MemoryMetadataStore::new();
        let service = FileService::new(Arc::new(objects.clone()), Arc::new(metadata.clone()));
        Self {
            router: routes::app(service, max_upload_bytes),
            objects,
            metadata,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn call(&self, method: &str, uri: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// POST /v1/file with one file part named `field`.
    pub async fn upload(&self, field: &str, file_name: &str, data: &[u8]) -> Response {
        let body = multipart_body(&[Part::File {
            name: field,
            file_name,
            content_type: "application/pdf",
            data,
        }]);
        self.send(multipart_request(body)).await
    }
}

#[allow(dead_code)]
pub enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

#[allow(dead_code)]
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        name, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[allow(dead_code)]
pub fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[allow(dead_code)]
pub async fn assert_empty(response: Response, status: StatusCode) {
    assert_eq!(response.status(), status);
    assert!(body_bytes(response).await.is_empty());
}
