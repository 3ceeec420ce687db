//! HTTP handlers for file upload, metadata lookup and delete.
//! Storage and persistence concerns are delegated to `FileService`, which
//! logs every adapter failure; these functions only translate service
//! outcomes into HTTP responses and log request-shape problems.

use crate::{
    errors::{AppError, X_STATUS_MESSAGE},
    observability::record_api_call,
    services::file_service::{FileService, FileServiceError, NewUpload},
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Multipart field that must carry the uploaded file.
pub const UPLOAD_FIELD: &str = "profilePic";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Upload a file with `POST /v1/file`.
///
/// Expects multipart/form-data with exactly one file part named `profilePic`.
/// Responds 201 with the file descriptor.
pub async fn upload_file(
    State(service): State<FileService>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let result = async {
        let multipart = multipart.map_err(|rejection| {
            warn!(error = %rejection, "upload request is not multipart/form-data");
            AppError::bad_request()
        })?;
        let upload = read_upload(multipart).await?;

        let record = service
            .upload_file(upload)
            .await
            .map_err(|_| AppError::internal())?;

        let mut response = (StatusCode::CREATED, Json(record.descriptor())).into_response();
        response
            .headers_mut()
            .insert(X_STATUS_MESSAGE, HeaderValue::from_static("File Added"));
        Ok::<_, AppError>(response)
    }
    .await;

    record_outcome("file_upload", &result, start);
    result
}

/// GET `/v1/file/{id}` — file descriptor as JSON.
pub async fn get_file(
    State(service): State<FileService>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let result = async {
        let id = parse_file_id(&id)?;
        match service.find_file(id).await {
            Ok(record) => Ok(Json(record.descriptor()).into_response()),
            Err(FileServiceError::NotFound(_)) => Err(AppError::not_found()),
            Err(_) => Err(AppError::internal()),
        }
    }
    .await;

    record_outcome("file_get", &result, start);
    result
}

/// DELETE `/v1/file/{id}` — remove the stored object, then its metadata.
pub async fn delete_file(
    State(service): State<FileService>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let start = Instant::now();
    let result = async {
        let id = parse_file_id(&id)?;
        match service.delete_file(id).await {
            Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
            Err(FileServiceError::NotFound(_)) => Err(AppError::not_found()),
            Err(_) => Err(AppError::internal_with_message()),
        }
    }
    .await;

    record_outcome("file_delete", &result, start);
    result
}

/// Any unsupported method on `/v1/file` or `/v1/file/{id}`.
pub async fn file_method_not_allowed(method: Method) -> AppError {
    let start = Instant::now();
    warn!(method = %method, "invalid HTTP method for file endpoint");
    record_api_call("file", "invalid_method", start.elapsed());
    AppError::method_not_allowed()
}

/// Pull the single `profilePic` file part out of the form.
///
/// Text fields are ignored. A file under any other name, or a second
/// `profilePic` file, rejects the request.
async fn read_upload(mut multipart: Multipart) -> Result<NewUpload, AppError> {
    let mut upload: Option<NewUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        let Some(file_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
        else {
            debug!("Ignoring non-file field: {}", field_name);
            continue;
        };

        if field_name != UPLOAD_FIELD {
            warn!(field = %field_name, "unexpected file field in upload");
            return Err(AppError::bad_request());
        }
        if upload.is_some() {
            warn!("upload carried more than one `{}` file", UPLOAD_FIELD);
            return Err(AppError::bad_request());
        }

        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        upload = Some(NewUpload {
            file_name,
            content_type,
            data,
        });
    }

    upload.ok_or_else(|| {
        warn!("upload request without a `{}` file part", UPLOAD_FIELD);
        AppError::bad_request()
    })
}

fn multipart_error(err: MultipartError) -> AppError {
    debug!("Failed to read multipart data: {}", err);
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large()
    } else {
        AppError::bad_request()
    }
}

/// Ids that are not UUIDs cannot name a stored file.
fn parse_file_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        debug!(id = raw, "file id is not a UUID");
        AppError::not_found()
    })
}

fn record_outcome(api: &'static str, result: &Result<Response, AppError>, start: Instant) {
    let outcome = match result {
        Ok(_) => "success",
        Err(err) => err.outcome(),
    };
    record_api_call(api, outcome, start.elapsed());
}
