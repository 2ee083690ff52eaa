//! HTTP response building helpers
//!
//! Every handler answers through these so error bodies share one shape:
//! `{"error": KIND, "message": text}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::FeedError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

fn error_body(status: StatusCode, kind: &str, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &serde_json::json!({ "error": kind, "message": message }),
    )
}

/// Build a 404 for an unknown route
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Build a 400 for malformed requests rejected before reaching a service
pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
}

/// Build a 401 when the caller identity header is missing or malformed
pub fn unauthorized(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

pub fn method_not_allowed() -> Response<Full<Bytes>> {
    error_body(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        "Method not allowed",
    )
}

/// HTTP status for a service failure
pub fn status_for(error: &FeedError) -> StatusCode {
    match error {
        FeedError::NotMember(_) | FeedError::Forbidden(_) => StatusCode::FORBIDDEN,
        FeedError::NotFound(_) => StatusCode::NOT_FOUND,
        FeedError::Validation(_) | FeedError::Json(_) => StatusCode::BAD_REQUEST,
        FeedError::Conflict(_) => StatusCode::CONFLICT,
        FeedError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        FeedError::Database(_)
        | FeedError::Config(_)
        | FeedError::Io(_)
        | FeedError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a FeedError to an HTTP response, logging detail the client does not see
pub fn error_response(err: FeedError) -> Response<Full<Bytes>> {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }
    error_body(status, err.kind(), &err.public_message())
}

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, FeedError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a create result into an HTTP response with 201 Created
pub fn from_create_result<T: Serialize>(result: Result<T, FeedError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a delete result into an HTTP response with 204 No Content
pub fn from_delete_result(result: Result<(), FeedError>) -> Response<Full<Bytes>> {
    match result {
        Ok(()) => no_content(),
        Err(e) => error_response(e),
    }
}
