//! JSON response shaping.
//!
//! Every failure is structured as `{"code": ..., "message": ...}` with a
//! stable machine-readable code; success responses carry the documented
//! payloads.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// Machine-readable error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: &'static str,
}

pub(crate) fn json_ok<T: Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

pub(crate) fn error_response(
    status: StatusCode,
    code: &'static str,
    message: &'static str,
) -> Response {
    (status, Json(ErrorBody { code, message })).into_response()
}

pub(crate) fn bad_request(code: &'static str, message: &'static str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(crate) fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", "Not found")
}
