//! Error responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use dockfence_core::error::{ClientCode, FenceError};

/// Seconds a caller should wait before retrying a 503.
const RETRY_AFTER_SECS: &str = "5";

/// `FenceError` as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub FenceError);

impl From<FenceError> for ApiError {
    fn from(e: FenceError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rej: JsonRejection) -> Self {
        Self(FenceError::BadRequest(rej.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rej: QueryRejection) -> Self {
        Self(FenceError::BadRequest(rej.body_text()))
    }
}

pub fn status_for(code: ClientCode) -> StatusCode {
    match code {
        ClientCode::BadRequest | ClientCode::ValidationFailed => StatusCode::BAD_REQUEST,
        ClientCode::ImageNotAllowed => StatusCode::FORBIDDEN,
        ClientCode::NotFound | ClientCode::ImageNotFound => StatusCode::NOT_FOUND,
        ClientCode::Conflict => StatusCode::CONFLICT,
        ClientCode::RuntimeUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Caller-visible message. Daemon text stays in the logs.
fn public_message(err: &FenceError) -> String {
    match err {
        FenceError::Conflict(_) => "container is not in a state that allows this operation".into(),
        FenceError::RuntimeUnavailable(_) => "container runtime unavailable".into(),
        FenceError::Unexpected(_) | FenceError::Config(_) => "internal error".into(),
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status = status_for(code);

        let mut body = json!({
            "error": code.as_str(),
            "message": public_message(&self.0),
        });
        if let FenceError::Validation(reason) = &self.0 {
            body["reason"] = json!(reason.name());
            if let Some(detail) = reason.detail() {
                body["detail"] = json!(detail);
            }
        }

        let mut resp = (status, Json(body)).into_response();
        if code.is_retryable() {
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        resp
    }
}
