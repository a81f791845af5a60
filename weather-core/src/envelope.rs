//! Uniform response wrapper for every terminal outcome of a request.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MSG_SUCCESS: &str = "Success";
pub const MSG_CLIENT_ERROR: &str = "An error occurred";
pub const MSG_SERVER_ERROR: &str = "Server Failure";
pub const MSG_NOT_FOUND: &str = "Not Found";

/// `success == true` iff `data` is present and both `error` and `error_code`
/// are absent. `status_code` is always the HTTP status written for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
    pub error: Option<String>,
    pub error_code: Option<String>,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
}

impl<T> ResultEnvelope<T> {
    pub fn success(data: T, path: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: MSG_SUCCESS.to_string(),
            error: None,
            error_code: None,
            path: path.into(),
            timestamp: Utc::now(),
            status_code: StatusCode::OK.as_u16(),
        }
    }

    pub fn client_error(
        error: impl Into<String>,
        path: impl Into<String>,
        status: StatusCode,
        error_code: Option<&str>,
    ) -> Self {
        Self::failure(MSG_CLIENT_ERROR, error, path, status, error_code)
    }

    pub fn bad_request(error: impl Into<String>, path: impl Into<String>) -> Self {
        Self::client_error(error, path, StatusCode::BAD_REQUEST, None)
    }

    pub fn server_error(
        error: impl Into<String>,
        path: impl Into<String>,
        status: StatusCode,
        error_code: Option<&str>,
    ) -> Self {
        Self::failure(MSG_SERVER_ERROR, error, path, status, error_code)
    }

    pub fn not_found(message: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let mut envelope = Self::failure(
            MSG_NOT_FOUND,
            format!("{path} doesn't exist"),
            path,
            StatusCode::NOT_FOUND,
            None,
        );
        envelope.message = message.into();
        envelope
    }

    fn failure(
        message: &str,
        error: impl Into<String>,
        path: impl Into<String>,
        status: StatusCode,
        error_code: Option<&str>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            message: message.to_string(),
            error: Some(error.into()),
            error_code: error_code.map(str::to_string),
            path: path.into(),
            timestamp: Utc::now(),
            status_code: status.as_u16(),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T: Serialize> IntoResponse for ResultEnvelope<T> {
    fn into_response(self) -> Response {
        // Factories only accept `StatusCode`, so `status()` round-trips exactly.
        (self.status(), Json(self)).into_response()
    }
}
