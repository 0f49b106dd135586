//! Error response formatting
//!
//! Every handler returns `AppError` on failure; this turns it into the
//! standard JSON body with the right status code.

use crate::error::{AppError, ErrorCode, ValidationError};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standardized error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    pub request_id: Option<String>,

    /// ISO 8601 timestamp of the error
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details: details_for(error),
            retryable: Some(error.is_retryable()),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Field-level details for validation failures.
fn details_for(error: &AppError) -> Option<serde_json::Value> {
    use crate::error::AppErrorKind;

    match &error.kind {
        AppErrorKind::Validation(ValidationError::MissingField { field })
        | AppErrorKind::Validation(ValidationError::InvalidFormat { field, .. }) => {
            Some(serde_json::json!({ "field": field }))
        }
        AppErrorKind::Validation(ValidationError::TooShort { field, min }) => {
            Some(serde_json::json!({ "field": field, "minLength": min }))
        }
        AppErrorKind::Validation(ValidationError::OutOfRange { field, min, max }) => {
            Some(serde_json::json!({ "field": field, "min": min, "max": max }))
        }
        _ => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = %self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = %self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        ValidationError::InvalidFormat {
            field: "body".to_string(),
            reason: rejection.body_text(),
        }
        .into()
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        ValidationError::InvalidFormat {
            field: "query".to_string(),
            reason: rejection.body_text(),
        }
        .into()
    }
}

pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
