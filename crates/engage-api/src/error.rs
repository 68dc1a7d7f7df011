//! API error types and JSON error response formatting.
//!
//! ApiError gives every endpoint the same `{error, message}` body and maps
//! controller errors onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engage_chat::ChatError;
use serde::Serialize;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "conflict").
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid input.
    BadRequest(String),
    /// 404 - unknown patient.
    NotFound(String),
    /// 409 - action not allowed in the current view, or already running.
    /// `details` names the active view and the rejected action.
    Conflict {
        message: String,
        details: Option<serde_json::Value>,
    },
    /// 502 - the chat backend failed.
    BadGateway(String),
    /// 500
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict { message, details } => {
                (StatusCode::CONFLICT, "conflict", message, details)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway", msg, None),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg, None)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        let message = err.to_string();
        match err {
            ChatError::MessageTooLong(_) | ChatError::InvalidInput(_) => {
                ApiError::BadRequest(message)
            }
            ChatError::PatientNotFound(_) | ChatError::NoDemoPatient => ApiError::NotFound(message),
            ChatError::InvalidTransition { view, action } => ApiError::Conflict {
                message,
                details: Some(serde_json::json!({ "view": view, "action": action })),
            },
            ChatError::Busy(_) => ApiError::Conflict {
                message,
                details: None,
            },
            ChatError::Backend(_) => ApiError::BadGateway(message),
            ChatError::StateError(_) => {
                tracing::error!(error = %message, "Controller state error");
                ApiError::Internal(message)
            }
        }
    }
}
