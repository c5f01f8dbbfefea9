// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Attempt service error.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (e.g., exam not open yet)
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., exam already attempted)
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Failure of one of the two remote calls the session controller makes.
///
/// The candidate only ever sees a generic retryable message; the variant is
/// kept for logs.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Transport failure or undecodable response.
    Network(String),

    /// The server answered with a non-success status.
    Rejected { status: u16, message: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "network error: {}", msg),
            ApiError::Rejected { status, message } => {
                write!(f, "server rejected request ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// Local answer store write failure. Reads never fail, see `AnswerStore::load`.
#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Encode(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "answer store io error: {}", e),
            StoreError::Encode(e) => write!(f, "answer store encode error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encode(err)
    }
}

/// Errors surfaced by the exam session controller to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// start-attempt failed; the phase is unchanged and the action may be retried.
    StartFailed(String),

    /// The action is not allowed in the current phase.
    InvalidPhase { action: &'static str, phase: String },

    /// A start-attempt call is already in flight.
    StartPending,

    /// The question is not part of this exam.
    UnknownQuestion(i64),

    /// The question belongs to a locked or not-yet-active section.
    SectionNotEditable(i64),

    /// The option index is outside the question's options.
    OptionOutOfRange { question_id: i64, option: usize },

    /// The violation warning must be acknowledged before anything else.
    WarningPending,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::StartFailed(msg) => write!(f, "Could not start the exam: {}", msg),
            SessionError::InvalidPhase { action, phase } => {
                write!(f, "Cannot {} while {}", action, phase)
            }
            SessionError::StartPending => write!(f, "Exam start already in progress"),
            SessionError::UnknownQuestion(id) => write!(f, "Unknown question {}", id),
            SessionError::SectionNotEditable(id) => {
                write!(f, "Question {} belongs to a section that is not editable", id)
            }
            SessionError::OptionOutOfRange { question_id, option } => {
                write!(f, "Option {} is out of range for question {}", option, question_id)
            }
            SessionError::WarningPending => {
                write!(f, "Return to fullscreen to acknowledge the warning first")
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conflict_maps_to_409_json() {
        let response = AppError::Conflict("Exam already attempted".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Exam already attempted");
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let response = AppError::InternalServerError("db exploded".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
