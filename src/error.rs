//! # Error Handling
//!
//! Custom error types for the HTTP surface and how they map to responses.
//!
//! The matching engine itself never surfaces errors to peers: malformed
//! control frames are logged and dropped, failed sends are ignored and stale
//! references resolve to silent no-ops. `AppError` only exists for the HTTP
//! endpoints (health, stats, runtime config), where a JSON error envelope is
//! the right answer.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Error categories the HTTP handlers can produce.
///
/// Trimmed to the variants with an actual producer: malformed JSON bodies
/// and config updates that fail validation. Both are the client's fault,
/// so both map to 400.
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid or malformed data.
    BadRequest(String),

    /// Input failed validation rules.
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

/// Shorthand for handler results using the application error type.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::ValidationError("port cannot be 0".to_string());
        assert_eq!(err.to_string(), "Validation error: port cannot be 0");
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            AppError::BadRequest(String::new()).error_response().status(),
            actix_web::http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ValidationError(String::new())
                .error_response()
                .status(),
            actix_web::http::StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_serde_json_errors_become_bad_request() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
