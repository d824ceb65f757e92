//! Error handling module for the roster backend.
//!
//! Every failure is turned into one user-visible notice at the operation
//! boundary; the HTTP layer maps it onto a status code and response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_AUTHENTICATED: &str = "NOT_AUTHENTICATED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_TALK_ID: &str = "INVALID_TALK_ID";
    pub const DUPLICATE_TALK: &str = "DUPLICATE_TALK";
    pub const STORE_ERROR: &str = "STORE_ERROR";
    pub const INVALID_IMPORT_FORMAT: &str = "INVALID_IMPORT_FORMAT";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// No identity is available yet (or the session was closed)
    NotAuthenticated,
    /// Malformed user input
    Validation(String),
    /// Talk number is not part of the catalog
    InvalidTalkId(String),
    /// Talk is already assigned to the speaker
    DuplicateTalk(u32),
    /// Speaker does not exist in the roster
    NotFound(String),
    /// Transport or persistence failure in the roster store
    Store(String),
    /// Import payload failed validation; nothing was changed
    InvalidImportFormat(String),
    /// Internal error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTalkId(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateTalk(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidImportFormat(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotAuthenticated => codes::NOT_AUTHENTICATED,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::InvalidTalkId(_) => codes::INVALID_TALK_ID,
            AppError::DuplicateTalk(_) => codes::DUPLICATE_TALK,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Store(_) => codes::STORE_ERROR,
            AppError::InvalidImportFormat(_) => codes::INVALID_IMPORT_FORMAT,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// The notice shown to the user.
    pub fn message(&self) -> String {
        match self {
            AppError::NotAuthenticated => "No identity available yet".to_string(),
            AppError::InvalidTalkId(raw) => format!("Invalid talk number: {}", raw),
            AppError::DuplicateTalk(id) => {
                format!("Talk {} is already assigned to this speaker", id)
            }
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Store(msg)
            | AppError::InvalidImportFormat(msg)
            | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Store error: {:?}", err);
        AppError::Store(format!("Store error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::InvalidImportFormat(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
    pub revision_id: i64,
}

impl ErrorResponse {
    pub fn new(error: &AppError, revision_id: i64) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
            revision_id,
        }
    }
}

/// Wrapper type for errors that carry revision_id context.
pub struct AppErrorWithRevision {
    pub error: AppError,
    pub revision_id: i64,
}

impl From<AppError> for AppErrorWithRevision {
    fn from(error: AppError) -> Self {
        Self {
            error,
            revision_id: 0,
        }
    }
}

impl IntoResponse for AppErrorWithRevision {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorResponse::new(&self.error, self.revision_id);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rule_errors_have_distinct_codes() {
        assert_eq!(
            AppError::InvalidTalkId("999".to_string()).error_code(),
            codes::INVALID_TALK_ID
        );
        assert_eq!(AppError::DuplicateTalk(12).error_code(), codes::DUPLICATE_TALK);
        assert_eq!(
            AppError::DuplicateTalk(12).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = ErrorResponse::new(&AppError::NotAuthenticated, 3);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "NOT_AUTHENTICATED");
        assert_eq!(value["revisionId"], 3);
    }
}
