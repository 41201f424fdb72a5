//! Error types for the Bookshelf lending server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable failure codes carried in error messages
pub mod codes {
    pub const BOOK_NOT_FOUND: &str = "BOOK_NOT_FOUND";
    pub const BORROW_NOT_FOUND: &str = "BORROW_NOT_FOUND";
    pub const ACTIVE_BORROW_NOT_FOUND: &str = "ACTIVE_BORROW_NOT_FOUND";
    pub const SETTINGS_NOT_FOUND: &str = "SETTINGS_NOT_FOUND";

    pub const BOOK_UNAVAILABLE: &str = "BOOK_UNAVAILABLE";
    pub const USER_ALREADY_BORROWED_THIS_BOOK: &str = "USER_ALREADY_BORROWED_THIS_BOOK";
    pub const LIMIT_EXCEEDED: &str = "LIMIT_EXCEEDED";
    pub const INVALID_STATUS_TRANSITION: &str = "INVALID_STATUS_TRANSITION";

    pub const INVALID_DATE: &str = "INVALID_DATE";
    pub const RETURN_DATE_TOO_FAR: &str = "RETURN_DATE_TOO_FAR";
    pub const PDF_NOT_AVAILABLE: &str = "PDF_NOT_AVAILABLE";
    pub const INVALID_STATUS: &str = "INVALID_STATUS";
    pub const EXTENSION_NOT_ALLOWED: &str = "EXTENSION_NOT_ALLOWED";

    pub const BORROW_LIMIT_NOT_SET: &str = "BORROW_LIMIT_NOT_SET";

    pub const FORBIDDEN: &str = "FORBIDDEN";
}

/// Numeric error codes returned alongside the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    BookNotAvailable = 5,
    Duplicate = 6,
    MaxBorrowsReached = 7,
    BadValue = 8,
    PolicyNotConfigured = 9,
    InvalidTransition = 10,
}

impl ErrorCode {
    fn for_conflict(message: &str) -> Self {
        match message {
            codes::BOOK_UNAVAILABLE => ErrorCode::BookNotAvailable,
            codes::LIMIT_EXCEEDED => ErrorCode::MaxBorrowsReached,
            codes::INVALID_STATUS_TRANSITION => ErrorCode::InvalidTransition,
            _ => ErrorCode::Duplicate,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(code: &str) -> Self {
        AppError::NotFound(code.to_string())
    }

    pub fn conflict(code: &str) -> Self {
        AppError::Conflict(code.to_string())
    }

    pub fn bad_request(code: &str) -> Self {
        AppError::BadRequest(code.to_string())
    }

    pub fn forbidden(message: &str) -> Self {
        AppError::Authorization(message.to_string())
    }

    pub fn internal(code: &str) -> Self {
        AppError::Internal(code.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::for_conflict(msg), msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Internal(msg) if msg == codes::BORROW_LIMIT_NOT_SET => {
                tracing::error!("Lending policy misconfigured: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::PolicyNotConfigured,
                    msg.clone(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
