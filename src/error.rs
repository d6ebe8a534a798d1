/// Unified error types for the wishlist service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
///
/// Workflows only ever return these kinds. Store failures are wrapped into
/// one of them before they leave the workflow.
#[derive(Error, Debug)]
pub enum WishlistError {
    /// Unknown user or wrong password, never distinguished to the caller
    #[error("Incorrect Username or Password")]
    InvalidCredentials,

    /// Malformed token or bad signature
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Signature fine but the validity window has passed
    #[error("Token is expired")]
    ExpiredToken,

    /// Authenticated but lacking the required role
    #[error("Unauthorized Access")]
    Forbidden,

    #[error("Username is taken")]
    UsernameTaken,

    #[error("EMail is taken")]
    EmailTaken,

    #[error("Failed to Register User")]
    RegistrationError,

    #[error("Failed to complete password reset process")]
    PasswordForgotError,

    /// Reset token invalid, expired, or superseded
    #[error("Failed to validate a password reset token")]
    ValidateError,

    /// Store failure while validating a reset token
    #[error("Failed to validate a password reset token: Server Error")]
    ValidateServerError,

    #[error("Failed to complete the password reset")]
    ResetError,

    /// Item missing or not in the state the edit requires
    #[error("Failed to edit the item")]
    EditConflict,

    #[error("Failed to delete the item")]
    DeleteConflict,

    #[error("Failed to Add Item")]
    AddItemError,

    /// Store failure on a read path
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Request data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WishlistError {
    /// HTTP status used by the transport layer for this error kind
    pub fn status_code(&self) -> StatusCode {
        match self {
            WishlistError::InvalidCredentials
            | WishlistError::InvalidToken(_)
            | WishlistError::ExpiredToken => StatusCode::UNAUTHORIZED,
            WishlistError::Forbidden => StatusCode::FORBIDDEN,
            WishlistError::UsernameTaken | WishlistError::EmailTaken => StatusCode::CONFLICT,
            WishlistError::ValidateError
            | WishlistError::EditConflict
            | WishlistError::DeleteConflict => StatusCode::BAD_REQUEST,
            WishlistError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WishlistError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            WishlistError::RegistrationError
            | WishlistError::PasswordForgotError
            | WishlistError::ValidateServerError
            | WishlistError::ResetError
            | WishlistError::AddItemError
            | WishlistError::StorageError(_)
            | WishlistError::Config(_)
            | WishlistError::Internal(_)
            | WishlistError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body shared by every non-item response
#[derive(Debug, Serialize, Deserialize)]
pub struct GenericResponse {
    pub code: u16,
    pub message: String,
}

impl GenericResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Convert WishlistError to HTTP response
impl IntoResponse for WishlistError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            WishlistError::StorageError(_)
            | WishlistError::Config(_)
            | WishlistError::Internal(_)
            | WishlistError::Io(_) => "Internal server error".to_string(), // Don't leak details
            _ => self.to_string(),
        };

        (status, Json(GenericResponse::new(status, message))).into_response()
    }
}

/// Result type alias for service operations
pub type WishlistResult<T> = Result<T, WishlistError>;
