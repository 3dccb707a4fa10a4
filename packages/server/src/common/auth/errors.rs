use thiserror::Error;

use crate::common::PrincipalId;
use crate::kernel::store::StoreError;

/// Authentication and authorization errors.
///
/// Every variant maps to one [`ErrorCategory`], so callers can always show a
/// credential error, a permission error and a not-found error differently.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid OTP: expected a 4-digit code")]
    InvalidOtp,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Principal not found: {0}")]
    NotFound(PrincipalId),

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse, user-facing grouping of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Credentials,
    Permission,
    NotFound,
    Session,
    Validation,
    Internal,
}

impl AuthError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::InvalidCredentials | AuthError::InvalidOtp => ErrorCategory::Credentials,
            AuthError::Unauthorized(_) => ErrorCategory::Permission,
            AuthError::NotFound(_) => ErrorCategory::NotFound,
            AuthError::SessionExpired => ErrorCategory::Session,
            AuthError::Validation(_) => ErrorCategory::Validation,
            AuthError::Store(_) => ErrorCategory::Internal,
        }
    }

    /// Message suitable for a toast. Never includes internal details.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => {
                "Invalid credentials. Please check your details and try again.".to_string()
            }
            AuthError::InvalidOtp => "Please enter a valid 4-digit code".to_string(),
            AuthError::Unauthorized(reason) => format!("Permission denied: {}", reason),
            AuthError::NotFound(_) => "The requested user could not be found".to_string(),
            AuthError::SessionExpired => {
                "Your session has expired. Please log in again.".to_string()
            }
            AuthError::Validation(reason) => reason.clone(),
            AuthError::Store(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}
