// Error handling types for the portal core

use thiserror::Error;

use super::validation::ValidationResult;

/// Portal error types
///
/// The first three variants mirror how the backend reports failures:
/// access-rule denials, missing documents and everything else. Callers
/// branch on them to pick a degraded path instead of failing outright.
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl PortalError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, PortalError::PermissionDenied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortalError::NotFound(_))
    }

    /// Stable machine-readable code, used in log fields
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::PermissionDenied(_) => "PERMISSION_DENIED",
            PortalError::NotFound(_) => "NOT_FOUND",
            PortalError::Store(_) => "STORE_ERROR",
            PortalError::Unauthenticated(_) => "UNAUTHENTICATED",
            PortalError::InvalidCredentials => "INVALID_CREDENTIALS",
            PortalError::Conflict(_) => "CONFLICT",
            PortalError::Validation(_) => "VALIDATION_ERROR",
            PortalError::Database(_) => "DATABASE_ERROR",
            PortalError::Serialization(_) => "SERIALIZATION_ERROR",
            PortalError::Token(_) => "TOKEN_ERROR",
        }
    }
}

/// Helper function to convert ValidationResult to PortalError
impl From<ValidationResult> for PortalError {
    fn from(result: ValidationResult) -> Self {
        if result.is_valid {
            PortalError::Store("Validation result was valid but converted to error".to_string())
        } else {
            let error_messages: Vec<String> = result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            PortalError::Validation(error_messages.join(", "))
        }
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
