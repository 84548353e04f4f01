//! Error types for arena-rs.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Domain variants carry the reason a request was rejected so a caller can
/// decide whether to retry, show a declined state, or present a deadline
/// message. Infrastructure variants wrap failures of the surrounding stack.
#[derive(Debug, Error)]
pub enum AppError {
    // === Domain Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Already voted in competition: {0}")]
    AlreadyVoted(String),

    #[error("Entry already submitted: {0}")]
    AlreadySubmitted(String),

    #[error("Deadline passed: {0}")]
    DeadlinePassed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // === Infrastructure Errors ===
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the stable error code for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::AlreadyVoted(_) => "ALREADY_VOTED",
            Self::AlreadySubmitted(_) => "ALREADY_SUBMITTED",
            Self::DeadlinePassed(_) => "DEADLINE_PASSED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether the failure lies with the server rather than the request.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Conflict(_) | Self::Database(_) | Self::Config(_) | Self::Internal(_)
        )
    }

    /// Returns whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Database(_))
    }

    /// Logs this error at a level matching its origin.
    pub fn log(&self) {
        let code = self.error_code();
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Request rejected");
        }
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_are_not_server_errors() {
        let errors = [
            AppError::NotFound("competition".to_string()),
            AppError::InvalidState("voting".to_string()),
            AppError::Forbidden("admin only".to_string()),
            AppError::AlreadyVoted("c1".to_string()),
            AppError::AlreadySubmitted("e1".to_string()),
            AppError::DeadlinePassed("submission".to_string()),
            AppError::Validation("title".to_string()),
        ];
        for err in errors {
            assert!(!err.is_server_error(), "{} flagged as server error", err.error_code());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = AppError::Conflict("settlement raced with votes".to_string());
        assert!(err.is_retryable());
        assert!(err.is_server_error());
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn test_display_carries_reason() {
        let err = AppError::DeadlinePassed("voting closed at 12:00".to_string());
        assert_eq!(err.to_string(), "Deadline passed: voting closed at 12:00");
    }
}
