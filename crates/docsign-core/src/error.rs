//! Crate-level error

use thiserror::Error;

use crate::api::ApiError;
use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::lifecycle::GuardViolation;
use crate::placement::FieldError;
use crate::storage::StorageError;
use crate::vault::VaultError;

#[derive(Debug, Error)]
pub enum DocsignError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Guard(#[from] GuardViolation),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No document is open")]
    NotOpen,

    #[error("Draft belongs to document {draft}, but {open} is open")]
    WrongDocument { draft: String, open: String },
}

impl DocsignError {
    /// Message shown to the person who triggered the failing action
    pub fn user_message(&self) -> String {
        match self {
            DocsignError::Api(e) => e.user_message(),
            DocsignError::Capture(e) => e.user_message().to_string(),
            other => other.to_string(),
        }
    }

    /// Whether a user re-invocation may reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocsignError::Api(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_api_errors_keep_their_user_message() {
        let err: DocsignError = ApiError::SessionExpired.into();
        assert_eq!(err.user_message(), ApiError::SessionExpired.user_message());
        assert!(!err.is_retryable());

        let err: DocsignError = ApiError::Transport("reset".to_string()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_guard_violation_message_is_shown_as_is() {
        let err: DocsignError = GuardViolation::EmptyReason.into();
        assert_eq!(err.user_message(), "A reason is required to reject");
    }
}
