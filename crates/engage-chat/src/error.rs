//! Error types for the conversation engine.

use engage_core::error::EngageError;

use crate::backend::BackendError;
use crate::view::ViewName;

/// Errors from the conversation controller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("cannot {action} while the {view} view is active")]
    InvalidTransition { view: ViewName, action: &'static str },
    #[error("patient not found: {0}")]
    PatientNotFound(u64),
    #[error("no patients available for a simulated chat")]
    NoDemoPatient,
    #[error("busy: {0}")]
    Busy(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("state error: {0}")]
    StateError(String),
}

impl From<EngageError> for ChatError {
    fn from(err: EngageError) -> Self {
        match err {
            EngageError::InvalidInput(msg) => ChatError::InvalidInput(msg),
            other => ChatError::StateError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::MessageTooLong(2000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 2000 characters"
        );

        let err = ChatError::InvalidTransition {
            view: ViewName::Analytics,
            action: "start a conversation",
        };
        assert_eq!(
            err.to_string(),
            "cannot start a conversation while the analytics view is active"
        );

        let err = ChatError::PatientNotFound(42);
        assert_eq!(err.to_string(), "patient not found: 42");

        let err = ChatError::Busy("a simulated chat is already being prepared".to_string());
        assert_eq!(
            err.to_string(),
            "busy: a simulated chat is already being prepared"
        );
    }

    #[test]
    fn test_backend_error_wraps() {
        let err: ChatError = BackendError::Unreachable("connection refused".to_string()).into();
        assert!(matches!(err, ChatError::Backend(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_from_engage_error_keeps_invalid_input() {
        let err: ChatError = EngageError::InvalidInput("patient age is required".to_string()).into();
        assert!(matches!(err, ChatError::InvalidInput(_)));
        assert_eq!(err.to_string(), "invalid input: patient age is required");
    }

    #[test]
    fn test_from_engage_error_other_is_state_error() {
        let err: ChatError = EngageError::Config("bad".to_string()).into();
        assert!(matches!(err, ChatError::StateError(_)));
    }
}
