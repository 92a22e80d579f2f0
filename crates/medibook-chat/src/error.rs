//! Error types for the conversational core.

use medibook_core::error::MedibookError;
use medibook_core::types::BookingState;

/// Errors surfaced by the router to its caller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("invalid booking transition: {from} -> {to}")]
    InvalidTransition { from: BookingState, to: BookingState },
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<MedibookError> for ChatError {
    fn from(err: MedibookError) -> Self {
        match err {
            MedibookError::UserNotFound(id) => ChatError::UserNotFound(id),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

/// Failures of the generative backend. The router treats every variant as
/// "skip this branch".
#[derive(Debug, thiserror::Error)]
pub enum GenerativeError {
    #[error("generative backend is not configured")]
    NotConfigured,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("backend timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for GenerativeError {
    fn from(err: reqwest::Error) -> Self {
        GenerativeError::Transport(err.to_string())
    }
}
