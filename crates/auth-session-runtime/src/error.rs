//! Runtime error types.

use biometric_auth_session::SessionError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The session task has ended; nothing more can be posted.
    #[error("Session closed")]
    SessionClosed,

    /// The bounded event queue is full.
    #[error("Session event queue is full")]
    QueueFull,

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type alias using RuntimeError.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
