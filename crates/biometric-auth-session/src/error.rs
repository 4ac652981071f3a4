//! Session error types.

use thiserror::Error;

/// Errors raised by the session itself.
///
/// These are contract violations by the owner of the session, never runtime
/// conditions reported by hardware. Hardware errors travel as
/// [`crate::BiometricError`] events instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Neither a biometric sensor nor device credential was eligible.
    /// Eligibility must be validated before a session is created.
    #[error("No authenticators requested")]
    NoAuthenticatorsRequested,

    /// An operation was invoked in a state that does not permit it.
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Cookies are non-zero by construction.
    #[error("Invalid cookie: {0}")]
    InvalidCookie(u32),
}

/// Failure of a call into a collaborator (prompt surface, token store,
/// result receiver, sensor driver).
///
/// The session logs these and carries on; they never abort a transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote endpoint is gone (process died, binder closed).
    #[error("Remote endpoint unreachable: {0}")]
    Unreachable(String),

    /// The remote endpoint refused the request.
    #[error("Remote call rejected: {0}")]
    Rejected(String),
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result of a fire-and-forget collaborator call.
pub type RemoteResult = Result<(), RemoteError>;
