//! Async runtime for biometric authentication sessions.
//!
//! An [`biometric_auth_session::AuthSession`] is synchronous and must see one
//! event at a time. [`start_session`] moves it into its own tokio task and
//! hands back a [`SessionHandle`] that driver callbacks, the prompt surface
//! and the caller post [`SessionEvent`]s through.
//!
//! ```text
//!  driver callbacks ─┐
//!  prompt surface  ──┼──► bounded mpsc ──► session task ──► SessionReport
//!  caller          ──┘
//! ```

mod error;
mod event;
mod worker;

pub use error::{RuntimeError, RuntimeResult};
pub use event::SessionEvent;
pub use worker::{start_session, RuntimeConfig, SessionHandle, SessionReport};
