//! Contracts for the services a session talks to.
//!
//! Every call is a fire-and-forget request. A returned [`RemoteError`] is
//! logged by the session and never changes the outcome of a transition.

use crate::codes::{AuthenticationType, BiometricError, DismissedReason, ModalityMask};
use crate::error::RemoteResult;
use crate::request::PromptInfo;
use serde::Serialize;
use std::sync::Arc;

/// Arguments for showing the authentication prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowPromptRequest {
    pub prompt: PromptInfo,
    /// Modalities that may be running. Empty for a credential-only prompt.
    pub modalities: ModalityMask,
    pub requires_confirmation: bool,
    pub user_id: i32,
    pub op_package_name: String,
    pub operation_id: i64,
}

/// The UI that renders the prompt.
pub trait PresentationSurface: Send + Sync {
    fn show_prompt(&self, request: &ShowPromptRequest) -> RemoteResult;

    fn hide_prompt(&self) -> RemoteResult;

    /// Acquisition guidance ("move your finger slightly").
    fn on_biometric_help(&self, message: &str) -> RemoteResult;

    fn on_biometric_error(
        &self,
        modalities: ModalityMask,
        error: BiometricError,
        vendor_code: i32,
    ) -> RemoteResult;

    fn on_biometric_authenticated(&self) -> RemoteResult;
}

/// Secure storage that is unlocked by authentication tokens.
pub trait TokenStore: Send + Sync {
    fn add_auth_token(&self, token: &[u8]) -> RemoteResult;
}

/// The original caller.
///
/// A session delivers at most one terminal callback (success, error or
/// dismissal). `on_authentication_failed` is a non-terminal retry hint.
pub trait ResultReceiver: Send + Sync {
    fn on_authentication_succeeded(&self, kind: AuthenticationType) -> RemoteResult;

    fn on_authentication_failed(&self) -> RemoteResult;

    fn on_error(
        &self,
        modalities: ModalityMask,
        error: BiometricError,
        vendor_code: i32,
    ) -> RemoteResult;

    fn on_dialog_dismissed(&self, reason: DismissedReason) -> RemoteResult;
}

/// The collaborators injected into a session at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub surface: Arc<dyn PresentationSurface>,
    pub token_store: Arc<dyn TokenStore>,
    pub receiver: Arc<dyn ResultReceiver>,
}
