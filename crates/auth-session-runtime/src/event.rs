//! Inbound session events.

use biometric_auth_session::{BiometricError, Cookie, DismissedReason, Modality, SensorId};

/// Everything that can happen to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A sensor echoed its readiness cookie.
    CookieReceived {
        cookie: Cookie,
        requires_confirmation: bool,
    },
    ErrorReceived {
        cookie: Cookie,
        modality: Modality,
        error: BiometricError,
        vendor_code: i32,
    },
    Acquired {
        acquired_info: i32,
        message: Option<String>,
    },
    AuthenticationSucceeded {
        sensor_id: SensorId,
        requires_confirmation: bool,
        is_strong: bool,
        token: Option<Vec<u8>>,
    },
    AuthenticationRejected,
    AuthenticationTimedOut {
        modality: Modality,
        error: BiometricError,
        vendor_code: i32,
    },
    DeviceCredentialPressed,
    DialogDismissed {
        reason: DismissedReason,
        credential_attestation: Option<Vec<u8>>,
    },
    CancelAuthSession {
        force: bool,
    },
    /// The user asked for another attempt after a pause.
    TryAgainPressed,
}

impl SessionEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::CookieReceived { .. } => "cookie_received",
            SessionEvent::ErrorReceived { .. } => "error_received",
            SessionEvent::Acquired { .. } => "acquired",
            SessionEvent::AuthenticationSucceeded { .. } => "authentication_succeeded",
            SessionEvent::AuthenticationRejected => "authentication_rejected",
            SessionEvent::AuthenticationTimedOut { .. } => "authentication_timed_out",
            SessionEvent::DeviceCredentialPressed => "device_credential_pressed",
            SessionEvent::DialogDismissed { .. } => "dialog_dismissed",
            SessionEvent::CancelAuthSession { .. } => "cancel_auth_session",
            SessionEvent::TryAgainPressed => "try_again_pressed",
        }
    }
}
