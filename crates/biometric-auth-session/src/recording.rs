//! In-memory collaborators that record every call.
//!
//! Used by the test suites and by the simulator. Each recorder can be put in
//! failing mode, in which calls are still recorded but return
//! [`RemoteError::Unreachable`].

use crate::codes::{
    AuthenticationType, Authenticators, BiometricError, DismissedReason, ModalityMask,
};
use crate::collaborators::{PresentationSurface, ResultReceiver, ShowPromptRequest, TokenStore};
use crate::cookie::Cookie;
use crate::error::{RemoteError, RemoteResult};
use crate::request::CallerIdentity;
use crate::sensor::{ArmRequest, SensorDriver};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

fn outcome(failing: &AtomicBool, endpoint: &str) -> RemoteResult {
    if failing.load(Ordering::SeqCst) {
        Err(RemoteError::Unreachable(endpoint.to_string()))
    } else {
        Ok(())
    }
}

/// A call made on the presentation surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SurfaceCall {
    ShowPrompt {
        modalities: ModalityMask,
        requires_confirmation: bool,
        authenticators: Authenticators,
    },
    HidePrompt,
    Help {
        message: String,
    },
    Error {
        modalities: ModalityMask,
        error: BiometricError,
        vendor_code: i32,
    },
    Authenticated,
}

/// Presentation surface that records calls.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    failing: AtomicBool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn show_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SurfaceCall::ShowPrompt { .. }))
            .count()
    }

    fn record(&self, call: SurfaceCall) -> RemoteResult {
        self.calls.lock().expect("lock poisoned").push(call);
        outcome(&self.failing, "surface")
    }
}

impl PresentationSurface for RecordingSurface {
    fn show_prompt(&self, request: &ShowPromptRequest) -> RemoteResult {
        self.record(SurfaceCall::ShowPrompt {
            modalities: request.modalities,
            requires_confirmation: request.requires_confirmation,
            authenticators: request.prompt.authenticators_allowed,
        })
    }

    fn hide_prompt(&self) -> RemoteResult {
        self.record(SurfaceCall::HidePrompt)
    }

    fn on_biometric_help(&self, message: &str) -> RemoteResult {
        self.record(SurfaceCall::Help {
            message: message.to_string(),
        })
    }

    fn on_biometric_error(
        &self,
        modalities: ModalityMask,
        error: BiometricError,
        vendor_code: i32,
    ) -> RemoteResult {
        self.record(SurfaceCall::Error {
            modalities,
            error,
            vendor_code,
        })
    }

    fn on_biometric_authenticated(&self) -> RemoteResult {
        self.record(SurfaceCall::Authenticated)
    }
}

/// Token store that keeps every token it was handed.
#[derive(Debug, Default)]
pub struct RecordingTokenStore {
    tokens: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl RecordingTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn tokens(&self) -> Vec<Vec<u8>> {
        self.tokens.lock().expect("lock poisoned").clone()
    }
}

impl TokenStore for RecordingTokenStore {
    fn add_auth_token(&self, token: &[u8]) -> RemoteResult {
        self.tokens.lock().expect("lock poisoned").push(token.to_vec());
        outcome(&self.failing, "token_store")
    }
}

/// Something delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "delivery", rename_all = "snake_case")]
pub enum Delivery {
    Succeeded {
        kind: AuthenticationType,
    },
    /// Non-terminal retry hint.
    Failed,
    Error {
        modalities: ModalityMask,
        error: BiometricError,
        vendor_code: i32,
    },
    Dismissed {
        reason: DismissedReason,
    },
}

impl Delivery {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Delivery::Failed)
    }
}

/// Result receiver that records deliveries.
#[derive(Debug, Default)]
pub struct RecordingReceiver {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl RecordingReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().expect("lock poisoned").clone()
    }

    pub fn terminal_count(&self) -> usize {
        self.deliveries().iter().filter(|d| d.is_terminal()).count()
    }

    /// The terminal delivery, if one happened.
    pub fn terminal(&self) -> Option<Delivery> {
        self.deliveries().into_iter().find(Delivery::is_terminal)
    }

    fn record(&self, delivery: Delivery) -> RemoteResult {
        self.deliveries.lock().expect("lock poisoned").push(delivery);
        outcome(&self.failing, "receiver")
    }
}

impl ResultReceiver for RecordingReceiver {
    fn on_authentication_succeeded(&self, kind: AuthenticationType) -> RemoteResult {
        self.record(Delivery::Succeeded { kind })
    }

    fn on_authentication_failed(&self) -> RemoteResult {
        self.record(Delivery::Failed)
    }

    fn on_error(
        &self,
        modalities: ModalityMask,
        error: BiometricError,
        vendor_code: i32,
    ) -> RemoteResult {
        self.record(Delivery::Error {
            modalities,
            error,
            vendor_code,
        })
    }

    fn on_dialog_dismissed(&self, reason: DismissedReason) -> RemoteResult {
        self.record(Delivery::Dismissed { reason })
    }
}

/// A call made on a sensor driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SensorCall {
    Arm {
        cookie: Cookie,
        requires_confirmation: bool,
    },
    Start {
        cookie: Cookie,
    },
    Cancel {
        cookie: Cookie,
    },
}

/// Sensor driver that records calls.
#[derive(Debug, Default)]
pub struct RecordingSensorDriver {
    calls: Mutex<Vec<SensorCall>>,
    failing: AtomicBool,
    always_require_confirmation: bool,
}

impl RecordingSensorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user setting that forces confirmation is on.
    pub fn always_requiring_confirmation(mut self) -> Self {
        self.always_require_confirmation = true;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SensorCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn last_armed_cookie(&self) -> Option<Cookie> {
        self.calls().iter().rev().find_map(|c| match c {
            SensorCall::Arm { cookie, .. } => Some(*cookie),
            _ => None,
        })
    }

    pub fn cancel_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SensorCall::Cancel { .. }))
            .count()
    }

    fn record(&self, call: SensorCall) -> RemoteResult {
        self.calls.lock().expect("lock poisoned").push(call);
        outcome(&self.failing, "sensor")
    }
}

impl SensorDriver for RecordingSensorDriver {
    fn arm(&self, request: &ArmRequest) -> RemoteResult {
        self.record(SensorCall::Arm {
            cookie: request.cookie,
            requires_confirmation: request.requires_confirmation,
        })
    }

    fn start(&self, cookie: Cookie) -> RemoteResult {
        self.record(SensorCall::Start { cookie })
    }

    fn cancel(&self, cookie: Cookie, _caller: &CallerIdentity) -> RemoteResult {
        self.record(SensorCall::Cancel { cookie })
    }

    fn confirmation_always_required(&self, _user_id: i32) -> bool {
        self.always_require_confirmation
    }
}
