//! The authentication session state machine.
//!
//! ## State Diagram
//!
//! ```text
//!                 ┌──────────────┐ credential only  ┌───────────────────┐
//!                 │     Idle     │ ───────────────► │ ShowingCredential │
//!                 └──────┬───────┘                  └───────────────────┘
//!                        │ sensors eligible                   ▲
//!                        ▼                                    │ error + credential allowed
//!                 ┌──────────────┐ ───────────────────────────┘
//!                 │    Called    │
//!                 └──────┬───────┘
//!                        │ every cookie returned
//!                        ▼
//!   ┌─────────┐  reject  ┌──────────────┐  error   ┌────────────────┐
//!   │ Paused  │ ◄─────── │   Started    │ ───────► │ ErrorPendingUi │
//!   └─────────┘ timeout  └──────┬───────┘          └────────────────┘
//!                               │ success
//!                   ┌───────────┴─────────────┐
//!                   ▼                         ▼
//!          ┌────────────────┐     ┌────────────────────────┐
//!          │ PendingConfirm │     │ AuthenticatedPendingUi │
//!          └────────────────┘     └────────────────────────┘
//! ```
//!
//! Dismissal and cancellation deliver the single terminal result and return
//! the session to `Idle`, after which every handler is a logged no-op.

use crate::codes::{
    AuthenticationType, BiometricError, DismissedReason, Modality, ModalityMask, SensorStrength,
};
use crate::collaborators::{
    Collaborators, PresentationSurface, ResultReceiver, ShowPromptRequest, TokenStore,
};
use crate::cookie::{Cookie, CookieGenerator, RandomCookies};
use crate::eligibility::EligibilitySnapshot;
use crate::error::{RemoteResult, SessionError, SessionResult};
use crate::request::SessionRequest;
use crate::sensor::{ArmRequest, SensorId, SensorPhase, SensorState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Session state. Data that only exists in some states lives in the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not started yet, or finished.
    Idle,
    /// Waiting for every sensor to return its cookie.
    Called,
    /// Sensors running, prompt visible.
    Started,
    /// Passive modality rejected; waiting for the user to try again.
    Paused,
    /// Matched, waiting for the user to confirm.
    PendingConfirm {
        token: Option<Vec<u8>>,
        authenticated_at: DateTime<Utc>,
    },
    /// Matched, waiting for the prompt to finish its animation.
    AuthenticatedPendingUi { token: Option<Vec<u8>> },
    /// Error shown, waiting for the prompt to be dismissed.
    ErrorPendingUi,
    /// Biometrics abandoned for PIN/pattern/password.
    ShowingCredential,
}

impl SessionState {
    fn take_token(&mut self) -> Option<Vec<u8>> {
        match self {
            SessionState::PendingConfirm { token, .. }
            | SessionState::AuthenticatedPendingUi { token } => token.take(),
            _ => None,
        }
    }
}

/// Serializable view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Called,
    Started,
    Paused,
    PendingConfirm,
    AuthenticatedPendingUi,
    ErrorPendingUi,
    ShowingCredential,
    /// Terminal result delivered.
    Finished,
}

impl SessionPhase {
    pub fn is_finished(self) -> bool {
        self == SessionPhase::Finished
    }

    /// Waiting on the prompt rather than on hardware.
    pub fn is_awaiting_ui(self) -> bool {
        matches!(
            self,
            SessionPhase::PendingConfirm
                | SessionPhase::AuthenticatedPendingUi
                | SessionPhase::ErrorPendingUi
                | SessionPhase::ShowingCredential
        )
    }
}

impl From<&SessionState> for SessionPhase {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Called => SessionPhase::Called,
            SessionState::Started => SessionPhase::Started,
            SessionState::Paused => SessionPhase::Paused,
            SessionState::PendingConfirm { .. } => SessionPhase::PendingConfirm,
            SessionState::AuthenticatedPendingUi { .. } => SessionPhase::AuthenticatedPendingUi,
            SessionState::ErrorPendingUi => SessionPhase::ErrorPendingUi,
            SessionState::ShowingCredential => SessionPhase::ShowingCredential,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Called => "called",
            SessionPhase::Started => "started",
            SessionPhase::Paused => "paused",
            SessionPhase::PendingConfirm => "pending_confirm",
            SessionPhase::AuthenticatedPendingUi => "authenticated_pending_ui",
            SessionPhase::ErrorPendingUi => "error_pending_ui",
            SessionPhase::ShowingCredential => "showing_credential",
            SessionPhase::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Whether the owner should keep the session or discard it.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProgress {
    Alive,
    Finished,
}

impl SessionProgress {
    pub fn is_finished(self) -> bool {
        self == SessionProgress::Finished
    }
}

/// Per-sensor entry of a [`SessionSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorSnapshot {
    pub id: SensorId,
    pub modality: Modality,
    pub strength: SensorStrength,
    pub phase: SensorPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Cookie>,
}

/// Point-in-time diagnostics for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub operation_id: i64,
    pub is_crypto: bool,
    pub continuing: bool,
    pub eligible_modalities: ModalityMask,
    pub credential_allowed: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub authenticated_time: Option<DateTime<Utc>>,
    pub sensors: Vec<SensorSnapshot>,
}

/// One authentication attempt.
///
/// Not reentrant: the owner must apply one event at a time. Collaborator
/// failures are logged and never change the outcome of a transition.
pub struct AuthSession {
    request: SessionRequest,
    eligibility: EligibilitySnapshot,
    surface: Arc<dyn PresentationSurface>,
    token_store: Arc<dyn TokenStore>,
    /// Taken on terminal delivery, so a second delivery is impossible.
    receiver: Option<Arc<dyn ResultReceiver>>,
    cookies: Box<dyn CookieGenerator>,
    continuing: bool,
    state: SessionState,
    error_escrow: Option<BiometricError>,
    vendor_code_escrow: i32,
    /// OR over the confirmation flags of every cookie acknowledgement.
    confirmation_acked: bool,
    /// Cooperative cancel in flight: wait for every cancelling sensor.
    cancellation_requested: bool,
    start_time: Option<DateTime<Utc>>,
    authenticated_time: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn new(
        request: SessionRequest,
        eligibility: EligibilitySnapshot,
        collaborators: Collaborators,
        continuing: bool,
    ) -> Self {
        Self {
            request,
            eligibility,
            surface: collaborators.surface,
            token_store: collaborators.token_store,
            receiver: Some(collaborators.receiver),
            cookies: Box::new(RandomCookies::new()),
            continuing,
            state: SessionState::Idle,
            error_escrow: None,
            vendor_code_escrow: 0,
            confirmation_acked: false,
            cancellation_requested: false,
            start_time: None,
            authenticated_time: None,
        }
    }

    /// Replace the cookie source.
    pub fn with_cookie_generator(mut self, cookies: impl CookieGenerator + 'static) -> Self {
        self.cookies = Box::new(cookies);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_finished() {
            SessionPhase::Finished
        } else {
            SessionPhase::from(&self.state)
        }
    }

    /// True once the terminal result has been delivered.
    pub fn is_finished(&self) -> bool {
        self.receiver.is_none()
    }

    pub fn is_crypto(&self) -> bool {
        self.request.is_crypto()
    }

    pub fn is_continuing(&self) -> bool {
        self.continuing
    }

    pub fn operation_id(&self) -> i64 {
        self.request.operation_id
    }

    pub fn request(&self) -> &SessionRequest {
        &self.request
    }

    pub fn eligibility(&self) -> &EligibilitySnapshot {
        &self.eligibility
    }

    /// Last error kept for relay on dismissal.
    pub fn escrowed_error(&self) -> Option<(BiometricError, i32)> {
        self.error_escrow.map(|e| (e, self.vendor_code_escrow))
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn authenticated_time(&self) -> Option<DateTime<Utc>> {
        self.authenticated_time
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            operation_id: self.request.operation_id,
            is_crypto: self.is_crypto(),
            continuing: self.continuing,
            eligible_modalities: self.eligibility.eligible_modalities(),
            credential_allowed: self.is_credential_allowed(),
            start_time: self.start_time,
            authenticated_time: self.authenticated_time,
            sensors: self
                .eligibility
                .sensors()
                .iter()
                .map(|s| SensorSnapshot {
                    id: s.id(),
                    modality: s.modality(),
                    strength: s.strength(),
                    phase: SensorPhase::from(s.state()),
                    cookie: s.cookie(),
                })
                .collect(),
        }
    }

    // ---------------------------------------------------------------------
    // Initial transition and cookie barrier
    // ---------------------------------------------------------------------

    /// Show the credential prompt directly, or arm every eligible sensor and
    /// wait for their cookies.
    pub fn go_to_initial_state(&mut self) -> SessionResult<()> {
        if self.is_finished() || self.state != SessionState::Idle {
            return Err(SessionError::InvalidStateTransition(format!(
                "Cannot start session in phase {}",
                self.phase()
            )));
        }

        if self.eligibility.credential_available() && self.eligibility.is_empty() {
            self.set_state(SessionState::ShowingCredential);
            self.show_prompt(ModalityMask::NONE, false);
            Ok(())
        } else if !self.eligibility.is_empty() {
            self.set_state(SessionState::Called);
            let unreachable = self.issue_cookie_round();
            self.on_sensor_unreachable(unreachable);
            Ok(())
        } else {
            Err(SessionError::NoAuthenticatorsRequested)
        }
    }

    /// Arms every sensor. Returns the first sensor whose driver refused the arm.
    fn issue_cookie_round(&mut self) -> Option<(Cookie, Modality)> {
        let mut issued = HashSet::new();
        let mut unreachable = None;
        let user_id = self.request.user_id;
        let policy_requested = self.eligibility.confirmation_requested();

        for sensor in self.eligibility.sensors_mut() {
            let mut cookie = self.cookies.next_cookie();
            while !issued.insert(cookie) {
                cookie = self.cookies.next_cookie();
            }
            let request = ArmRequest {
                cookie,
                requires_confirmation: sensor.confirmation_required_for(user_id, policy_requested),
                operation_id: self.request.operation_id,
                user_id,
                caller: self.request.caller.clone(),
            };
            let result = sensor.go_to_state_waiting_for_cookie(&request);
            if result.is_err() && unreachable.is_none() {
                unreachable = Some((cookie, sensor.modality()));
            }
            log_remote("arm", result);
        }
        debug!(
            operation_id = self.request.operation_id,
            cookies = issued.len(),
            "Issued cookie round"
        );
        unreachable
    }

    /// A sensor is ready. Starts everything once the last cookie is back.
    pub fn on_cookie_received(&mut self, cookie: Cookie, requires_confirmation: bool) {
        if self.ignore_if_finished("cookie") {
            return;
        }
        if self.state != SessionState::Called {
            warn!(cookie = %cookie, phase = %self.phase(), "Cookie received outside readiness round");
            return;
        }
        let Some(sensor) = self.eligibility.sensor_for_cookie_mut(cookie) else {
            warn!(cookie = %cookie, "Unknown cookie ignored");
            return;
        };
        if !sensor.go_to_state_cookie_returned_if_cookie_matches(cookie) {
            debug!(cookie = %cookie, "Duplicate cookie acknowledgement");
            return;
        }
        self.confirmation_acked |= requires_confirmation;

        let remaining = self.eligibility.num_sensors_waiting_for_cookie();
        debug!(remaining, "Remaining cookies");
        if remaining > 0 {
            return;
        }

        self.start_time = Some(Utc::now());
        self.set_state(SessionState::Started);
        let mut unreachable = None;
        for sensor in self.eligibility.sensors_mut() {
            let result = sensor.start_sensor();
            if result.is_err() && unreachable.is_none() {
                unreachable = sensor.cookie().map(|c| (c, sensor.modality()));
            }
            log_remote("start", result);
        }
        if !self.continuing {
            self.show_prompt(self.eligibility.eligible_modalities(), self.confirmation_acked);
        }
        self.on_sensor_unreachable(unreachable);
    }

    /// A sensor whose driver refused a call will never report back, so its
    /// failure is handled as a hardware error right away.
    fn on_sensor_unreachable(&mut self, unreachable: Option<(Cookie, Modality)>) {
        let Some((cookie, modality)) = unreachable else {
            return;
        };
        warn!(
            operation_id = self.request.operation_id,
            cookie = %cookie,
            modality = %modality,
            "Sensor driver unreachable"
        );
        let _ = self.on_error_received(cookie, modality, BiometricError::HwUnavailable, 0);
    }

    // ---------------------------------------------------------------------
    // Sensor events
    // ---------------------------------------------------------------------

    /// A sensor stopped with an error.
    pub fn on_error_received(
        &mut self,
        cookie: Cookie,
        modality: Modality,
        error: BiometricError,
        vendor_code: i32,
    ) -> SessionProgress {
        if !self.eligibility.contains_cookie(cookie) {
            warn!(cookie = %cookie, error = %error, "Unknown or expired cookie");
            return SessionProgress::Alive;
        }
        if self.ignore_if_finished("error") {
            return SessionProgress::Finished;
        }

        let mut was_cancelling = false;
        if let Some(sensor) = self.eligibility.sensor_for_cookie_mut(cookie) {
            was_cancelling = sensor.state() == SensorState::Cancelling;
            sensor.go_to_stopped_state_if_cookie_matches(cookie, error);
        }
        if !was_cancelling {
            self.error_escrow = Some(error);
            self.vendor_code_escrow = vendor_code;
        }
        info!(
            operation_id = self.request.operation_id,
            cookie = %cookie,
            modality = %modality,
            error = %error,
            vendor_code,
            phase = %self.phase(),
            "Sensor error received"
        );

        match self.state {
            SessionState::Called => {
                self.cancel_live_sensors();
                if self.is_credential_allowed() {
                    self.request.prompt.authenticators_allowed =
                        self.request.prompt.authenticators_allowed.without_biometrics();
                    self.set_state(SessionState::ShowingCredential);
                    self.show_prompt(ModalityMask::NONE, false);
                    SessionProgress::Alive
                } else {
                    self.deliver_error(ModalityMask::from(modality), error, vendor_code);
                    self.finish()
                }
            }
            SessionState::Started => {
                if error == BiometricError::Canceled
                    || was_cancelling
                    || self.cancellation_requested
                {
                    self.on_sensor_canceled(modality, error, vendor_code)
                } else if error.is_lockout() && self.is_credential_allowed() {
                    self.set_state(SessionState::ShowingCredential);
                    self.cancel_live_sensors();
                    log_remote(
                        "on_biometric_error",
                        self.surface
                            .on_biometric_error(ModalityMask::from(modality), error, vendor_code),
                    );
                    SessionProgress::Alive
                } else {
                    self.set_state(SessionState::ErrorPendingUi);
                    self.cancel_live_sensors();
                    log_remote(
                        "on_biometric_error",
                        self.surface
                            .on_biometric_error(ModalityMask::from(modality), error, vendor_code),
                    );
                    SessionProgress::Alive
                }
            }
            SessionState::Paused => {
                self.deliver_error(ModalityMask::from(modality), error, vendor_code);
                self.hide_prompt();
                self.cancel_live_sensors();
                self.finish()
            }
            SessionState::ShowingCredential => {
                debug!(error = %error, "Biometric error ignored while showing credential");
                SessionProgress::Alive
            }
            _ if was_cancelling => {
                debug!(error = %error, phase = %self.phase(), "Cancelled sensor reported");
                SessionProgress::Alive
            }
            _ => {
                warn!(error = %error, phase = %self.phase(), "Unhandled error in this phase");
                SessionProgress::Alive
            }
        }
    }

    fn on_sensor_canceled(
        &mut self,
        modality: Modality,
        error: BiometricError,
        vendor_code: i32,
    ) -> SessionProgress {
        if self.cancellation_requested {
            let pending = self.eligibility.num_sensors_in(SensorState::Cancelling);
            if pending > 0 {
                debug!(pending, "Waiting for remaining sensors to cancel");
                return SessionProgress::Alive;
            }
            self.hide_prompt();
            self.deliver_error(
                self.eligibility.eligible_modalities(),
                BiometricError::Canceled,
                0,
            );
            return self.finish();
        }

        self.cancel_live_sensors();
        self.hide_prompt();
        self.deliver_error(ModalityMask::from(modality), error, vendor_code);
        self.finish()
    }

    /// Acquisition guidance for the user.
    pub fn on_acquired(&mut self, acquired_info: i32, message: Option<&str>) {
        if self.ignore_if_finished("acquired") {
            return;
        }
        match message {
            Some(message) if !message.is_empty() => {
                log_remote("on_biometric_help", self.surface.on_biometric_help(message));
            }
            _ => debug!(acquired_info, "Ignoring empty acquisition message"),
        }
    }

    /// A sensor matched the user.
    pub fn on_authentication_succeeded(
        &mut self,
        sensor_id: SensorId,
        requires_confirmation: bool,
        is_strong: bool,
        token: Option<Vec<u8>>,
    ) {
        if self.ignore_if_finished("success") {
            return;
        }
        if !matches!(self.state, SessionState::Started | SessionState::Paused) {
            warn!(sensor_id, phase = %self.phase(), "Success outside an active attempt ignored");
            return;
        }
        let Some(sensor) = self.eligibility.sensor_mut(sensor_id) else {
            warn!(sensor_id, "Success from unknown sensor ignored");
            return;
        };
        sensor.go_to_stopped_state();

        let token = if is_strong {
            token
        } else {
            if token.is_some() {
                warn!(sensor_id, "Dropping auth token for non-strong biometric");
            }
            None
        };

        self.cancel_live_sensors();
        log_remote(
            "on_biometric_authenticated",
            self.surface.on_biometric_authenticated(),
        );

        if requires_confirmation {
            let now = Utc::now();
            self.authenticated_time = Some(now);
            self.set_state(SessionState::PendingConfirm {
                token,
                authenticated_at: now,
            });
        } else {
            self.set_state(SessionState::AuthenticatedPendingUi { token });
        }
    }

    /// A sensor saw a biometric that did not match.
    pub fn on_authentication_rejected(&mut self) {
        if self.ignore_if_finished("rejected") {
            return;
        }
        if !matches!(self.state, SessionState::Started | SessionState::Paused) {
            debug!(phase = %self.phase(), "Rejection outside an active attempt");
        }
        log_remote(
            "on_biometric_error",
            self.surface
                .on_biometric_error(ModalityMask::NONE, BiometricError::PausedRejected, 0),
        );
        if self.eligibility.has_pausable_biometric() {
            self.set_state(SessionState::Paused);
        }
        if let Some(receiver) = &self.receiver {
            log_remote("on_authentication_failed", receiver.on_authentication_failed());
        }
    }

    /// A passive sensor gave up waiting for the user.
    pub fn on_authentication_timed_out(
        &mut self,
        modality: Modality,
        error: BiometricError,
        vendor_code: i32,
    ) {
        if self.ignore_if_finished("timed_out") {
            return;
        }
        if !matches!(self.state, SessionState::Started | SessionState::Paused) {
            debug!(phase = %self.phase(), "Timeout outside an active attempt");
        }
        log_remote(
            "on_biometric_error",
            self.surface
                .on_biometric_error(ModalityMask::from(modality), error, vendor_code),
        );
        self.set_state(SessionState::Paused);
    }

    // ---------------------------------------------------------------------
    // Prompt events
    // ---------------------------------------------------------------------

    /// The user switched to PIN/pattern/password.
    pub fn on_device_credential_pressed(&mut self) {
        if self.ignore_if_finished("device_credential_pressed") {
            return;
        }
        if self.state == SessionState::Idle {
            warn!("Credential pressed before the session started");
            return;
        }
        self.cancel_biometric_only();
        self.set_state(SessionState::ShowingCredential);
    }

    /// The prompt went away. Always terminal.
    pub fn on_dialog_dismissed(
        &mut self,
        reason: DismissedReason,
        credential_attestation: Option<&[u8]>,
    ) -> SessionProgress {
        if self.ignore_if_finished("dialog_dismissed") {
            return SessionProgress::Finished;
        }
        info!(
            operation_id = self.request.operation_id,
            reason = ?reason,
            phase = %self.phase(),
            "Dialog dismissed"
        );

        match reason {
            DismissedReason::CredentialConfirmed
            | DismissedReason::BiometricConfirmed
            | DismissedReason::BiometricConfirmNotRequired => {
                if reason == DismissedReason::CredentialConfirmed {
                    match credential_attestation {
                        Some(attestation) => log_remote(
                            "add_auth_token",
                            self.token_store.add_auth_token(attestation),
                        ),
                        None => warn!("Credential confirmed without attestation"),
                    }
                }
                if let Some(token) = self.state.take_token() {
                    log_remote("add_auth_token", self.token_store.add_auth_token(&token));
                }
                let kind = AuthenticationType::for_dismissal(reason)
                    .unwrap_or(AuthenticationType::Biometric);
                self.deliver_terminal("on_authentication_succeeded", |r| {
                    r.on_authentication_succeeded(kind)
                });
            }
            DismissedReason::Negative => {
                self.deliver_terminal("on_dialog_dismissed", |r| r.on_dialog_dismissed(reason));
                self.cancel_biometric_only();
            }
            DismissedReason::UserCancel => {
                self.deliver_error(
                    self.eligibility.eligible_modalities(),
                    BiometricError::UserCanceled,
                    0,
                );
                self.cancel_biometric_only();
            }
            DismissedReason::ServerRequested | DismissedReason::Error => {
                let error = self.error_escrow.unwrap_or(BiometricError::Canceled);
                self.deliver_error(
                    self.eligibility.eligible_modalities(),
                    error,
                    self.vendor_code_escrow,
                );
                self.cancel_biometric_only();
            }
            DismissedReason::Unknown(code) => {
                warn!(code, "Unhandled dismissal reason, cancelling");
                self.deliver_error(
                    self.eligibility.eligible_modalities(),
                    BiometricError::Canceled,
                    0,
                );
                self.cancel_biometric_only();
            }
        }
        self.finish()
    }

    // ---------------------------------------------------------------------
    // Caller events
    // ---------------------------------------------------------------------

    /// The caller (or the system) wants the session gone.
    ///
    /// While sensors are running and `force` is false, the sensors are asked
    /// to cancel and their canceled errors finish the session.
    pub fn on_cancel_auth_session(&mut self, force: bool) -> SessionProgress {
        if self.ignore_if_finished("cancel") {
            return SessionProgress::Finished;
        }

        if self.state == SessionState::Started && !force {
            self.cancellation_requested = true;
            if self.cancel_live_sensors() > 0 {
                return SessionProgress::Alive;
            }
            debug!("No running sensor to wait for, cancelling immediately");
        }

        self.deliver_error(
            self.eligibility.eligible_modalities(),
            BiometricError::Canceled,
            0,
        );
        self.hide_prompt();
        self.cancel_live_sensors();
        self.finish()
    }

    /// "Try again" after a pause: a fresh readiness round for the same request.
    /// The prompt stays up, so it is not shown again when the round completes.
    pub fn resume_after_pause(&mut self) -> SessionResult<()> {
        if self.is_finished() || self.state != SessionState::Paused {
            return Err(SessionError::InvalidStateTransition(format!(
                "Cannot resume from phase {}",
                self.phase()
            )));
        }
        self.cancel_live_sensors();
        for sensor in self.eligibility.sensors_mut() {
            sensor.go_to_state_unknown();
        }
        self.continuing = true;
        self.cancellation_requested = false;
        self.confirmation_acked = false;
        self.error_escrow = None;
        self.vendor_code_escrow = 0;
        self.set_state(SessionState::Called);
        let unreachable = self.issue_cookie_round();
        self.on_sensor_unreachable(unreachable);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn is_credential_allowed(&self) -> bool {
        self.request.prompt.is_credential_allowed()
    }

    fn set_state(&mut self, next: SessionState) {
        let old_phase = self.phase();
        self.state = next;
        debug!(
            operation_id = self.request.operation_id,
            old_state = %old_phase,
            new_state = %self.phase(),
            "Session state transition"
        );
    }

    fn ignore_if_finished(&self, event: &'static str) -> bool {
        if self.is_finished() {
            warn!(event, operation_id = self.request.operation_id, "Event after session finished");
        }
        self.is_finished()
    }

    /// Cancel every sensor still holding hardware. Returns how many accepted
    /// the cancel and will report back with an error.
    fn cancel_live_sensors(&mut self) -> usize {
        let mut cancelled = 0;
        for sensor in self.eligibility.sensors_mut() {
            if sensor.is_live() {
                let result = sensor.go_to_state_cancelling(&self.request.caller);
                if result.is_ok() {
                    cancelled += 1;
                }
                log_remote("cancel", result);
            }
        }
        cancelled
    }

    fn cancel_biometric_only(&mut self) {
        let cancelled = self.cancel_live_sensors();
        if cancelled > 0 {
            debug!(cancelled, "Cancelled biometric sensors");
        }
    }

    fn show_prompt(&self, modalities: ModalityMask, requires_confirmation: bool) {
        let request = ShowPromptRequest {
            prompt: self.request.prompt.clone(),
            modalities,
            requires_confirmation,
            user_id: self.request.user_id,
            op_package_name: self.request.caller.package_name.clone(),
            operation_id: self.request.operation_id,
        };
        log_remote("show_prompt", self.surface.show_prompt(&request));
    }

    fn hide_prompt(&self) {
        log_remote("hide_prompt", self.surface.hide_prompt());
    }

    fn deliver_error(&mut self, modalities: ModalityMask, error: BiometricError, vendor_code: i32) {
        self.deliver_terminal("on_error", |r| r.on_error(modalities, error, vendor_code));
    }

    fn deliver_terminal(
        &mut self,
        call: &'static str,
        deliver: impl FnOnce(&dyn ResultReceiver) -> RemoteResult,
    ) {
        match self.receiver.take() {
            Some(receiver) => {
                info!(operation_id = self.request.operation_id, call, "Delivering terminal result");
                log_remote(call, deliver(receiver.as_ref()));
            }
            None => warn!(call, "Terminal result already delivered"),
        }
    }

    fn finish(&mut self) -> SessionProgress {
        self.cancellation_requested = false;
        self.set_state(SessionState::Idle);
        SessionProgress::Finished
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("operation_id", &self.request.operation_id)
            .field("phase", &self.phase())
            .field("continuing", &self.continuing)
            .field("sensors", &self.eligibility.sensors())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "phase: {}, is_crypto: {}, operation_id: {}, modalities: {}, credential_allowed: {}, continuing: {}",
            self.phase(),
            self.is_crypto(),
            self.request.operation_id,
            self.eligibility.eligible_modalities(),
            self.is_credential_allowed(),
            self.continuing
        )?;
        for sensor in self.eligibility.sensors() {
            write!(
                f,
                "\n  sensor {}: {} {:?}",
                sensor.id(),
                sensor.modality(),
                SensorPhase::from(sensor.state())
            )?;
        }
        Ok(())
    }
}

fn log_remote(call: &'static str, result: RemoteResult) {
    if let Err(err) = result {
        error!(call, error = %err, "Remote call failed");
    }
}
