//! Per-sensor handle and its lifecycle state machine.
//!
//! ## State Diagram
//!
//! ```text
//!   Unknown ──Arm──► WaitingForCookie ──CookieAcked──► CookieReturned ──Start──► Authenticating
//!                          │                               │                         │
//!                          │ Cancel / Stop                 │ Cancel / Stop           │ Cancel
//!                          ▼                               ▼                         ▼
//!                   Cancelling / Stopped           Cancelling / Stopped         Cancelling ──Stop──► Stopped
//!
//!   Reset returns any armed or stopped sensor to Unknown for a new round.
//! ```

use crate::codes::{BiometricError, Modality, SensorStrength};
use crate::cookie::Cookie;
use crate::error::RemoteResult;
use crate::request::CallerIdentity;
use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub sensor_machine(Unknown)

    Unknown => {
        Arm => WaitingForCookie
    },
    WaitingForCookie => {
        CookieAcked => CookieReturned,
        Cancel => Cancelling,
        Stop => Stopped,
        Reset => Unknown
    },
    CookieReturned => {
        Start => Authenticating,
        Cancel => Cancelling,
        Stop => Stopped,
        Reset => Unknown
    },
    Authenticating => {
        Cancel => Cancelling,
        Stop => Stopped,
        Reset => Unknown
    },
    Cancelling => {
        Stop => Stopped,
        Reset => Unknown
    },
    Stopped => {
        Reset => Unknown
    }
}

pub use sensor_machine::Input as SensorInput;
pub use sensor_machine::State as SensorState;
pub use sensor_machine::StateMachine as SensorMachine;

/// Serializable view of [`SensorState`] for snapshots and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorPhase {
    Unknown,
    WaitingForCookie,
    CookieReturned,
    Authenticating,
    Cancelling,
    Stopped,
}

impl From<SensorState> for SensorPhase {
    fn from(state: SensorState) -> Self {
        match state {
            SensorState::Unknown => SensorPhase::Unknown,
            SensorState::WaitingForCookie => SensorPhase::WaitingForCookie,
            SensorState::CookieReturned => SensorPhase::CookieReturned,
            SensorState::Authenticating => SensorPhase::Authenticating,
            SensorState::Cancelling => SensorPhase::Cancelling,
            SensorState::Stopped => SensorPhase::Stopped,
        }
    }
}

/// Identifier of a sensor, unique within one eligibility snapshot.
pub type SensorId = i32;

/// Arguments sent to a driver when arming it for a readiness round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmRequest {
    pub cookie: Cookie,
    pub requires_confirmation: bool,
    pub operation_id: i64,
    pub user_id: i32,
    pub caller: CallerIdentity,
}

/// The hardware-facing service behind one sensor.
pub trait SensorDriver: Send + Sync {
    /// Prepare an authentication client that waits for `start`. The driver
    /// acknowledges readiness by echoing the cookie back to the session.
    fn arm(&self, request: &ArmRequest) -> RemoteResult;

    /// Start the client prepared for `cookie`.
    fn start(&self, cookie: Cookie) -> RemoteResult;

    /// Cancel the client for `cookie`. Completion is reported asynchronously
    /// as a canceled error.
    fn cancel(&self, cookie: Cookie, caller: &CallerIdentity) -> RemoteResult;

    /// Per-user setting forcing explicit confirmation for this sensor.
    fn confirmation_always_required(&self, _user_id: i32) -> bool {
        false
    }
}

/// A sensor taking part in a session.
pub struct BiometricSensor {
    id: SensorId,
    modality: Modality,
    strength: SensorStrength,
    confirmation_supported: bool,
    driver: Arc<dyn SensorDriver>,
    cookie: Option<Cookie>,
    machine: SensorMachine,
    last_error: Option<BiometricError>,
}

impl BiometricSensor {
    pub fn new(
        id: SensorId,
        modality: Modality,
        strength: SensorStrength,
        driver: Arc<dyn SensorDriver>,
    ) -> Self {
        Self {
            id,
            modality,
            strength,
            confirmation_supported: false,
            driver,
            cookie: None,
            machine: SensorMachine::new(),
            last_error: None,
        }
    }

    /// Whether the sensor can hold a match until the user confirms it.
    pub fn with_confirmation_supported(mut self, supported: bool) -> Self {
        self.confirmation_supported = supported;
        self
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn strength(&self) -> SensorStrength {
        self.strength
    }

    pub fn confirmation_supported(&self) -> bool {
        self.confirmation_supported
    }

    /// Cookie of the current round, if armed.
    pub fn cookie(&self) -> Option<Cookie> {
        self.cookie
    }

    pub fn state(&self) -> SensorState {
        *self.machine.state()
    }

    /// Error that stopped the sensor, if any.
    pub fn last_error(&self) -> Option<BiometricError> {
        self.last_error
    }

    /// Armed or running: hardware resources are held.
    pub fn is_live(&self) -> bool {
        matches!(
            self.state(),
            SensorState::WaitingForCookie | SensorState::CookieReturned | SensorState::Authenticating
        )
    }

    pub(crate) fn confirmation_required_for(&self, user_id: i32, policy_requested: bool) -> bool {
        self.confirmation_supported
            && (self.driver.confirmation_always_required(user_id) || policy_requested)
    }

    fn apply(&mut self, input: SensorInput) -> bool {
        match self.machine.consume(&input) {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    sensor_id = self.id,
                    state = ?self.state(),
                    input = ?input,
                    "Illegal sensor transition ignored"
                );
                false
            }
        }
    }

    pub(crate) fn go_to_state_unknown(&mut self) {
        self.cookie = None;
        self.last_error = None;
        if self.state() != SensorState::Unknown {
            self.apply(SensorInput::Reset);
        }
    }

    pub(crate) fn go_to_state_waiting_for_cookie(&mut self, request: &ArmRequest) -> RemoteResult {
        if !self.apply(SensorInput::Arm) {
            return Ok(());
        }
        self.cookie = Some(request.cookie);
        debug!(
            sensor_id = self.id,
            cookie = %request.cookie,
            requires_confirmation = request.requires_confirmation,
            "Arming sensor"
        );
        self.driver.arm(request)
    }

    /// Returns true if the cookie belongs to this sensor and it was waiting.
    pub(crate) fn go_to_state_cookie_returned_if_cookie_matches(&mut self, cookie: Cookie) -> bool {
        if self.cookie != Some(cookie) || self.state() != SensorState::WaitingForCookie {
            return false;
        }
        self.apply(SensorInput::CookieAcked)
    }

    pub(crate) fn start_sensor(&mut self) -> RemoteResult {
        let Some(cookie) = self.cookie else {
            return Ok(());
        };
        if self.state() != SensorState::CookieReturned || !self.apply(SensorInput::Start) {
            return Ok(());
        }
        self.driver.start(cookie)
    }

    pub(crate) fn go_to_state_cancelling(&mut self, caller: &CallerIdentity) -> RemoteResult {
        let Some(cookie) = self.cookie else {
            return Ok(());
        };
        if !self.is_live() || !self.apply(SensorInput::Cancel) {
            return Ok(());
        }
        let result = self.driver.cancel(cookie, caller);
        if result.is_err() {
            // No cancellation error will ever arrive for this cookie.
            self.apply(SensorInput::Stop);
        }
        result
    }

    /// The sensor finished on its own (successful match).
    pub(crate) fn go_to_stopped_state(&mut self) {
        if matches!(self.state(), SensorState::Unknown | SensorState::Stopped) {
            return;
        }
        self.apply(SensorInput::Stop);
    }

    pub(crate) fn go_to_stopped_state_if_cookie_matches(
        &mut self,
        cookie: Cookie,
        error: BiometricError,
    ) -> bool {
        if self.cookie != Some(cookie) {
            return false;
        }
        if matches!(self.state(), SensorState::Unknown | SensorState::Stopped) {
            return false;
        }
        self.last_error = Some(error);
        self.apply(SensorInput::Stop)
    }
}

impl fmt::Debug for BiometricSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BiometricSensor")
            .field("id", &self.id)
            .field("modality", &self.modality)
            .field("strength", &self.strength)
            .field("confirmation_supported", &self.confirmation_supported)
            .field("cookie", &self.cookie)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{RecordingSensorDriver, SensorCall};

    fn caller() -> CallerIdentity {
        CallerIdentity {
            uid: 1000,
            pid: 1,
            user_id: 0,
            package_name: "android".to_string(),
        }
    }

    fn arm_request(cookie: u32) -> ArmRequest {
        ArmRequest {
            cookie: Cookie::new(cookie).unwrap(),
            requires_confirmation: false,
            operation_id: 0,
            user_id: 0,
            caller: caller(),
        }
    }

    fn sensor() -> (BiometricSensor, Arc<RecordingSensorDriver>) {
        let driver = Arc::new(RecordingSensorDriver::new());
        let sensor = BiometricSensor::new(
            1,
            Modality::Fingerprint,
            SensorStrength::Strong,
            driver.clone(),
        );
        (sensor, driver)
    }

    #[test]
    fn test_initial_state_is_unknown() {
        let (sensor, _) = sensor();
        assert_eq!(sensor.state(), SensorState::Unknown);
        assert!(sensor.cookie().is_none());
        assert!(!sensor.is_live());
    }

    #[test]
    fn test_full_lifecycle() {
        let (mut sensor, driver) = sensor();
        let cookie = Cookie::new(9).unwrap();

        sensor.go_to_state_waiting_for_cookie(&arm_request(9)).unwrap();
        assert_eq!(sensor.state(), SensorState::WaitingForCookie);
        assert_eq!(sensor.cookie(), Some(cookie));

        assert!(sensor.go_to_state_cookie_returned_if_cookie_matches(cookie));
        assert_eq!(sensor.state(), SensorState::CookieReturned);

        sensor.start_sensor().unwrap();
        assert_eq!(sensor.state(), SensorState::Authenticating);

        sensor.go_to_state_cancelling(&caller()).unwrap();
        assert_eq!(sensor.state(), SensorState::Cancelling);

        assert!(sensor.go_to_stopped_state_if_cookie_matches(cookie, BiometricError::Canceled));
        assert_eq!(sensor.state(), SensorState::Stopped);
        assert_eq!(sensor.last_error(), Some(BiometricError::Canceled));

        assert_eq!(
            driver.calls(),
            vec![
                SensorCall::Arm {
                    cookie,
                    requires_confirmation: false
                },
                SensorCall::Start { cookie },
                SensorCall::Cancel { cookie },
            ]
        );
    }

    #[test]
    fn test_wrong_cookie_does_not_advance() {
        let (mut sensor, _) = sensor();
        sensor.go_to_state_waiting_for_cookie(&arm_request(3)).unwrap();

        assert!(!sensor.go_to_state_cookie_returned_if_cookie_matches(Cookie::new(4).unwrap()));
        assert_eq!(sensor.state(), SensorState::WaitingForCookie);
    }

    #[test]
    fn test_duplicate_ack_is_not_counted_twice() {
        let (mut sensor, _) = sensor();
        let cookie = Cookie::new(3).unwrap();
        sensor.go_to_state_waiting_for_cookie(&arm_request(3)).unwrap();

        assert!(sensor.go_to_state_cookie_returned_if_cookie_matches(cookie));
        assert!(!sensor.go_to_state_cookie_returned_if_cookie_matches(cookie));
    }

    #[test]
    fn test_start_requires_returned_cookie() {
        let (mut sensor, driver) = sensor();
        sensor.go_to_state_waiting_for_cookie(&arm_request(3)).unwrap();

        sensor.start_sensor().unwrap();
        assert_eq!(sensor.state(), SensorState::WaitingForCookie);
        assert_eq!(driver.calls().len(), 1);
    }

    #[test]
    fn test_refused_cancel_stops_the_sensor() {
        let (mut sensor, driver) = sensor();
        sensor.go_to_state_waiting_for_cookie(&arm_request(3)).unwrap();
        driver.set_failing(true);

        assert!(sensor.go_to_state_cancelling(&caller()).is_err());
        assert_eq!(sensor.state(), SensorState::Stopped);
        assert!(!sensor.is_live());
    }

    #[test]
    fn test_cancel_is_noop_when_not_live() {
        let (mut sensor, driver) = sensor();
        sensor.go_to_state_cancelling(&caller()).unwrap();
        assert_eq!(sensor.state(), SensorState::Unknown);
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn test_reset_clears_cookie() {
        let (mut sensor, _) = sensor();
        let cookie = Cookie::new(5).unwrap();
        sensor.go_to_state_waiting_for_cookie(&arm_request(5)).unwrap();
        sensor.go_to_stopped_state_if_cookie_matches(cookie, BiometricError::Lockout);

        sensor.go_to_state_unknown();
        assert_eq!(sensor.state(), SensorState::Unknown);
        assert!(sensor.cookie().is_none());
        assert!(sensor.last_error().is_none());
    }

    #[test]
    fn test_confirmation_requires_support() {
        let driver = Arc::new(RecordingSensorDriver::new().always_requiring_confirmation());
        let face = BiometricSensor::new(2, Modality::Face, SensorStrength::Weak, driver.clone());
        assert!(!face.confirmation_required_for(0, true));

        let face = face.with_confirmation_supported(true);
        assert!(face.confirmation_required_for(0, false));

        let plain = BiometricSensor::new(
            3,
            Modality::Face,
            SensorStrength::Weak,
            Arc::new(RecordingSensorDriver::new()),
        )
        .with_confirmation_supported(true);
        assert!(!plain.confirmation_required_for(0, false));
        assert!(plain.confirmation_required_for(0, true));
    }

    #[test]
    fn test_phase_view_serializes_snake_case() {
        let json = serde_json::to_string(&SensorPhase::from(SensorState::WaitingForCookie)).unwrap();
        assert_eq!(json, "\"waiting_for_cookie\"");
    }

    #[test]
    fn test_illegal_transition_is_rejected_by_machine() {
        let mut machine = SensorMachine::new();
        assert!(machine.consume(&SensorInput::Start).is_err());
        assert_eq!(*machine.state(), SensorState::Unknown);
    }
}
