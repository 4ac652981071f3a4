//! The eligibility snapshot a session is built from.

use crate::codes::ModalityMask;
use crate::cookie::Cookie;
use crate::sensor::{BiometricSensor, SensorId, SensorState};

/// Sensors allowed to take part in one request, resolved before the session
/// exists. The set of sensors never changes afterwards; only their states do.
#[derive(Debug)]
pub struct EligibilitySnapshot {
    sensors: Vec<BiometricSensor>,
    credential_available: bool,
    confirmation_requested: bool,
}

impl EligibilitySnapshot {
    pub fn new(sensors: Vec<BiometricSensor>, credential_available: bool) -> Self {
        Self {
            sensors,
            credential_available,
            confirmation_requested: false,
        }
    }

    /// Policy asks for explicit confirmation on sensors that support it.
    pub fn with_confirmation_requested(mut self, requested: bool) -> Self {
        self.confirmation_requested = requested;
        self
    }

    pub fn sensors(&self) -> &[BiometricSensor] {
        &self.sensors
    }

    pub(crate) fn sensors_mut(&mut self) -> &mut [BiometricSensor] {
        &mut self.sensors
    }

    pub fn sensor(&self, id: SensorId) -> Option<&BiometricSensor> {
        self.sensors.iter().find(|s| s.id() == id)
    }

    pub(crate) fn sensor_mut(&mut self, id: SensorId) -> Option<&mut BiometricSensor> {
        self.sensors.iter_mut().find(|s| s.id() == id)
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn credential_available(&self) -> bool {
        self.credential_available
    }

    pub fn confirmation_requested(&self) -> bool {
        self.confirmation_requested
    }

    /// OR of every eligible sensor's modality.
    pub fn eligible_modalities(&self) -> ModalityMask {
        self.sensors.iter().map(BiometricSensor::modality).collect()
    }

    pub fn num_sensors_waiting_for_cookie(&self) -> usize {
        self.sensors
            .iter()
            .filter(|s| s.state() == SensorState::WaitingForCookie)
            .count()
    }

    pub fn num_sensors_in(&self, state: SensorState) -> usize {
        self.sensors.iter().filter(|s| s.state() == state).count()
    }

    /// Whether `cookie` was issued to one of the eligible sensors this round.
    pub fn contains_cookie(&self, cookie: Cookie) -> bool {
        self.sensors.iter().any(|s| s.cookie() == Some(cookie))
    }

    pub(crate) fn sensor_for_cookie_mut(&mut self, cookie: Cookie) -> Option<&mut BiometricSensor> {
        self.sensors.iter_mut().find(|s| s.cookie() == Some(cookie))
    }

    /// Any eligible sensor of a passive, continuously-trying modality.
    pub fn has_pausable_biometric(&self) -> bool {
        self.sensors.iter().any(|s| s.modality().is_pausable())
    }
}
