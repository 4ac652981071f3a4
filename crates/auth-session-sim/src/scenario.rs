//! Scenario files: a request, the eligible sensors and a list of steps.
//!
//! Tokens and attestations are base64 in the file. Steps name sensors by id;
//! cookies are looked up at run time.

use anyhow::{bail, Context};
use base64::Engine;
use biometric_auth_session::{
    BiometricError, DismissedReason, Modality, SensorId, SensorStrength, SessionRequest,
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub request: SessionRequest,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub credential_available: bool,
    /// Caller-side confirmation policy.
    #[serde(default)]
    pub confirmation_requested: bool,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub id: SensorId,
    pub modality: Modality,
    pub strength: SensorStrength,
    #[serde(default)]
    pub confirmation_supported: bool,
    /// The user setting that forces confirmation on this sensor.
    #[serde(default)]
    pub always_confirm: bool,
    /// Driver calls fail (calls are still recorded).
    #[serde(default)]
    pub failing: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// The sensor returns its current cookie.
    Ack {
        sensor: SensorId,
        #[serde(default)]
        requires_confirmation: bool,
    },
    /// Every sensor holding a cookie returns it.
    AckAll,
    Error {
        sensor: SensorId,
        error: BiometricError,
        #[serde(default)]
        vendor_code: i32,
    },
    Acquired {
        #[serde(default)]
        acquired_info: i32,
        #[serde(default)]
        message: Option<String>,
    },
    Succeed {
        sensor: SensorId,
        #[serde(default)]
        requires_confirmation: bool,
        #[serde(default)]
        token: Option<String>,
    },
    Reject,
    Timeout {
        sensor: SensorId,
        #[serde(default)]
        vendor_code: i32,
    },
    CredentialPressed,
    Dismiss {
        reason: DismissedReason,
        #[serde(default)]
        attestation: Option<String>,
    },
    Cancel {
        #[serde(default)]
        force: bool,
    },
    TryAgain,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Ack { .. } => "ack",
            Step::AckAll => "ack_all",
            Step::Error { .. } => "error",
            Step::Acquired { .. } => "acquired",
            Step::Succeed { .. } => "succeed",
            Step::Reject => "reject",
            Step::Timeout { .. } => "timeout",
            Step::CredentialPressed => "credential_pressed",
            Step::Dismiss { .. } => "dismiss",
            Step::Cancel { .. } => "cancel",
            Step::TryAgain => "try_again",
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = serde_json::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn sensor(&self, id: SensorId) -> Option<&SensorConfig> {
        self.sensors.iter().find(|s| s.id == id)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let mut ids = HashSet::new();
        for sensor in &self.sensors {
            if !ids.insert(sensor.id) {
                bail!("Duplicate sensor id {}", sensor.id);
            }
        }
        for (index, step) in self.steps.iter().enumerate() {
            let referenced = match step {
                Step::Ack { sensor, .. }
                | Step::Error { sensor, .. }
                | Step::Succeed { sensor, .. }
                | Step::Timeout { sensor, .. } => Some(*sensor),
                _ => None,
            };
            if let Some(id) = referenced.filter(|id| !ids.contains(id)) {
                bail!("Step {} ({}) references unknown sensor {}", index, step.name(), id);
            }
            decode_blob(step_blob(step)).with_context(|| format!("Step {}", index))?;
        }
        Ok(())
    }
}

fn step_blob(step: &Step) -> Option<&str> {
    match step {
        Step::Succeed { token, .. } => token.as_deref(),
        Step::Dismiss { attestation, .. } => attestation.as_deref(),
        _ => None,
    }
}

/// Decode an optional base64 field.
pub fn decode_blob(blob: Option<&str>) -> anyhow::Result<Option<Vec<u8>>> {
    blob.map(|b| BASE64.decode(b).context("Invalid base64"))
        .transpose()
}
