//! Drives a scenario through the session runtime with recording collaborators.

use crate::scenario::{decode_blob, Scenario, Step};
use anyhow::{anyhow, Context};
use auth_session_runtime::{
    start_session, RuntimeConfig, RuntimeError, SessionEvent, SessionHandle, SessionReport,
};
use biometric_auth_session::recording::{
    Delivery, RecordingReceiver, RecordingSensorDriver, RecordingSurface, RecordingTokenStore,
    SensorCall, SurfaceCall,
};
use biometric_auth_session::{
    AuthSession, BiometricError, BiometricSensor, Collaborators, Cookie, EligibilitySnapshot,
    Modality, SensorId, SessionPhase, SessionSnapshot,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Phase reached after one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: &'static str,
    pub phase: SessionPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorCallRecord {
    pub sensor: SensorId,
    #[serde(flatten)]
    pub call: SensorCall,
}

/// Everything observed while running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub scenario: String,
    pub steps: Vec<StepRecord>,
    pub surface_calls: Vec<SurfaceCall>,
    pub sensor_calls: Vec<SensorCallRecord>,
    pub deliveries: Vec<Delivery>,
    /// Tokens are never printed, only counted.
    pub tokens_stored: usize,
    pub report: SessionReport,
}

impl RunOutcome {
    pub fn terminal(&self) -> Option<&Delivery> {
        self.deliveries.iter().find(|d| d.is_terminal())
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario: {}", self.scenario)?;
        writeln!(f, "{}", "-".repeat(50))?;
        for step in &self.steps {
            writeln!(f, "  {:>2}. {:<20} -> {}", step.index, step.step, step.phase)?;
        }
        writeln!(f, "\nSensor calls:")?;
        for record in &self.sensor_calls {
            writeln!(f, "  sensor {}: {:?}", record.sensor, record.call)?;
        }
        writeln!(f, "\nSurface calls:")?;
        for call in &self.surface_calls {
            writeln!(f, "  {:?}", call)?;
        }
        writeln!(f, "\nDeliveries:")?;
        for delivery in &self.deliveries {
            writeln!(f, "  {:?}", delivery)?;
        }
        writeln!(f, "\n  {:<16} {}", "Tokens stored:", self.tokens_stored)?;
        writeln!(f, "  {:<16} {}", "Final phase:", self.report.final_phase)?;
        writeln!(f, "  {:<16} {}", "Events:", self.report.events_processed)?;
        writeln!(f, "  {:<16} {}", "Continuations:", self.report.continuations)?;
        write!(f, "  {:<16} {}", "Finished:", self.report.finished)
    }
}

struct Recorders {
    surface: Arc<RecordingSurface>,
    token_store: Arc<RecordingTokenStore>,
    receiver: Arc<RecordingReceiver>,
    drivers: Vec<(SensorId, Arc<RecordingSensorDriver>)>,
}

fn build_session(scenario: &Scenario) -> (AuthSession, Recorders) {
    let mut drivers = Vec::new();
    let mut sensors = Vec::new();
    for config in &scenario.sensors {
        let driver = if config.always_confirm {
            RecordingSensorDriver::new().always_requiring_confirmation()
        } else {
            RecordingSensorDriver::new()
        };
        driver.set_failing(config.failing);
        let driver = Arc::new(driver);
        drivers.push((config.id, driver.clone()));
        sensors.push(
            BiometricSensor::new(config.id, config.modality, config.strength, driver)
                .with_confirmation_supported(config.confirmation_supported),
        );
    }

    let recorders = Recorders {
        surface: Arc::new(RecordingSurface::new()),
        token_store: Arc::new(RecordingTokenStore::new()),
        receiver: Arc::new(RecordingReceiver::new()),
        drivers,
    };
    let eligibility = EligibilitySnapshot::new(sensors, scenario.credential_available)
        .with_confirmation_requested(scenario.confirmation_requested);
    let session = AuthSession::new(
        scenario.request.clone(),
        eligibility,
        Collaborators {
            surface: recorders.surface.clone(),
            token_store: recorders.token_store.clone(),
            receiver: recorders.receiver.clone(),
        },
        false,
    );
    (session, recorders)
}

/// Run every step, then release the handle and collect the report.
pub async fn run(scenario: &Scenario, config: RuntimeConfig) -> anyhow::Result<RunOutcome> {
    info!(scenario = %scenario.name, steps = scenario.steps.len(), "Running scenario");
    let (session, recorders) = build_session(scenario);
    let (handle, join) = start_session(session, config).context("Session failed to start")?;

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        for event in events_for(scenario, &handle, step).await? {
            handle
                .post(event)
                .await
                .with_context(|| format!("Step {} ({})", index, step.name()))?;
        }
        steps.push(StepRecord {
            index,
            step: step.name(),
            phase: current_phase(&handle).await?,
        });
    }

    drop(handle);
    let report = join.await.context("Session task panicked")?;

    let sensor_calls = recorders
        .drivers
        .iter()
        .flat_map(|(id, driver)| {
            driver.calls().into_iter().map(move |call| SensorCallRecord {
                sensor: *id,
                call,
            })
        })
        .collect();

    Ok(RunOutcome {
        scenario: scenario.name.clone(),
        steps,
        surface_calls: recorders.surface.calls(),
        sensor_calls,
        deliveries: recorders.receiver.deliveries(),
        tokens_stored: recorders.token_store.tokens().len(),
        report,
    })
}

async fn snapshot(handle: &SessionHandle) -> anyhow::Result<Option<SessionSnapshot>> {
    match handle.snapshot().await {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(RuntimeError::SessionClosed) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn current_phase(handle: &SessionHandle) -> anyhow::Result<SessionPhase> {
    Ok(snapshot(handle)
        .await?
        .map(|s| s.phase)
        .unwrap_or(SessionPhase::Finished))
}

/// Cookie currently held by a sensor. `None` once the session has ended.
async fn cookie_of(handle: &SessionHandle, sensor: SensorId) -> anyhow::Result<Option<Cookie>> {
    let Some(snapshot) = snapshot(handle).await? else {
        return Ok(None);
    };
    let cookie = snapshot
        .sensors
        .iter()
        .find(|s| s.id == sensor)
        .and_then(|s| s.cookie)
        .ok_or_else(|| anyhow!("Sensor {} holds no cookie", sensor))?;
    Ok(Some(cookie))
}

async fn events_for(
    scenario: &Scenario,
    handle: &SessionHandle,
    step: &Step,
) -> anyhow::Result<Vec<SessionEvent>> {
    let events = match step {
        Step::Ack {
            sensor,
            requires_confirmation,
        } => cookie_of(handle, *sensor)
            .await?
            .map(|cookie| SessionEvent::CookieReceived {
                cookie,
                requires_confirmation: *requires_confirmation,
            })
            .into_iter()
            .collect(),
        Step::AckAll => snapshot(handle)
            .await?
            .map(|s| s.sensors)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| s.cookie)
            .map(|cookie| SessionEvent::CookieReceived {
                cookie,
                requires_confirmation: false,
            })
            .collect(),
        Step::Error {
            sensor,
            error,
            vendor_code,
        } => {
            let modality = modality_of(scenario, *sensor)?;
            cookie_of(handle, *sensor)
                .await?
                .map(|cookie| SessionEvent::ErrorReceived {
                    cookie,
                    modality,
                    error: *error,
                    vendor_code: *vendor_code,
                })
                .into_iter()
                .collect()
        }
        Step::Acquired {
            acquired_info,
            message,
        } => vec![SessionEvent::Acquired {
            acquired_info: *acquired_info,
            message: message.clone(),
        }],
        Step::Succeed {
            sensor,
            requires_confirmation,
            token,
        } => {
            let is_strong = scenario
                .sensor(*sensor)
                .map(|s| s.strength.is_strong())
                .unwrap_or(false);
            vec![SessionEvent::AuthenticationSucceeded {
                sensor_id: *sensor,
                requires_confirmation: *requires_confirmation,
                is_strong,
                token: decode_blob(token.as_deref())?,
            }]
        }
        Step::Reject => vec![SessionEvent::AuthenticationRejected],
        Step::Timeout {
            sensor,
            vendor_code,
        } => vec![SessionEvent::AuthenticationTimedOut {
            modality: modality_of(scenario, *sensor)?,
            error: BiometricError::Timeout,
            vendor_code: *vendor_code,
        }],
        Step::CredentialPressed => vec![SessionEvent::DeviceCredentialPressed],
        Step::Dismiss {
            reason,
            attestation,
        } => vec![SessionEvent::DialogDismissed {
            reason: *reason,
            credential_attestation: decode_blob(attestation.as_deref())?,
        }],
        Step::Cancel { force } => vec![SessionEvent::CancelAuthSession { force: *force }],
        Step::TryAgain => vec![SessionEvent::TryAgainPressed],
    };
    Ok(events)
}

fn modality_of(scenario: &Scenario, sensor: SensorId) -> anyhow::Result<Modality> {
    scenario
        .sensor(sensor)
        .map(|s| s.modality)
        .ok_or_else(|| anyhow!("Unknown sensor {}", sensor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use biometric_auth_session::{AuthenticationType, ModalityMask};

    async fn run_bundled(json: &str) -> RunOutcome {
        let scenario = Scenario::parse(json).unwrap();
        run(&scenario, RuntimeConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_fingerprint_success_scenario() {
        let outcome = run_bundled(include_str!("../scenarios/fingerprint_success.json")).await;

        assert_eq!(
            outcome.terminal(),
            Some(&Delivery::Succeeded {
                kind: AuthenticationType::Biometric
            })
        );
        assert_eq!(outcome.tokens_stored, 1);
        assert!(outcome.report.finished);
        assert_eq!(
            outcome.steps.last().map(|s| s.phase),
            Some(SessionPhase::Finished)
        );
        assert!(outcome
            .sensor_calls
            .iter()
            .any(|r| matches!(r.call, SensorCall::Start { .. })));
    }

    #[tokio::test]
    async fn test_face_retry_scenario() {
        let outcome = run_bundled(include_str!("../scenarios/face_retry.json")).await;

        let phases: Vec<_> = outcome.steps.iter().map(|s| s.phase).collect();
        assert!(phases.contains(&SessionPhase::Paused));
        assert_eq!(outcome.report.continuations, 1);
        assert_eq!(outcome.deliveries.first(), Some(&Delivery::Failed));
        assert_eq!(
            outcome.terminal(),
            Some(&Delivery::Succeeded {
                kind: AuthenticationType::Biometric
            })
        );
        // Weak face sensor: the token never reaches the store.
        assert_eq!(outcome.tokens_stored, 0);
        let shows = outcome
            .surface_calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::ShowPrompt { .. }))
            .count();
        assert_eq!(shows, 1);
    }

    #[tokio::test]
    async fn test_unfinished_scenario_is_cancelled_on_exit() {
        let json = r#"{
            "name": "abandoned",
            "request": {
                "operation_id": 0,
                "user_id": 0,
                "caller": { "uid": 1, "pid": 2, "user_id": 0, "package_name": "com.example" },
                "prompt": { "title": "Sign in", "authenticators_allowed": 255 }
            },
            "sensors": [{ "id": 1, "modality": "fingerprint", "strength": "strong" }],
            "steps": [{ "step": "ack", "sensor": 1 }]
        }"#;
        let outcome = run_bundled(json).await;

        assert_eq!(outcome.steps[0].phase, SessionPhase::Started);
        assert_eq!(
            outcome.terminal(),
            Some(&Delivery::Error {
                modalities: ModalityMask::from(Modality::Fingerprint),
                error: BiometricError::Canceled,
                vendor_code: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_steps_after_finish_are_noops() {
        let json = r#"{
            "name": "late",
            "request": {
                "operation_id": 0,
                "user_id": 0,
                "caller": { "uid": 1, "pid": 2, "user_id": 0, "package_name": "com.example" },
                "prompt": { "title": "Sign in", "authenticators_allowed": 255 }
            },
            "sensors": [{ "id": 1, "modality": "fingerprint", "strength": "strong" }],
            "steps": [
                { "step": "cancel", "force": true },
                { "step": "ack", "sensor": 1 }
            ]
        }"#;
        let outcome = run_bundled(json).await;

        assert_eq!(outcome.steps[1].phase, SessionPhase::Finished);
        assert_eq!(outcome.report.events_processed, 1);
    }
}
