//! The session task and its handle.

use crate::{RuntimeError, RuntimeResult, SessionEvent};
use auth_config_and_utils::{Config, DEFAULT_CANCEL_ON_HANDLE_DROP, DEFAULT_EVENT_QUEUE_CAPACITY};
use biometric_auth_session::{AuthSession, SessionPhase, SessionSnapshot};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Runtime knobs for one session task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Bound of the event queue. Zero is treated as one.
    pub event_queue_capacity: usize,
    /// Force-cancel a live session once every handle is dropped.
    pub cancel_on_handle_drop: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            cancel_on_handle_drop: DEFAULT_CANCEL_ON_HANDLE_DROP,
        }
    }
}

impl From<&Config> for RuntimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            event_queue_capacity: config.event_queue_capacity,
            cancel_on_handle_drop: config.cancel_on_handle_drop,
        }
    }
}

/// Summary returned when the session task ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub id: Uuid,
    pub operation_id: i64,
    pub final_phase: SessionPhase,
    pub events_processed: u64,
    /// Successful "try again" rounds.
    pub continuations: u32,
    /// Whether the caller received its terminal result.
    pub finished: bool,
}

enum Command {
    Event(SessionEvent),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cloneable sender side of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    sender: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the session task has ended.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queue an event, waiting for room if the queue is full.
    pub async fn post(&self, event: SessionEvent) -> RuntimeResult<()> {
        self.sender
            .send(Command::Event(event))
            .await
            .map_err(|_| RuntimeError::SessionClosed)
    }

    /// Queue an event without waiting. For driver callbacks that cannot block.
    pub fn try_post(&self, event: SessionEvent) -> RuntimeResult<()> {
        match self.sender.try_send(Command::Event(event)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(Command::Event(event))) => {
                warn!(session_id = %self.id, event = event.name(), "Session queue full, event rejected");
                Err(RuntimeError::QueueFull)
            }
            Err(TrySendError::Full(_)) => Err(RuntimeError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(RuntimeError::SessionClosed),
        }
    }

    /// Point-in-time view of the session, taken between events.
    pub async fn snapshot(&self) -> RuntimeResult<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Command::Snapshot(reply))
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        response.await.map_err(|_| RuntimeError::SessionClosed)
    }
}

/// Run the initial transition and move the session into its own task.
///
/// Must be called from within a tokio runtime. Fails without spawning if the
/// session cannot start.
pub fn start_session(
    mut session: AuthSession,
    config: RuntimeConfig,
) -> RuntimeResult<(SessionHandle, JoinHandle<SessionReport>)> {
    let id = Uuid::new_v4();
    let operation_id = session.operation_id();
    let span = info_span!("session", session_id = %id, operation_id);

    span.in_scope(|| session.go_to_initial_state())?;

    let (sender, receiver) = mpsc::channel(config.event_queue_capacity.max(1));
    let worker = SessionWorker {
        id,
        session,
        receiver,
        cancel_on_handle_drop: config.cancel_on_handle_drop,
        events_processed: 0,
        continuations: 0,
    };
    let join = tokio::spawn(worker.run().instrument(span));

    Ok((SessionHandle { id, sender }, join))
}

struct SessionWorker {
    id: Uuid,
    session: AuthSession,
    receiver: mpsc::Receiver<Command>,
    cancel_on_handle_drop: bool,
    events_processed: u64,
    continuations: u32,
}

impl SessionWorker {
    async fn run(mut self) -> SessionReport {
        info!(phase = %self.session.phase(), "Session task started");

        while !self.session.is_finished() {
            match self.receiver.recv().await {
                Some(Command::Event(event)) => self.apply(event),
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(self.session.snapshot());
                }
                None => {
                    self.on_handles_dropped();
                    break;
                }
            }
        }

        let report = SessionReport {
            id: self.id,
            operation_id: self.session.operation_id(),
            final_phase: self.session.phase(),
            events_processed: self.events_processed,
            continuations: self.continuations,
            finished: self.session.is_finished(),
        };
        info!(
            final_phase = %report.final_phase,
            events_processed = report.events_processed,
            continuations = report.continuations,
            "Session task ended"
        );
        report
    }

    fn apply(&mut self, event: SessionEvent) {
        self.events_processed += 1;
        debug!(event = event.name(), "Applying session event");

        let session = &mut self.session;
        match event {
            SessionEvent::CookieReceived {
                cookie,
                requires_confirmation,
            } => session.on_cookie_received(cookie, requires_confirmation),
            SessionEvent::ErrorReceived {
                cookie,
                modality,
                error,
                vendor_code,
            } => {
                let _ = session.on_error_received(cookie, modality, error, vendor_code);
            }
            SessionEvent::Acquired {
                acquired_info,
                message,
            } => session.on_acquired(acquired_info, message.as_deref()),
            SessionEvent::AuthenticationSucceeded {
                sensor_id,
                requires_confirmation,
                is_strong,
                token,
            } => session.on_authentication_succeeded(
                sensor_id,
                requires_confirmation,
                is_strong,
                token,
            ),
            SessionEvent::AuthenticationRejected => session.on_authentication_rejected(),
            SessionEvent::AuthenticationTimedOut {
                modality,
                error,
                vendor_code,
            } => session.on_authentication_timed_out(modality, error, vendor_code),
            SessionEvent::DeviceCredentialPressed => session.on_device_credential_pressed(),
            SessionEvent::DialogDismissed {
                reason,
                credential_attestation,
            } => {
                let _ = session.on_dialog_dismissed(reason, credential_attestation.as_deref());
            }
            SessionEvent::CancelAuthSession { force } => {
                let _ = session.on_cancel_auth_session(force);
            }
            SessionEvent::TryAgainPressed => match session.resume_after_pause() {
                Ok(()) => self.continuations += 1,
                Err(e) => warn!(error = %e, "Ignoring try again"),
            },
        }
    }

    fn on_handles_dropped(&mut self) {
        if !self.cancel_on_handle_drop {
            warn!(phase = %self.session.phase(), "All handles dropped, abandoning live session");
            return;
        }
        info!(phase = %self.session.phase(), "All handles dropped, cancelling session");
        let _ = self.session.on_cancel_auth_session(true);
    }
}
