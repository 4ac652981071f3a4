//! Scenario tests for the authentication session.
//!
//! - `initial_state.rs`   - credential-only vs. cookie round, construction errors
//! - `cookie_barrier.rs`  - readiness barrier, stale and duplicate cookies
//! - `errors.rs`          - sensor errors per phase, lockout fallback, escrow
//! - `success.rs`         - matches, token escrow, confirmation
//! - `rejection.rs`       - rejection, timeout, pause and "try again"
//! - `dismissal.rs`       - every dismissal reason
//! - `cancellation.rs`    - cooperative and forced cancel, at-most-once delivery
//! - `remote_failures.rs` - collaborator failures never change the outcome
//! - `properties.rs`      - cookie and barrier laws over arbitrary sensor sets

mod cookie_barrier;
mod initial_state;
mod properties;

use crate::recording::{Delivery, SurfaceCall};
use crate::{AuthenticationType, DismissedReason, Modality, SensorStrength, SessionPhase};
use harness::{Harness, SensorSpec};

/// Fingerprint match from start to finish.
#[test]
fn basic_workflow() {
    let mut h = Harness::builder()
        .sensor(SensorSpec::new(1, Modality::Fingerprint, SensorStrength::Strong))
        .build();

    h.session.go_to_initial_state().unwrap();
    assert_eq!(h.session.phase(), SessionPhase::Called);

    h.ack_all();
    assert_eq!(h.session.phase(), SessionPhase::Started);

    h.session
        .on_authentication_succeeded(1, false, true, Some(vec![1, 2, 3]));
    assert_eq!(h.session.phase(), SessionPhase::AuthenticatedPendingUi);

    let progress = h
        .session
        .on_dialog_dismissed(DismissedReason::BiometricConfirmNotRequired, None);
    assert!(progress.is_finished());
    assert_eq!(h.session.phase(), SessionPhase::Finished);

    assert_eq!(h.token_store.tokens(), vec![vec![1, 2, 3]]);
    assert_eq!(
        h.receiver.deliveries(),
        vec![Delivery::Succeeded {
            kind: AuthenticationType::Biometric
        }]
    );
    assert_eq!(
        h.surface.calls().first(),
        Some(&SurfaceCall::ShowPrompt {
            modalities: Modality::Fingerprint.into(),
            requires_confirmation: false,
            authenticators: h.session.request().prompt.authenticators_allowed,
        })
    );
}
