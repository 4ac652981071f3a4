//! Readiness barrier tests.

use super::harness::{Harness, SensorSpec};
use crate::recording::{SensorCall, SurfaceCall};
use crate::{Cookie, Modality, ModalityMask, SessionPhase};

#[test]
fn partial_acks_do_not_start() {
    let mut h = Harness::multi_sensor();
    h.session.go_to_initial_state().unwrap();

    h.ack(1);
    assert_eq!(h.session.phase(), SessionPhase::Called);
    assert!(h.surface.calls().is_empty());
    assert_eq!(h.driver(1).calls().len(), 1);
    assert!(h.session.start_time().is_none());
}

#[test]
fn last_ack_starts_every_sensor_and_shows_prompt() {
    let mut h = Harness::multi_sensor();
    h.session.go_to_initial_state().unwrap();
    h.ack(2);
    h.ack(1);

    assert_eq!(h.session.phase(), SessionPhase::Started);
    assert!(h.session.start_time().is_some());

    let fingerprint = h.cookie(1);
    assert_eq!(
        h.driver(1).calls().last(),
        Some(&SensorCall::Start {
            cookie: fingerprint
        })
    );
    assert!(matches!(
        h.driver(2).calls().last(),
        Some(SensorCall::Start { .. })
    ));

    let expected_mask: ModalityMask = [Modality::Fingerprint, Modality::Face].into_iter().collect();
    assert!(matches!(
        h.surface.calls().as_slice(),
        [SurfaceCall::ShowPrompt { modalities, requires_confirmation: false, .. }]
            if *modalities == expected_mask
    ));
}

#[test]
fn unknown_cookie_does_not_count() {
    let mut h = Harness::fingerprint();
    h.session.go_to_initial_state().unwrap();

    let stranger = Cookie::new(h.cookie(1).get() + 1_000).unwrap();
    h.session.on_cookie_received(stranger, false);

    assert_eq!(h.session.phase(), SessionPhase::Called);
    assert!(h.surface.calls().is_empty());
}

#[test]
fn duplicate_ack_does_not_complete_the_barrier() {
    let mut h = Harness::multi_sensor();
    h.session.go_to_initial_state().unwrap();

    h.ack(1);
    h.ack(1);
    assert_eq!(h.session.phase(), SessionPhase::Called);
}

#[test]
fn any_ack_requiring_confirmation_is_forwarded() {
    let mut h = Harness::multi_sensor();
    h.session.go_to_initial_state().unwrap();

    let fingerprint = h.cookie(1);
    let face = h.cookie(2);
    h.session.on_cookie_received(face, true);
    h.session.on_cookie_received(fingerprint, false);

    assert!(matches!(
        h.surface.calls().as_slice(),
        [SurfaceCall::ShowPrompt {
            requires_confirmation: true,
            ..
        }]
    ));
}

#[test]
fn continuing_session_does_not_reopen_prompt() {
    let mut h = Harness::builder()
        .sensor(SensorSpec::face(2))
        .continuing()
        .build();
    h.start();

    assert_eq!(h.session.phase(), SessionPhase::Started);
    assert_eq!(h.surface.show_count(), 0);
    assert!(matches!(
        h.driver(2).calls().last(),
        Some(SensorCall::Start { .. })
    ));
}

#[test]
fn ack_after_start_is_ignored() {
    let mut h = Harness::fingerprint();
    h.start();
    h.ack(1);

    assert_eq!(h.session.phase(), SessionPhase::Started);
    assert_eq!(h.surface.show_count(), 1);
    assert_eq!(h.driver(1).calls().len(), 2);
}
