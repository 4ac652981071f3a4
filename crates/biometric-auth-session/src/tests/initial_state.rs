//! Initial transition tests.

use super::harness::{Harness, SensorSpec, FIRST_COOKIE};
use crate::recording::{SensorCall, SurfaceCall};
use crate::{Authenticators, ModalityMask, SessionError, SessionPhase};

#[test]
fn sensors_eligible_goes_to_called_and_arms_each_sensor() {
    let mut h = Harness::multi_sensor();
    h.session.go_to_initial_state().unwrap();

    assert_eq!(h.session.phase(), SessionPhase::Called);
    let fingerprint = h.cookie(1);
    let face = h.cookie(2);
    assert_ne!(fingerprint, face);
    assert_eq!(fingerprint.get(), FIRST_COOKIE);

    assert_eq!(
        h.driver(1).calls(),
        vec![SensorCall::Arm {
            cookie: fingerprint,
            requires_confirmation: false
        }]
    );
    assert_eq!(h.driver(2).last_armed_cookie(), Some(face));
    assert!(h.surface.calls().is_empty());
}

#[test]
fn credential_only_shows_prompt_without_cookies() {
    let mut h = Harness::builder().with_credential().build();
    h.session.go_to_initial_state().unwrap();

    assert_eq!(h.session.phase(), SessionPhase::ShowingCredential);
    assert_eq!(
        h.surface.calls(),
        vec![SurfaceCall::ShowPrompt {
            modalities: ModalityMask::NONE,
            requires_confirmation: false,
            authenticators: Authenticators::BIOMETRIC_WEAK.union(Authenticators::DEVICE_CREDENTIAL),
        }]
    );
    assert!(h.receiver.deliveries().is_empty());
}

#[test]
fn sensors_take_priority_over_available_credential() {
    let mut h = Harness::face_with_credential();
    h.session.go_to_initial_state().unwrap();

    assert_eq!(h.session.phase(), SessionPhase::Called);
    assert!(h.surface.calls().is_empty());
    assert!(h.driver(2).last_armed_cookie().is_some());
}

#[test]
fn nothing_eligible_is_a_contract_violation() {
    let mut h = Harness::builder().build();
    assert_eq!(
        h.session.go_to_initial_state(),
        Err(SessionError::NoAuthenticatorsRequested)
    );
    assert_eq!(h.session.phase(), SessionPhase::Idle);
    assert!(h.surface.calls().is_empty());
}

#[test]
fn starting_twice_is_rejected() {
    let mut h = Harness::fingerprint();
    h.session.go_to_initial_state().unwrap();

    let err = h.session.go_to_initial_state().unwrap_err();
    assert!(matches!(err, SessionError::InvalidStateTransition(_)));
    assert_eq!(h.driver(1).calls().len(), 1);
}

#[test]
fn confirmation_follows_sensor_support_and_policy() {
    let mut h = Harness::builder()
        .sensor(SensorSpec::fingerprint(1))
        .sensor(SensorSpec::face(2).confirmation_supported())
        .confirmation_requested()
        .build();
    h.session.go_to_initial_state().unwrap();

    assert!(matches!(
        h.driver(1).calls()[0],
        SensorCall::Arm {
            requires_confirmation: false,
            ..
        }
    ));
    assert!(matches!(
        h.driver(2).calls()[0],
        SensorCall::Arm {
            requires_confirmation: true,
            ..
        }
    ));
}

#[test]
fn user_setting_forces_confirmation() {
    let mut h = Harness::builder()
        .sensor(SensorSpec::face(2).confirmation_supported().always_confirm())
        .build();
    h.session.go_to_initial_state().unwrap();

    assert!(matches!(
        h.driver(2).calls()[0],
        SensorCall::Arm {
            requires_confirmation: true,
            ..
        }
    ));
}

#[test]
fn crypto_flag_follows_operation_id() {
    let plain = Harness::fingerprint();
    assert!(!plain.session.is_crypto());

    let crypto = Harness::builder()
        .sensor(SensorSpec::fingerprint(1))
        .operation_id(0x5eed)
        .build();
    assert!(crypto.session.is_crypto());
    assert!(crypto.session.snapshot().is_crypto);
}
