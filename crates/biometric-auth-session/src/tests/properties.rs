//! Property-based tests for cookies, the readiness barrier and delivery.

use super::harness::{Harness, SensorSpec};
use crate::recording::SensorCall;
use crate::{
    BiometricError, Cookie, CookieGenerator, DismissedReason, Modality, RandomCookies,
    SensorStrength, SessionPhase, MAX_COOKIE,
};
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Strategies
// ============================================================================

fn arb_modality() -> impl Strategy<Value = Modality> {
    prop_oneof![
        Just(Modality::Fingerprint),
        Just(Modality::Iris),
        Just(Modality::Face),
    ]
}

fn arb_strength() -> impl Strategy<Value = SensorStrength> {
    prop_oneof![
        Just(SensorStrength::Strong),
        Just(SensorStrength::Weak),
        Just(SensorStrength::Convenience),
    ]
}

fn arb_sensors() -> impl Strategy<Value = Vec<SensorSpec>> {
    prop::collection::vec((arb_modality(), arb_strength()), 1..6).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (modality, strength))| SensorSpec::new(i as i32 + 1, modality, strength))
            .collect()
    })
}

fn build(sensors: Vec<SensorSpec>, credential: bool, seed: u64) -> Harness {
    let mut builder = Harness::builder().cookies(RandomCookies::seeded(seed));
    for spec in sensors {
        builder = builder.sensor(spec);
    }
    if credential {
        builder = builder.with_credential();
    }
    builder.build()
}

#[derive(Debug, Clone)]
enum Op {
    Ack(usize),
    StrangerAck(u32),
    Error(usize, i32),
    Success(usize, bool, bool),
    Reject,
    Timeout,
    Acquired,
    CredentialPressed,
    Dismiss(i32),
    Cancel(bool),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..6).prop_map(Op::Ack),
        1 => (1u32..=MAX_COOKIE).prop_map(Op::StrangerAck),
        2 => ((0usize..6), prop_oneof![Just(5), Just(7), Just(1), Just(3)])
            .prop_map(|(i, code)| Op::Error(i, code)),
        1 => ((0usize..6), any::<bool>(), any::<bool>())
            .prop_map(|(i, c, s)| Op::Success(i, c, s)),
        1 => Just(Op::Reject),
        1 => Just(Op::Timeout),
        1 => Just(Op::Acquired),
        1 => Just(Op::CredentialPressed),
        1 => (1i32..9).prop_map(Op::Dismiss),
        1 => any::<bool>().prop_map(Op::Cancel),
    ]
}

fn apply(h: &mut Harness, op: &Op) {
    let ids = h.sensor_ids();
    let pick = |i: usize| ids[i % ids.len()];
    match *op {
        Op::Ack(i) => {
            let id = pick(i);
            if h.session.eligibility().sensor(id).and_then(|s| s.cookie()).is_some() {
                h.ack(id);
            }
        }
        Op::StrangerAck(raw) => {
            if let Some(cookie) = Cookie::new(raw) {
                if !h.session.eligibility().contains_cookie(cookie) {
                    h.session.on_cookie_received(cookie, false);
                }
            }
        }
        Op::Error(i, code) => {
            let id = pick(i);
            if h.session.eligibility().sensor(id).and_then(|s| s.cookie()).is_some() {
                let _ = h.error(id, BiometricError::from(code));
            }
        }
        Op::Success(i, confirm, strong) => {
            h.session
                .on_authentication_succeeded(pick(i), confirm, strong, Some(vec![1]));
        }
        Op::Reject => h.session.on_authentication_rejected(),
        Op::Timeout => {
            h.session
                .on_authentication_timed_out(Modality::Face, BiometricError::Timeout, 0)
        }
        Op::Acquired => h.session.on_acquired(0, Some("hold still")),
        Op::CredentialPressed => h.session.on_device_credential_pressed(),
        Op::Dismiss(code) => {
            let _ = h.session.on_dialog_dismissed(DismissedReason::from(code), None);
        }
        Op::Cancel(force) => {
            let _ = h.session.on_cancel_auth_session(force);
        }
    }
}

proptest! {
    #[test]
    fn initial_round_issues_one_distinct_cookie_per_sensor(
        sensors in arb_sensors(),
        credential in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let count = sensors.len();
        let mut h = build(sensors, credential, seed);
        h.session.go_to_initial_state().unwrap();

        prop_assert_eq!(h.session.phase(), SessionPhase::Called);
        let mut seen = HashSet::new();
        for id in h.sensor_ids() {
            let calls = h.driver(id).calls();
            prop_assert_eq!(calls.len(), 1);
            let cookie = h.driver(id).last_armed_cookie().unwrap();
            prop_assert!(cookie.get() >= 1 && cookie.get() <= MAX_COOKIE);
            prop_assert!(
                matches!(calls[0], SensorCall::Arm { .. }),
                "first driver call must arm, got {:?}",
                calls[0]
            );
            prop_assert!(seen.insert(cookie));
        }
        prop_assert_eq!(seen.len(), count);
    }

    #[test]
    fn barrier_fires_only_after_every_cookie(
        sensors in arb_sensors(),
        seed in any::<u64>(),
        order_seed in any::<u64>(),
    ) {
        let mut h = build(sensors, false, seed);
        h.session.go_to_initial_state().unwrap();

        let mut ids = h.sensor_ids();
        let rotation = (order_seed as usize) % ids.len();
        ids.rotate_left(rotation);
        let (last, rest) = ids.split_last().unwrap();

        for id in rest {
            h.ack(*id);
            prop_assert_eq!(h.session.phase(), SessionPhase::Called);
            prop_assert_eq!(h.surface.show_count(), 0);
        }
        h.ack(*last);
        prop_assert_eq!(h.session.phase(), SessionPhase::Started);
        prop_assert_eq!(h.surface.show_count(), 1);
    }

    #[test]
    fn stranger_cookies_never_count(
        sensors in arb_sensors(),
        seed in any::<u64>(),
        strangers in prop::collection::vec(1u32..=MAX_COOKIE, 1..20),
    ) {
        let mut h = build(sensors, false, seed);
        h.session.go_to_initial_state().unwrap();

        for raw in strangers {
            let cookie = Cookie::new(raw).unwrap();
            if !h.session.eligibility().contains_cookie(cookie) {
                h.session.on_cookie_received(cookie, false);
            }
        }
        prop_assert_eq!(h.session.phase(), SessionPhase::Called);
    }

    #[test]
    fn at_most_one_terminal_delivery(
        sensors in arb_sensors(),
        credential in any::<bool>(),
        seed in any::<u64>(),
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let mut h = build(sensors, credential, seed);
        h.session.go_to_initial_state().unwrap();

        let mut delivered_at = None;
        for op in &ops {
            apply(&mut h, op);
            let terminal = h.receiver.terminal_count();
            prop_assert!(terminal <= 1);
            if terminal == 1 && delivered_at.is_none() {
                delivered_at = Some(h.receiver.deliveries().len());
                prop_assert!(h.session.is_finished());
            }
            if let Some(len) = delivered_at {
                prop_assert_eq!(h.receiver.deliveries().len(), len);
            }
        }
        prop_assert_eq!(h.session.is_finished(), h.receiver.terminal_count() == 1);
    }

    #[test]
    fn weak_success_never_reaches_token_store(
        seed in any::<u64>(),
        token in prop::collection::vec(any::<u8>(), 1..64),
        reason in prop_oneof![Just(1), Just(4), Just(7)],
    ) {
        let mut h = build(vec![SensorSpec::face(2)], true, seed);
        h.start();
        h.session.on_authentication_succeeded(2, false, false, Some(token));
        let _ = h.session.on_dialog_dismissed(DismissedReason::from(reason), None);

        prop_assert!(h.token_store.tokens().is_empty());
    }
}

/// Generator stuck on one value until it has been drawn a few times.
struct Repeating {
    values: Vec<u32>,
    next: usize,
}

impl CookieGenerator for Repeating {
    fn next_cookie(&mut self) -> Cookie {
        let raw = self.values[self.next.min(self.values.len() - 1)];
        self.next += 1;
        Cookie::new(raw).unwrap()
    }
}

#[test]
fn colliding_draws_are_redrawn() {
    let mut h = Harness::builder()
        .sensor(SensorSpec::fingerprint(1))
        .sensor(SensorSpec::face(2))
        .cookies(Repeating {
            values: vec![5, 5, 5, 6],
            next: 0,
        })
        .build();
    h.session.go_to_initial_state().unwrap();

    assert_eq!(h.cookie(1).get(), 5);
    assert_eq!(h.cookie(2).get(), 6);
}
