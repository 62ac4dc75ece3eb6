//! Property-based and scenario tests over `CircuitBreakerRegistry`.

use std::time::Duration;

use governance_core::breaker::{BreakerState, CircuitBreakerRegistry};
use proptest::prelude::*;

fn registry(threshold: u32) -> CircuitBreakerRegistry {
    CircuitBreakerRegistry::new(threshold, Duration::from_millis(20), 1)
}

proptest! {
    /// A breaker opens if and only if it has accumulated at least
    /// `failure_threshold` consecutive failures since its last success.
    #[test]
    fn opens_exactly_at_consecutive_failure_threshold(threshold in 1u32..10, failures in 0u32..20) {
        let mut reg = registry(threshold);
        for _ in 0..failures {
            reg.record_failure("svc");
        }
        let state = reg.get_status("svc").unwrap().state;
        if failures >= threshold {
            prop_assert_eq!(state, BreakerState::Open);
        } else {
            prop_assert_eq!(state, BreakerState::Closed);
        }
    }

    /// A success while closed always resets the failure counter, so no
    /// number of failures below the threshold followed by a success can
    /// ever trip the breaker.
    #[test]
    fn success_resets_failure_count_below_threshold(threshold in 2u32..10, failures in 0u32..9) {
        let actual_failures = failures.min(threshold - 1);
        let mut reg = registry(threshold);
        for _ in 0..actual_failures {
            reg.record_failure("svc");
        }
        reg.record_success("svc");
        prop_assert_eq!(reg.get_status("svc").unwrap().failure_count, 0);
        prop_assert_eq!(reg.get_status("svc").unwrap().state, BreakerState::Closed);
    }
}

#[test]
fn unregistered_subsystem_allows_requests_and_is_healthy() {
    let reg = registry(3);
    assert!(reg.is_healthy("never-seen"));
}

#[test]
fn half_open_probe_failure_reopens_immediately() {
    let mut reg = registry(2);
    reg.record_failure("svc");
    reg.record_failure("svc");
    assert_eq!(reg.get_status("svc").unwrap().state, BreakerState::Open);

    std::thread::sleep(Duration::from_millis(30));
    assert!(reg.allow_request("svc"));
    assert_eq!(reg.get_status("svc").unwrap().state, BreakerState::HalfOpen);

    reg.record_failure("svc");
    assert_eq!(reg.get_status("svc").unwrap().state, BreakerState::Open);
}

#[test]
fn force_open_and_close_are_independent_of_failure_counters() {
    let mut reg = registry(100);
    reg.force_open("net");
    assert_eq!(reg.get_status("net").unwrap().state, BreakerState::Open);
    assert!(!reg.is_healthy("net"));

    reg.force_close("net");
    assert_eq!(reg.get_status("net").unwrap().state, BreakerState::Closed);
    assert_eq!(reg.get_status("net").unwrap().failure_count, 0);
    assert!(reg.is_healthy("net"));
}
