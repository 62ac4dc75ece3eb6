//! Circuit breaker registry — per-subsystem failure isolation.
//!
//! CLOSED -> OPEN on `failure_threshold` consecutive failures. OPEN ->
//! HALF_OPEN once `recovery_timeout` has elapsed, allowing a bounded
//! number of probes. HALF_OPEN -> CLOSED once enough probes succeed,
//! or back to OPEN on the first probe failure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakerStatus {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Instant>,
    pub last_state_change: Instant,
    pub total_trips: u64,
}

impl BreakerStatus {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: BreakerState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            last_state_change: Instant::now(),
            total_trips: 0,
        }
    }
}

pub struct CircuitBreakerRegistry {
    failure_threshold: u32,
    recovery_timeout: Duration,
    half_open_max_probes: u32,
    breakers: HashMap<String, BreakerStatus>,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration, half_open_max_probes: u32) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            half_open_max_probes,
            breakers: HashMap::new(),
        }
    }

    pub fn register(&mut self, subsystem: &str) {
        if !self.breakers.contains_key(subsystem) {
            self.breakers.insert(subsystem.to_string(), BreakerStatus::new(subsystem));
            tracing::info!(target: "governance_core::breaker", subsystem, "registered circuit breaker");
        }
    }

    /// Whether a call to `subsystem` should proceed right now. Has the
    /// side effect of transitioning OPEN -> HALF_OPEN once the recovery
    /// timeout has elapsed, and of lazily registering unknown subsystems.
    pub fn allow_request(&mut self, subsystem: &str) -> bool {
        self.get_or_create(subsystem);
        let recovery_timeout = self.recovery_timeout;
        let breaker = self.breakers.get_mut(subsystem).expect("just created");

        match breaker.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                if breaker.last_state_change.elapsed() >= recovery_timeout {
                    transition(breaker, BreakerState::HalfOpen);
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => breaker.success_count < self.half_open_max_probes,
        }
    }

    pub fn record_success(&mut self, subsystem: &str) {
        self.get_or_create(subsystem);
        let half_open_max_probes = self.half_open_max_probes;
        let breaker = self.breakers.get_mut(subsystem).expect("just created");

        match breaker.state {
            BreakerState::HalfOpen => {
                breaker.success_count += 1;
                if breaker.success_count >= half_open_max_probes {
                    transition(breaker, BreakerState::Closed);
                    breaker.failure_count = 0;
                    tracing::info!(target: "governance_core::breaker", subsystem, "circuit closed, subsystem recovered");
                }
            }
            BreakerState::Closed => {
                breaker.failure_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&mut self, subsystem: &str) {
        self.get_or_create(subsystem);
        let failure_threshold = self.failure_threshold;
        let recovery_timeout = self.recovery_timeout;
        let breaker = self.breakers.get_mut(subsystem).expect("just created");
        breaker.failure_count += 1;
        breaker.last_failure_time = Some(Instant::now());

        match breaker.state {
            BreakerState::HalfOpen => {
                transition(breaker, BreakerState::Open);
                tracing::warn!(
                    target: "governance_core::breaker",
                    subsystem,
                    recovery_timeout_s = recovery_timeout.as_secs_f64(),
                    "circuit open: probe failed"
                );
            }
            BreakerState::Closed => {
                if breaker.failure_count >= failure_threshold {
                    transition(breaker, BreakerState::Open);
                    breaker.total_trips += 1;
                    tracing::warn!(
                        target: "governance_core::breaker",
                        subsystem,
                        failures = breaker.failure_count,
                        trip = breaker.total_trips,
                        "circuit open: consecutive failure threshold reached"
                    );
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn get_status(&self, subsystem: &str) -> Option<&BreakerStatus> {
        self.breakers.get(subsystem)
    }

    pub fn get_all_status(&self) -> HashMap<String, BreakerStatus> {
        self.breakers.clone()
    }

    pub fn is_healthy(&self, subsystem: &str) -> bool {
        self.breakers.get(subsystem).map(|b| b.state != BreakerState::Open).unwrap_or(true)
    }

    pub fn force_open(&mut self, subsystem: &str) {
        self.get_or_create(subsystem);
        let breaker = self.breakers.get_mut(subsystem).expect("just created");
        transition(breaker, BreakerState::Open);
        breaker.total_trips += 1;
        tracing::warn!(target: "governance_core::breaker", subsystem, "circuit force-opened");
    }

    pub fn force_close(&mut self, subsystem: &str) {
        self.get_or_create(subsystem);
        let breaker = self.breakers.get_mut(subsystem).expect("just created");
        transition(breaker, BreakerState::Closed);
        breaker.failure_count = 0;
        tracing::info!(target: "governance_core::breaker", subsystem, "circuit force-closed");
    }

    fn get_or_create(&mut self, subsystem: &str) {
        if !self.breakers.contains_key(subsystem) {
            self.register(subsystem);
        }
    }
}

fn transition(breaker: &mut BreakerStatus, new_state: BreakerState) {
    breaker.state = new_state;
    breaker.success_count = 0;
    breaker.last_state_change = Instant::now();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(3, Duration::from_millis(20), 1)
    }

    #[test]
    fn starts_closed_and_healthy() {
        let mut reg = registry();
        assert!(reg.allow_request("db"));
        assert!(reg.is_healthy("db"));
    }

    #[test]
    fn trips_open_after_consecutive_failures() {
        let mut reg = registry();
        for _ in 0..3 {
            reg.record_failure("db");
        }
        assert_eq!(reg.get_status("db").unwrap().state, BreakerState::Open);
        assert!(!reg.allow_request("db"));
        assert!(!reg.is_healthy("db"));
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let mut reg = registry();
        reg.record_failure("db");
        reg.record_failure("db");
        reg.record_success("db");
        assert_eq!(reg.get_status("db").unwrap().failure_count, 0);
        reg.record_failure("db");
        reg.record_failure("db");
        assert_eq!(reg.get_status("db").unwrap().state, BreakerState::Closed);
    }

    #[test]
    fn half_opens_after_recovery_timeout_and_recloses_on_success() {
        let mut reg = registry();
        for _ in 0..3 {
            reg.record_failure("db");
        }
        assert_eq!(reg.get_status("db").unwrap().state, BreakerState::Open);
        std::thread::sleep(Duration::from_millis(30));
        assert!(reg.allow_request("db"));
        assert_eq!(reg.get_status("db").unwrap().state, BreakerState::HalfOpen);
        reg.record_success("db");
        assert_eq!(reg.get_status("db").unwrap().state, BreakerState::Closed);
    }

    #[test]
    fn failed_probe_reopens_circuit() {
        let mut reg = registry();
        for _ in 0..3 {
            reg.record_failure("db");
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(reg.allow_request("db"));
        reg.record_failure("db");
        assert_eq!(reg.get_status("db").unwrap().state, BreakerState::Open);
    }

    #[test]
    fn force_open_and_force_close_override_state() {
        let mut reg = registry();
        reg.force_open("net");
        assert!(!reg.is_healthy("net"));
        reg.force_close("net");
        assert!(reg.is_healthy("net"));
    }

    #[test]
    fn unknown_subsystem_is_healthy_by_default() {
        let reg = registry();
        assert!(reg.is_healthy("never-registered"));
    }
}
