//! Telemetry feedback loop — the autonomy layer.
//!
//! Observes per-intent telemetry and, once there's enough signal,
//! proposes a performance or security re-tuning. Never mutates the
//! engine directly (no back-reference) — it returns a [`FeedbackAction`]
//! the caller applies, which keeps the Engine/Feedback coupling acyclic.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::metrics::MetricsCollector;
use crate::modes::{PerformanceProfile, SecurityPosture};

const BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct FeedbackConfig {
    pub cpu_overload_threshold: f64,
    pub cpu_idle_threshold: f64,
    pub latency_overload_ms: f64,
    pub latency_healthy_ms: f64,

    pub rejection_rate_lockdown: f64,
    pub rejection_rate_recovery: f64,

    pub cooldown: Duration,
    pub min_observations: usize,
    pub observation_window: Duration,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            cpu_overload_threshold: 0.85,
            cpu_idle_threshold: 0.20,
            latency_overload_ms: 2000.0,
            latency_healthy_ms: 500.0,
            rejection_rate_lockdown: 0.40,
            rejection_rate_recovery: 0.05,
            cooldown: Duration::from_secs(60),
            min_observations: 20,
            observation_window: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackState {
    pub last_adaptation_time: Option<Instant>,
    pub total_adaptations: u64,
    pub last_action: String,
    pub current_avg_latency_ms: Option<f64>,
    pub current_rejection_rate: Option<f64>,
    pub current_cpu_usage: Option<f64>,
    pub in_cooldown: bool,
}

#[derive(Debug, Clone)]
pub struct FeedbackAction {
    pub name: &'static str,
    pub performance: Option<PerformanceProfile>,
    pub security: Option<SecurityPosture>,
    pub reason: String,
}

pub struct FeedbackLoop {
    config: FeedbackConfig,
    state: FeedbackState,
    latency_buffer: VecDeque<(Instant, f64)>,
    rejection_buffer: VecDeque<(Instant, f64)>,
}

impl FeedbackLoop {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            state: FeedbackState::default(),
            latency_buffer: VecDeque::with_capacity(BUFFER_CAPACITY),
            rejection_buffer: VecDeque::with_capacity(BUFFER_CAPACITY),
        }
    }

    /// Feed a single observation. Call after every intent. Also forwards
    /// into the shared `MetricsCollector` for dashboard visibility.
    pub fn observe(&mut self, metrics: &mut MetricsCollector, latency_ms: f64, rejected: bool) {
        let now = Instant::now();
        if self.latency_buffer.len() >= BUFFER_CAPACITY {
            self.latency_buffer.pop_front();
        }
        self.latency_buffer.push_back((now, latency_ms));
        if self.rejection_buffer.len() >= BUFFER_CAPACITY {
            self.rejection_buffer.pop_front();
        }
        self.rejection_buffer.push_back((now, if rejected { 1.0 } else { 0.0 }));

        metrics.observe("intent_latency_ms", latency_ms);
        metrics.inc_counter("intents_total", 1.0);
        if rejected {
            metrics.inc_counter("intents_rejected", 1.0);
        } else {
            metrics.inc_counter("intents_approved", 1.0);
        }
    }

    /// Evaluate telemetry and return an action if adaptation is needed,
    /// or `None` if there's nothing to do or a cooldown is active.
    pub fn evaluate(&mut self, current_performance: PerformanceProfile, current_security: SecurityPosture, cpu_usage: f64) -> Option<FeedbackAction> {
        let now = Instant::now();

        if let Some(last) = self.state.last_adaptation_time {
            if now.duration_since(last) < self.config.cooldown {
                self.state.in_cooldown = true;
                return None;
            }
        }
        self.state.in_cooldown = false;

        let cutoff = now.checked_sub(self.config.observation_window).unwrap_or(now);
        let recent_latencies: Vec<f64> = self.latency_buffer.iter().filter(|(ts, _)| *ts >= cutoff).map(|(_, v)| *v).collect();
        let recent_rejections: Vec<f64> = self.rejection_buffer.iter().filter(|(ts, _)| *ts >= cutoff).map(|(_, v)| *v).collect();

        if recent_latencies.len() < self.config.min_observations {
            return None;
        }

        let avg_latency = recent_latencies.iter().sum::<f64>() / recent_latencies.len() as f64;
        let rejection_rate = recent_rejections.iter().sum::<f64>() / recent_rejections.len() as f64;

        self.state.current_avg_latency_ms = Some(avg_latency);
        self.state.current_rejection_rate = Some(rejection_rate);
        self.state.current_cpu_usage = Some(cpu_usage);

        if let Some(action) = self.evaluate_performance(current_performance, cpu_usage, avg_latency) {
            return Some(action);
        }
        self.evaluate_security(current_security, rejection_rate)
    }

    fn evaluate_performance(&mut self, current: PerformanceProfile, cpu_usage: f64, avg_latency: f64) -> Option<FeedbackAction> {
        if (cpu_usage > self.config.cpu_overload_threshold || avg_latency > self.config.latency_overload_ms) && current != PerformanceProfile::Eco {
            let reason = format!(
                "System overload detected (CPU={:.0}%, latency={:.0}ms) — downshifting to ECO",
                cpu_usage * 100.0,
                avg_latency
            );
            tracing::warn!(target: "governance_core::feedback", %reason);
            return Some(self.make_action("performance_downshift", Some(PerformanceProfile::Eco), None, reason));
        }

        if cpu_usage < self.config.cpu_idle_threshold && avg_latency < self.config.latency_healthy_ms && current == PerformanceProfile::Eco {
            let reason = format!("System idle (CPU={:.0}%, latency={:.0}ms) — upshifting to BALANCED", cpu_usage * 100.0, avg_latency);
            tracing::info!(target: "governance_core::feedback", %reason);
            return Some(self.make_action("performance_upshift", Some(PerformanceProfile::Balanced), None, reason));
        }

        None
    }

    fn evaluate_security(&mut self, current: SecurityPosture, rejection_rate: f64) -> Option<FeedbackAction> {
        if rejection_rate > self.config.rejection_rate_lockdown && current != SecurityPosture::Lockdown {
            let reason = format!("High rejection rate ({:.0}%) — initiating LOCKDOWN", rejection_rate * 100.0);
            tracing::error!(target: "governance_core::feedback", %reason);
            return Some(self.make_action("security_lockdown", None, Some(SecurityPosture::Lockdown), reason));
        }

        if rejection_rate < self.config.rejection_rate_recovery && current == SecurityPosture::Lockdown {
            let reason = format!("Rejection rate normalized ({:.0}%) — reverting to GUARDED", rejection_rate * 100.0);
            tracing::info!(target: "governance_core::feedback", %reason);
            return Some(self.make_action("security_recovery", None, Some(SecurityPosture::Guarded), reason));
        }

        None
    }

    fn make_action(&mut self, name: &'static str, performance: Option<PerformanceProfile>, security: Option<SecurityPosture>, reason: String) -> FeedbackAction {
        self.state.last_adaptation_time = Some(Instant::now());
        self.state.total_adaptations += 1;
        self.state.last_action = name.to_string();
        FeedbackAction {
            name,
            performance,
            security,
            reason,
        }
    }

    pub fn state(&self) -> &FeedbackState {
        &self.state
    }

    pub fn observation_count(&self) -> usize {
        self.latency_buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> FeedbackConfig {
        FeedbackConfig {
            cooldown: Duration::from_millis(30),
            observation_window: Duration::from_secs(300),
            min_observations: 5,
            ..Default::default()
        }
    }

    fn feed(loop_: &mut FeedbackLoop, metrics: &mut MetricsCollector, n: usize, latency_ms: f64, rejected: bool) {
        for _ in 0..n {
            loop_.observe(metrics, latency_ms, rejected);
        }
    }

    #[test]
    fn no_action_before_minimum_observations() {
        let mut loop_ = FeedbackLoop::new(fast_config());
        let mut metrics = MetricsCollector::new(300);
        feed(&mut loop_, &mut metrics, 2, 2500.0, false);
        assert!(loop_.evaluate(PerformanceProfile::Balanced, SecurityPosture::Guarded, 0.9).is_none());
    }

    #[test]
    fn overload_downshifts_then_cooldown_blocks_repeat() {
        let mut loop_ = FeedbackLoop::new(fast_config());
        let mut metrics = MetricsCollector::new(300);
        feed(&mut loop_, &mut metrics, 30, 2500.0, false);

        let action = loop_.evaluate(PerformanceProfile::Balanced, SecurityPosture::Guarded, 0.9).unwrap();
        assert_eq!(action.name, "performance_downshift");
        assert_eq!(action.performance, Some(PerformanceProfile::Eco));

        assert!(loop_.evaluate(PerformanceProfile::Eco, SecurityPosture::Guarded, 0.9).is_none());
    }

    #[test]
    fn idle_after_cooldown_upshifts_to_balanced() {
        let mut loop_ = FeedbackLoop::new(fast_config());
        let mut metrics = MetricsCollector::new(300);
        feed(&mut loop_, &mut metrics, 30, 2500.0, false);
        loop_.evaluate(PerformanceProfile::Balanced, SecurityPosture::Guarded, 0.9);

        std::thread::sleep(Duration::from_millis(40));
        feed(&mut loop_, &mut metrics, 30, 100.0, false);
        let action = loop_.evaluate(PerformanceProfile::Eco, SecurityPosture::Guarded, 0.1).unwrap();
        assert_eq!(action.name, "performance_upshift");
        assert_eq!(action.performance, Some(PerformanceProfile::Balanced));
    }

    #[test]
    fn high_rejection_rate_triggers_lockdown() {
        let mut loop_ = FeedbackLoop::new(fast_config());
        let mut metrics = MetricsCollector::new(300);
        feed(&mut loop_, &mut metrics, 30, 50.0, true);
        let action = loop_.evaluate(PerformanceProfile::Balanced, SecurityPosture::Guarded, 0.1).unwrap();
        assert_eq!(action.name, "security_lockdown");
        assert_eq!(action.security, Some(SecurityPosture::Lockdown));
    }

    #[test]
    fn hysteresis_band_proposes_no_security_transition() {
        let mut loop_ = FeedbackLoop::new(fast_config());
        let mut metrics = MetricsCollector::new(300);
        // 20% rejection rate sits inside [0.05, 0.40] — neither enter nor exit threshold fires.
        for i in 0..30 {
            loop_.observe(&mut metrics, 50.0, i % 5 == 0);
        }
        let action = loop_.evaluate(PerformanceProfile::Balanced, SecurityPosture::Lockdown, 0.1);
        assert!(action.is_none());
    }
}
