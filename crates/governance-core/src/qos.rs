//! Adaptive QoS controller — load classification and graceful degradation.
//!
//! Monitors system load and recommends throttling adjustments. Never
//! mutates policy directly: [`AdaptiveQosController::evaluate`] returns a
//! [`QoSAdjustment`] that the engine applies to its effective parameters
//! for a single decision.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLevel {
    Idle,
    Normal,
    Elevated,
    Critical,
    Overload,
}

impl LoadLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
            Self::Overload => "overload",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemMetrics {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub queue_depth: u64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
    pub p2p_packet_loss: f64,
    pub timestamp: f64,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            cpu_usage: 0.0,
            memory_usage: 0.0,
            queue_depth: 0,
            avg_latency_ms: 0.0,
            error_rate: 0.0,
            p2p_packet_loss: 0.0,
            timestamp: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QoSAdjustment {
    pub speed_multiplier: f64,
    pub fuel_multiplier: f64,
    pub rate_limit_multiplier: f64,
    pub shed_low_priority: bool,
    pub load_level: LoadLevel,
    pub reasons: Vec<String>,
}

impl Default for QoSAdjustment {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            fuel_multiplier: 1.0,
            rate_limit_multiplier: 1.0,
            shed_low_priority: false,
            load_level: LoadLevel::Normal,
            reasons: Vec::new(),
        }
    }
}

pub struct AdaptiveQosController {
    backpressure_threshold: u64,
    latency_threshold_ms: f64,
    cpu_threshold: f64,
    memory_threshold: f64,
    adaptive_throttling: bool,
    history: VecDeque<SystemMetrics>,
    max_history: usize,
}

impl AdaptiveQosController {
    pub fn new(
        backpressure_threshold: u64,
        latency_threshold_ms: f64,
        cpu_threshold: f64,
        memory_threshold: f64,
        adaptive_throttling: bool,
    ) -> Self {
        Self {
            backpressure_threshold,
            latency_threshold_ms,
            cpu_threshold,
            memory_threshold,
            adaptive_throttling,
            history: VecDeque::with_capacity(60),
            max_history: 60,
        }
    }

    /// Apply policy-reload propagated settings without discarding the
    /// load-history ring.
    pub fn update_thresholds(&mut self, backpressure_threshold: u64, adaptive_throttling: bool) {
        self.backpressure_threshold = backpressure_threshold;
        self.adaptive_throttling = adaptive_throttling;
    }

    pub fn evaluate(&mut self, metrics: SystemMetrics) -> QoSAdjustment {
        if self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(metrics);

        let mut adj = QoSAdjustment::default();

        if metrics.cpu_usage > self.cpu_threshold {
            adj.speed_multiplier = adj.speed_multiplier.min(0.6);
            adj.fuel_multiplier = adj.fuel_multiplier.min(0.5);
            adj.reasons.push(format!(
                "CPU {:.0}% > threshold {:.0}%",
                metrics.cpu_usage * 100.0,
                self.cpu_threshold * 100.0
            ));
        }

        if metrics.memory_usage > self.memory_threshold {
            adj.fuel_multiplier = adj.fuel_multiplier.min(0.3);
            adj.reasons.push(format!(
                "Memory {:.0}% > threshold {:.0}%",
                metrics.memory_usage * 100.0,
                self.memory_threshold * 100.0
            ));
        }

        if metrics.queue_depth > self.backpressure_threshold {
            let ratio = metrics.queue_depth as f64 / self.backpressure_threshold as f64;
            adj.rate_limit_multiplier = adj.rate_limit_multiplier.min(1.0 / ratio);
            adj.shed_low_priority = ratio > 2.0;
            adj.reasons.push(format!(
                "Queue depth {} > threshold {}",
                metrics.queue_depth, self.backpressure_threshold
            ));
        }

        if metrics.avg_latency_ms > self.latency_threshold_ms {
            let slowdown = self.latency_threshold_ms / metrics.avg_latency_ms;
            adj.speed_multiplier = adj.speed_multiplier.min(slowdown);
            adj.reasons.push(format!(
                "Latency {:.0}ms > threshold {:.0}ms",
                metrics.avg_latency_ms, self.latency_threshold_ms
            ));
        }

        if metrics.p2p_packet_loss > 0.1 {
            adj.rate_limit_multiplier = adj.rate_limit_multiplier.min(0.5);
            adj.reasons.push(format!("Packet loss {:.0}% — reducing P2P rate", metrics.p2p_packet_loss * 100.0));
        }

        adj.load_level = self.classify_load(&metrics, &adj);

        if !adj.reasons.is_empty() && self.adaptive_throttling {
            tracing::warn!(
                target: "governance_core::qos",
                load = adj.load_level.as_str(),
                speed = adj.speed_multiplier,
                fuel = adj.fuel_multiplier,
                shedding = adj.shed_low_priority,
                reasons = %adj.reasons.join("; "),
                "QoS adjustment"
            );
        }

        adj
    }

    fn classify_load(&self, metrics: &SystemMetrics, adj: &QoSAdjustment) -> LoadLevel {
        if adj.shed_low_priority {
            return LoadLevel::Overload;
        }
        if metrics.cpu_usage > self.cpu_threshold || metrics.queue_depth > self.backpressure_threshold {
            return LoadLevel::Critical;
        }
        if metrics.cpu_usage > 0.70 || metrics.avg_latency_ms > self.latency_threshold_ms * 0.8 {
            return LoadLevel::Elevated;
        }
        if metrics.cpu_usage > 0.30 {
            return LoadLevel::Normal;
        }
        LoadLevel::Idle
    }

    /// Trend over the last `window` snapshots, comparing the mean CPU
    /// usage of each half. `None` until at least `window` samples exist.
    pub fn trend(&self, window: usize) -> Option<&'static str> {
        if self.history.len() < window {
            return None;
        }
        let recent: Vec<&SystemMetrics> = self.history.iter().rev().take(window).collect();
        let recent: Vec<&SystemMetrics> = recent.into_iter().rev().collect();
        let half = window / 2;
        let first_half = recent[..half].iter().map(|m| m.cpu_usage).sum::<f64>() / half as f64;
        let second_half = recent[half..].iter().map(|m| m.cpu_usage).sum::<f64>() / (window - half) as f64;
        let delta = second_half - first_half;
        if delta > 0.1 {
            Some("degrading")
        } else if delta < -0.1 {
            Some("improving")
        } else {
            Some("stable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AdaptiveQosController {
        AdaptiveQosController::new(100, 200.0, 0.85, 0.90, true)
    }

    fn metrics(cpu: f64) -> SystemMetrics {
        SystemMetrics {
            cpu_usage: cpu,
            ..Default::default()
        }
    }

    #[test]
    fn idle_load_classified_below_thirty_percent() {
        let mut c = controller();
        let adj = c.evaluate(metrics(0.1));
        assert_eq!(adj.load_level, LoadLevel::Idle);
        assert!((adj.speed_multiplier - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cpu_pressure_caps_speed_and_fuel() {
        let mut c = controller();
        let adj = c.evaluate(metrics(0.95));
        assert!(adj.speed_multiplier <= 0.6);
        assert!(adj.fuel_multiplier <= 0.5);
        assert_eq!(adj.load_level, LoadLevel::Critical);
    }

    #[test]
    fn queue_backlog_beyond_double_threshold_sheds_low_priority() {
        let mut c = controller();
        let adj = c.evaluate(SystemMetrics {
            queue_depth: 250,
            ..Default::default()
        });
        assert!(adj.shed_low_priority);
        assert_eq!(adj.load_level, LoadLevel::Overload);
    }

    #[test]
    fn trend_detects_degradation_across_window() {
        let mut c = controller();
        for _ in 0..5 {
            c.evaluate(metrics(0.1));
        }
        for _ in 0..5 {
            c.evaluate(metrics(0.9));
        }
        assert_eq!(c.trend(10), Some("degrading"));
    }

    #[test]
    fn trend_is_none_before_window_fills() {
        let mut c = controller();
        c.evaluate(metrics(0.5));
        assert_eq!(c.trend(10), None);
    }
}
