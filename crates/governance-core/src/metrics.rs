//! In-memory metrics collection and SLA monitoring.
//!
//! Feeds QoS decisions, auto-mode-switching triggers, and the `/status`
//! and `/sla` surfaces. Kept in-memory with a rolling window; no
//! external metrics backend (the teacher's dashboard/Prometheus wiring
//! is out of scope here — this stays an internal feedback signal).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct MetricPoint {
    pub timestamp: Instant,
    pub value: f64,
}

pub struct MetricsCollector {
    window_size: usize,
    counters: HashMap<String, f64>,
    gauges: HashMap<String, f64>,
    histograms: HashMap<String, VecDeque<MetricPoint>>,
}

impl MetricsCollector {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            counters: HashMap::new(),
            gauges: HashMap::new(),
            histograms: HashMap::new(),
        }
    }

    pub fn inc_counter(&mut self, name: &str, amount: f64) {
        *self.counters.entry(name.to_string()).or_insert(0.0) += amount;
    }

    pub fn set_gauge(&mut self, name: &str, value: f64) {
        self.gauges.insert(name.to_string(), value);
    }

    pub fn observe(&mut self, name: &str, value: f64) {
        let window_size = self.window_size;
        let hist = self.histograms.entry(name.to_string()).or_insert_with(|| VecDeque::with_capacity(window_size));
        if hist.len() >= window_size {
            hist.pop_front();
        }
        hist.push_back(MetricPoint {
            timestamp: Instant::now(),
            value,
        });
    }

    pub fn get_counter(&self, name: &str) -> f64 {
        *self.counters.get(name).unwrap_or(&0.0)
    }

    pub fn get_gauge(&self, name: &str) -> f64 {
        *self.gauges.get(name).unwrap_or(&0.0)
    }

    pub fn get_histogram_avg(&self, name: &str, window: Duration) -> Option<f64> {
        let hist = self.histograms.get(name)?;
        let cutoff = Instant::now().checked_sub(window)?;
        let values: Vec<f64> = hist.iter().filter(|p| p.timestamp >= cutoff).map(|p| p.value).collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    pub fn get_histogram_p99(&self, name: &str, window: Duration) -> Option<f64> {
        let hist = self.histograms.get(name)?;
        let cutoff = Instant::now().checked_sub(window)?;
        let mut values: Vec<f64> = hist.iter().filter(|p| p.timestamp >= cutoff).map(|p| p.value).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).expect("metric values are never NaN"));
        let idx = ((values.len() as f64) * 0.99) as usize;
        Some(values[idx.min(values.len() - 1)])
    }

    pub fn reset(&mut self) {
        self.counters.clear();
        self.gauges.clear();
        self.histograms.clear();
    }
}

/// Monitors service-level indicators; used for auto-mode-switching
/// triggers and the `/sla` status surface, never wired directly into
/// the decision pipeline.
pub struct SlaMonitor {
    latency_sla_ms: f64,
    error_rate_sla: f64,
    approval_rate_floor: f64,
}

#[derive(Debug, Clone)]
pub struct SlaChecks {
    pub latency: bool,
    pub error_rate: bool,
    pub approval_rate: bool,
}

impl SlaChecks {
    pub fn all_healthy(&self) -> bool {
        self.latency && self.error_rate && self.approval_rate
    }
}

impl SlaMonitor {
    pub fn new(latency_sla_ms: f64, error_rate_sla: f64, approval_rate_floor: f64) -> Self {
        Self {
            latency_sla_ms,
            error_rate_sla,
            approval_rate_floor,
        }
    }

    pub fn check(&self, metrics: &MetricsCollector) -> SlaChecks {
        let avg_latency = metrics.get_histogram_avg("intent_latency_ms", Duration::from_secs(60));
        let latency = avg_latency.map(|v| v <= self.latency_sla_ms).unwrap_or(true);

        let total = metrics.get_counter("intents_total");
        let errors = metrics.get_counter("intents_error");
        let error_rate = if total > 0.0 {
            (errors / total) <= self.error_rate_sla
        } else {
            true
        };

        let approved = metrics.get_counter("intents_approved");
        let approval_rate = if total > 10.0 {
            (approved / total) >= self.approval_rate_floor
        } else {
            true
        };

        SlaChecks {
            latency,
            error_rate,
            approval_rate,
        }
    }

    pub fn is_degraded(&self, metrics: &MetricsCollector) -> bool {
        !self.check(metrics).all_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let mut m = MetricsCollector::new(300);
        m.inc_counter("intents_total", 1.0);
        m.inc_counter("intents_total", 1.0);
        assert_eq!(m.get_counter("intents_total"), 2.0);
    }

    #[test]
    fn histogram_average_within_window() {
        let mut m = MetricsCollector::new(300);
        m.observe("latency", 10.0);
        m.observe("latency", 20.0);
        let avg = m.get_histogram_avg("latency", Duration::from_secs(60)).unwrap();
        assert!((avg - 15.0).abs() < 1e-9);
    }

    #[test]
    fn missing_histogram_returns_none() {
        let m = MetricsCollector::new(300);
        assert!(m.get_histogram_avg("nothing", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn sla_healthy_with_no_data() {
        let m = MetricsCollector::new(300);
        let sla = SlaMonitor::new(200.0, 0.05, 0.3);
        assert!(sla.check(&m).all_healthy());
    }

    #[test]
    fn sla_breached_on_high_error_rate() {
        let mut m = MetricsCollector::new(300);
        m.inc_counter("intents_total", 100.0);
        m.inc_counter("intents_error", 10.0);
        let sla = SlaMonitor::new(200.0, 0.05, 0.3);
        assert!(!sla.check(&m).error_rate);
        assert!(sla.is_degraded(&m));
    }

    #[test]
    fn low_approval_rate_needs_minimum_sample_size() {
        let mut m = MetricsCollector::new(300);
        m.inc_counter("intents_total", 5.0);
        m.inc_counter("intents_approved", 0.0);
        let sla = SlaMonitor::new(200.0, 0.05, 0.3);
        assert!(sla.check(&m).approval_rate);
    }
}
