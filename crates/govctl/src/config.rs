//! Daemon configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

/// Daemon configuration, loaded from environment variables with sane
/// development defaults.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Path to the YAML policy file watched by `/api/v1/policy/reload`.
    pub policy_path: String,

    /// Path to the append-only audit log (line-delimited JSON).
    pub audit_log_path: String,

    /// Path the panic switch polls for a file-based trigger.
    pub panic_lock_path: String,

    /// How long an auto-triggered panic stays active before clearing
    /// itself. Zero means it never auto-clears.
    pub panic_auto_clear_secs: u64,

    /// Interval between background feedback-loop ticks.
    pub feedback_tick_ms: u64,

    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout_secs: u64,
    pub breaker_half_open_max_probes: u32,

    pub qos_latency_threshold_ms: f64,
    pub qos_cpu_threshold: f64,
    pub qos_memory_threshold: f64,

    /// Number of samples each metrics histogram keeps in its rolling window.
    pub metrics_window_size: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8871".to_string(),
            policy_path: "config/policy.yaml".to_string(),
            audit_log_path: "data/audit.log".to_string(),
            panic_lock_path: "data/panic.lock".to_string(),
            panic_auto_clear_secs: 0,
            feedback_tick_ms: 5_000,
            breaker_failure_threshold: 5,
            breaker_recovery_timeout_secs: 30,
            breaker_half_open_max_probes: 1,
            qos_latency_threshold_ms: 200.0,
            qos_cpu_threshold: 0.85,
            qos_memory_threshold: 0.90,
            metrics_window_size: 500,
        }
    }
}

impl DaemonConfig {
    /// Build from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GOVCTL_BIND") {
            config.bind_addr = v;
        }
        if let Ok(v) = std::env::var("GOVCTL_POLICY_PATH") {
            config.policy_path = v;
        }
        if let Ok(v) = std::env::var("GOVCTL_AUDIT_LOG_PATH") {
            config.audit_log_path = v;
        }
        if let Ok(v) = std::env::var("GOVCTL_PANIC_LOCK_PATH") {
            config.panic_lock_path = v;
        }
        if let Ok(v) = std::env::var("GOVCTL_PANIC_AUTO_CLEAR_SECS") {
            if let Ok(parsed) = v.parse() {
                config.panic_auto_clear_secs = parsed;
            }
        }
        if let Ok(v) = std::env::var("GOVCTL_FEEDBACK_TICK_MS") {
            if let Ok(parsed) = v.parse() {
                config.feedback_tick_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("GOVCTL_BREAKER_FAILURE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                config.breaker_failure_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("GOVCTL_BREAKER_RECOVERY_TIMEOUT_SECS") {
            if let Ok(parsed) = v.parse() {
                config.breaker_recovery_timeout_secs = parsed;
            }
        }

        config
    }

    pub fn policy_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.policy_path)
    }

    pub fn audit_log_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.audit_log_path)
    }

    pub fn panic_lock_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.panic_lock_path)
    }

    pub fn panic_auto_clear(&self) -> Duration {
        Duration::from_secs(self.panic_auto_clear_secs)
    }

    pub fn feedback_tick(&self) -> Duration {
        Duration::from_millis(self.feedback_tick_ms)
    }

    pub fn breaker_recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_recovery_timeout_secs)
    }

    /// Build the `governance-core` engine configuration from this daemon
    /// configuration.
    pub fn engine_config(&self) -> governance_core::EngineConfig {
        governance_core::EngineConfig {
            config_path: self.policy_path_buf(),
            audit_log_path: self.audit_log_path_buf(),
            panic_lock_path: self.panic_lock_path_buf(),
            panic_auto_clear: self.panic_auto_clear(),
            breaker_failure_threshold: self.breaker_failure_threshold,
            breaker_recovery_timeout: self.breaker_recovery_timeout(),
            breaker_half_open_max_probes: self.breaker_half_open_max_probes,
            qos_latency_threshold_ms: self.qos_latency_threshold_ms,
            qos_cpu_threshold: self.qos_cpu_threshold,
            qos_memory_threshold: self.qos_memory_threshold,
            metrics_window: self.metrics_window_size,
            feedback: governance_core::feedback::FeedbackConfig::default(),
        }
    }
}
