//! Panic switch — emergency lockdown without a process restart.
//!
//! Two triggers: a file (`touch <lock_path>`, for operators who only
//! have filesystem access) and a programmatic call (for the API). While
//! active, the engine forces FORENSIC mode and rejects new intents.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PanicState {
    pub active: bool,
    pub reason: String,
    pub activated_at: Option<Instant>,
    pub activated_by: String,
    pub auto_clear_after: Duration,
}

impl Default for PanicState {
    fn default() -> Self {
        Self {
            active: false,
            reason: String::new(),
            activated_at: None,
            activated_by: String::new(),
            auto_clear_after: Duration::ZERO,
        }
    }
}

pub struct PanicSwitch {
    lock_path: PathBuf,
    auto_clear: Duration,
    state: PanicState,
}

impl PanicSwitch {
    pub fn new(lock_path: impl Into<PathBuf>, auto_clear: Duration) -> Self {
        let mut switch = Self {
            lock_path: lock_path.into(),
            auto_clear,
            state: PanicState::default(),
        };
        switch.check_file_trigger();
        switch
    }

    pub fn activate(&mut self, reason: &str, source: &str) {
        self.state = PanicState {
            active: true,
            reason: reason.to_string(),
            activated_at: Some(Instant::now()),
            activated_by: source.to_string(),
            auto_clear_after: self.auto_clear,
        };
        self.write_lock_file(reason);
        tracing::error!(target: "governance_core::panic", reason, source, "PANIC ACTIVATED");
    }

    pub fn deactivate(&mut self, operator: &str) {
        if !self.state.active {
            return;
        }
        let elapsed = self.state.activated_at.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
        self.state.active = false;
        self.remove_lock_file();
        tracing::info!(target: "governance_core::panic", operator, elapsed_s = elapsed, "panic deactivated");
    }

    /// Refresh state (file trigger, auto-clear timeout) and return
    /// whether panic is currently active.
    pub fn check(&mut self) -> bool {
        self.check_file_trigger();
        if self.state.active && !self.state.auto_clear_after.is_zero() {
            if let Some(activated_at) = self.state.activated_at {
                if activated_at.elapsed() > self.state.auto_clear_after {
                    tracing::info!(target: "governance_core::panic", auto_clear_after_s = self.state.auto_clear_after.as_secs_f64(), "panic auto-cleared");
                    self.deactivate("auto_clear");
                }
            }
        }
        self.state.active
    }

    pub fn is_active(&mut self) -> bool {
        self.check()
    }

    pub fn state(&mut self) -> PanicState {
        self.check();
        self.state.clone()
    }

    fn check_file_trigger(&mut self) {
        if self.lock_path.exists() && !self.state.active {
            let reason = std::fs::read_to_string(&self.lock_path)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "External trigger (panic.lock detected)".to_string());
            self.state = PanicState {
                active: true,
                reason: reason.clone(),
                activated_at: Some(Instant::now()),
                activated_by: "file".to_string(),
                auto_clear_after: self.auto_clear,
            };
            tracing::error!(target: "governance_core::panic", reason = %reason, "PANIC DETECTED via lock file");
        }
    }

    fn write_lock_file(&self, reason: &str) {
        if let Some(parent) = self.lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::error!(target: "governance_core::panic", error = %e, "failed to create panic lock directory");
                    return;
                }
            }
        }
        let payload = serde_json::json!({
            "reason": reason,
            "source": self.state.activated_by,
        });
        if let Err(e) = std::fs::write(&self.lock_path, payload.to_string()) {
            tracing::error!(target: "governance_core::panic", error = %e, "failed to write panic lock");
        }
    }

    fn remove_lock_file(&self) {
        if self.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.lock_path) {
                tracing::error!(target: "governance_core::panic", error = %e, "failed to remove panic lock");
            }
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_inactive_when_no_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut switch = PanicSwitch::new(dir.path().join("panic.lock"), Duration::ZERO);
        assert!(!switch.is_active());
    }

    #[test]
    fn programmatic_activate_and_deactivate() {
        let dir = tempfile::tempdir().unwrap();
        let mut switch = PanicSwitch::new(dir.path().join("panic.lock"), Duration::ZERO);
        switch.activate("test emergency", "api");
        assert!(switch.is_active());
        assert!(switch.lock_path().exists());
        switch.deactivate("operator");
        assert!(!switch.is_active());
        assert!(!switch.lock_path().exists());
    }

    #[test]
    fn file_trigger_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("panic.lock");
        std::fs::write(&lock_path, "someone pulled the cord").unwrap();
        let mut switch = PanicSwitch::new(&lock_path, Duration::ZERO);
        assert!(switch.is_active());
        assert_eq!(switch.state().reason, "someone pulled the cord");
    }

    #[test]
    fn auto_clear_expires_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut switch = PanicSwitch::new(dir.path().join("panic.lock"), Duration::from_millis(20));
        switch.activate("transient", "api");
        assert!(switch.is_active());
        std::thread::sleep(Duration::from_millis(30));
        assert!(!switch.is_active());
    }
}
