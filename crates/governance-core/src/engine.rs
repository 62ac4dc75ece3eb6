//! `GovernanceEngine` — orchestrates the decision pipeline and owns every
//! coupled subsystem: policy, audit chain, circuit breakers, adaptive
//! QoS, metrics, the panic switch, and the feedback loop.
//!
//! The policy is held behind a `RwLock<Arc<Policy>>` so a `reload_policy`
//! publishes a new snapshot atomically — in-flight evaluations keep
//! whichever `Arc` they already cloned out. Every other subsystem that
//! needs exclusive mutation (the audit chain, breaker counters, the QoS
//! history ring, the feedback buffers) sits behind its own short-held
//! mutex; nothing here awaits, so lock scope stays tight.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::json;

use crate::audit::AuditChain;
use crate::breaker::CircuitBreakerRegistry;
use crate::error::Result;
use crate::feedback::{FeedbackAction, FeedbackConfig, FeedbackLoop};
use crate::intent::{Intent, Priority};
use crate::metrics::{MetricsCollector, SlaMonitor};
use crate::modes::OperationalMode;
use crate::panic_switch::PanicSwitch;
use crate::policy::Policy;
use crate::qos::{AdaptiveQosController, QoSAdjustment, SystemMetrics};
use crate::trace::{Decision, DecisionTrace};

const KNOWN_SUBSYSTEMS: [&str; 5] = ["ssai", "consensus", "p2p", "sandbox", "audit"];

pub struct EngineConfig {
    pub config_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub panic_lock_path: PathBuf,
    pub panic_auto_clear: Duration,
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout: Duration,
    pub breaker_half_open_max_probes: u32,
    pub qos_latency_threshold_ms: f64,
    pub qos_cpu_threshold: f64,
    pub qos_memory_threshold: f64,
    pub metrics_window: usize,
    pub feedback: FeedbackConfig,
}

pub struct GovernanceEngine {
    config_path: PathBuf,
    policy: RwLock<Arc<Policy>>,
    last_policy_hash: Mutex<Option<String>>,
    reload_count: Mutex<u64>,

    audit: Mutex<AuditChain>,
    breakers: Mutex<CircuitBreakerRegistry>,
    qos: Mutex<AdaptiveQosController>,
    last_qos: Mutex<QoSAdjustment>,
    metrics: Mutex<MetricsCollector>,
    sla: SlaMonitor,
    panic_switch: Mutex<PanicSwitch>,
    feedback: Mutex<FeedbackLoop>,
}

impl GovernanceEngine {
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        let policy = Policy::load_from_path(&cfg.config_path)?
            .map(|(p, _raw, _hash)| p)
            .unwrap_or_else(|| Policy::default_for_mode(OperationalMode::Production));

        let audit = AuditChain::open(&cfg.audit_log_path)?;
        let mut breakers = CircuitBreakerRegistry::new(
            cfg.breaker_failure_threshold,
            cfg.breaker_recovery_timeout,
            cfg.breaker_half_open_max_probes,
        );
        for subsystem in KNOWN_SUBSYSTEMS {
            breakers.register(subsystem);
        }

        let qos = AdaptiveQosController::new(
            policy.queue_backpressure_threshold as u64,
            cfg.qos_latency_threshold_ms,
            cfg.qos_cpu_threshold,
            cfg.qos_memory_threshold,
            policy.adaptive_throttling,
        );

        Ok(Self {
            config_path: cfg.config_path,
            policy: RwLock::new(Arc::new(policy)),
            last_policy_hash: Mutex::new(None),
            reload_count: Mutex::new(0),
            audit: Mutex::new(audit),
            breakers: Mutex::new(breakers),
            qos: Mutex::new(qos),
            last_qos: Mutex::new(QoSAdjustment::default()),
            metrics: Mutex::new(MetricsCollector::new(cfg.metrics_window)),
            sla: SlaMonitor::new(200.0, 0.05, 0.3),
            panic_switch: Mutex::new(PanicSwitch::new(cfg.panic_lock_path, cfg.panic_auto_clear)),
            feedback: Mutex::new(FeedbackLoop::new(cfg.feedback)),
        })
    }

    pub fn policy(&self) -> Arc<Policy> {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Hot-reload from `config_path`. Never throws: a missing file or a
    /// parse/validation error keeps the current policy in effect and
    /// returns `false`.
    pub fn reload_policy(&self) -> bool {
        let loaded = match Policy::load_from_path(self.config_path()) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(target: "governance_core::engine", error = %e, "policy reload failed, keeping previous policy");
                return false;
            }
        };
        let Some((new_policy, raw, hash)) = loaded else {
            tracing::warn!(target: "governance_core::engine", path = %self.config_path().display(), "no policy file found, keeping current policy");
            return false;
        };

        let mut last_hash = self.last_policy_hash.lock().expect("last_policy_hash lock poisoned");
        if last_hash.as_deref() != Some(hash.as_str()) {
            tracing::info!(target: "governance_core::engine", old = ?*last_hash, new = %hash, "policy file contents changed");
        }
        *last_hash = Some(hash.clone());
        drop(last_hash);
        let _ = raw;

        self.qos
            .lock()
            .expect("qos lock poisoned")
            .update_thresholds(new_policy.queue_backpressure_threshold as u64, new_policy.adaptive_throttling);

        let mode_str = new_policy.mode.as_str().to_string();
        *self.policy.write().expect("policy lock poisoned") = Arc::new(new_policy);
        *self.reload_count.lock().expect("reload_count lock poisoned") += 1;

        self.audit.lock().expect("audit lock poisoned").log_policy_reload(&hash, &mode_str);
        tracing::info!(target: "governance_core::engine", mode = %mode_str, hash = %hash, "policy reloaded");
        true
    }

    /// Delegate to the QoS controller and cache the result for the next
    /// `evaluate_intent` call's fuel-budget computation.
    pub fn update_qos(&self, metrics: SystemMetrics) -> QoSAdjustment {
        let adjustment = self.qos.lock().expect("qos lock poisoned").evaluate(metrics);
        *self.last_qos.lock().expect("last_qos lock poisoned") = adjustment.clone();
        adjustment
    }

    /// Convenience entry point: consults the panic switch itself before
    /// running the pipeline.
    pub fn evaluate(&self, intent: &Intent, actor_reputation: f64) -> DecisionTrace {
        let is_panic = self.panic_switch.lock().expect("panic lock poisoned").is_active();
        self.evaluate_intent(intent, actor_reputation, is_panic)
    }

    /// The full evaluation pipeline. Always returns a `DecisionTrace` —
    /// nothing in this path is fallible from the caller's perspective.
    pub fn evaluate_intent(&self, intent: &Intent, actor_reputation: f64, is_panic: bool) -> DecisionTrace {
        let policy = self.policy();
        let timestamp = unix_timestamp();
        let mut trace = DecisionTrace::new(intent.id.clone(), timestamp);
        trace.mode_snapshot = policy.mode.as_str().to_string();
        trace.security_posture = policy.security_posture.as_str().to_string();
        trace.performance_profile = policy.performance_profile.as_str().to_string();
        trace.actor_reputation = actor_reputation;

        let last_qos = self.last_qos.lock().expect("last_qos lock poisoned").clone();
        trace.load_level = last_qos.load_level.as_str().to_string();
        trace.qos_adjusted = !last_qos.reasons.is_empty();

        // 1. Panic.
        if is_panic {
            trace.decision = Decision::Rejected;
            trace.add_reason("PANIC mode active");
            return self.finalize(trace, &policy);
        }

        // 2. FORENSIC mode is read-only.
        if policy.mode == OperationalMode::Forensic {
            trace.decision = Decision::Rejected;
            trace.add_reason("read-only");
            return self.finalize(trace, &policy);
        }

        // 3. SSAI breaker health.
        let mut skip_semantic = false;
        {
            let mut breakers = self.breakers.lock().expect("breakers lock poisoned");
            if !breakers.is_healthy("ssai") {
                trace.add_reason("SSAI subsystem unhealthy, using fallback semantic risk");
                trace.semantic_risk = 0.3;
                skip_semantic = true;
            }
            drop(breakers);
        }

        // 4. QoS load shedding.
        if last_qos.shed_low_priority && intent.priority == Priority::Low {
            trace.decision = Decision::Rejected;
            trace.add_reason("rejected: system under load, shedding low-priority intents");
            return self.finalize(trace, &policy);
        }

        let security_overrides = policy.security_posture.overrides();

        // 5. Signature requirement.
        if security_overrides.require_signed_intents && !intent.is_signed() {
            trace.decision = Decision::Rejected;
            trace.risk_score = 1.0;
            trace.add_reason(format!("missing signature (required under {} posture)", policy.security_posture.as_str()));
            return self.finalize(trace, &policy);
        }

        // 6. Reputation gate.
        if actor_reputation < security_overrides.min_reputation {
            trace.decision = Decision::Rejected;
            trace.risk_score = 0.9;
            trace.add_reason(format!(
                "actor reputation {:.2} below minimum {:.2}",
                actor_reputation, security_overrides.min_reputation
            ));
            return self.finalize(trace, &policy);
        }

        // 7. Semantic risk.
        if !skip_semantic {
            trace.semantic_risk = intent.semantic_risk_heuristic();
            self.breakers.lock().expect("breakers lock poisoned").record_success("ssai");
        }

        // 8. Behavioral risk.
        trace.behavioral_risk = intent.behavioral_risk_heuristic();

        // 9. Fuel budget.
        let effective_fuel_budget = (policy.max_fuel_per_intent as f64 * last_qos.fuel_multiplier) as u64;
        if intent.fuel_estimate > effective_fuel_budget {
            trace.decision = Decision::Rejected;
            trace.add_reason(format!("fuel limit exceeded ({} > {})", intent.fuel_estimate, effective_fuel_budget));
            return self.finalize(trace, &policy);
        }

        // 10. Weighted aggregation.
        trace.compute_confidence(
            policy.risk_weight_semantic,
            policy.risk_weight_behavioral,
            policy.risk_weight_reputation,
            1.0,
        );

        // 11. Decision thresholds on confidence.
        if trace.confidence_score >= 0.7 {
            trace.decision = Decision::Approved;
        } else if trace.confidence_score >= 0.4 {
            trace.decision = Decision::Quarantined;
            trace.add_reason(format!("confidence {:.2} — quarantined for review", trace.confidence_score));
        } else {
            trace.decision = Decision::Rejected;
            trace.add_reason(format!("confidence {:.2} too low", trace.confidence_score));
        }

        self.finalize(trace, &policy)
    }

    fn finalize(&self, mut trace: DecisionTrace, policy: &Policy) -> DecisionTrace {
        if trace.confidence_score == 0.0 && trace.decision != Decision::Pending {
            trace.compute_confidence(policy.risk_weight_semantic, policy.risk_weight_behavioral, policy.risk_weight_reputation, 1.0);
        }
        self.audit.lock().expect("audit lock poisoned").log_decision(trace.to_dict());
        trace
    }

    /// Stamp a human override onto an already-finalized trace. No-op
    /// (logged, no audit entry) if the policy forbids manual overrides.
    pub fn manual_override(&self, trace: &mut DecisionTrace, operator: &str, new_decision: Decision, justification: &str) -> bool {
        if !self.policy().allow_manual_override {
            tracing::warn!(target: "governance_core::engine", operator, "manual override refused: disabled by policy");
            return false;
        }
        trace.apply_override(operator, new_decision, justification);
        self.audit
            .lock()
            .expect("audit lock poisoned")
            .log_manual_override(operator, new_decision.as_str(), justification);
        true
    }

    pub fn activate_panic(&self, reason: &str, source: &str) {
        self.panic_switch.lock().expect("panic lock poisoned").activate(reason, source);
        self.audit.lock().expect("audit lock poisoned").log_panic(reason);
    }

    pub fn deactivate_panic(&self, operator: &str) {
        self.panic_switch.lock().expect("panic lock poisoned").deactivate(operator);
    }

    pub fn is_panic_active(&self) -> bool {
        self.panic_switch.lock().expect("panic lock poisoned").is_active()
    }

    pub fn record_subsystem_success(&self, subsystem: &str) {
        self.breakers.lock().expect("breakers lock poisoned").record_success(subsystem);
    }

    pub fn record_subsystem_failure(&self, subsystem: &str) {
        self.breakers.lock().expect("breakers lock poisoned").record_failure(subsystem);
    }

    pub fn is_subsystem_healthy(&self, subsystem: &str) -> bool {
        self.breakers.lock().expect("breakers lock poisoned").is_healthy(subsystem)
    }

    /// Set an arbitrary gauge on the shared metrics collector (e.g. the
    /// last-observed CPU usage, for callers that poll `feedback_tick`
    /// on their own schedule rather than supplying it per-call).
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.metrics.lock().expect("metrics lock poisoned").set_gauge(name, value);
    }

    pub fn get_gauge(&self, name: &str) -> f64 {
        self.metrics.lock().expect("metrics lock poisoned").get_gauge(name)
    }

    pub fn observe_outcome(&self, latency_ms: f64, rejected: bool) {
        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
        self.feedback.lock().expect("feedback lock poisoned").observe(&mut metrics, latency_ms, rejected);
    }

    /// Run one feedback evaluation tick and, if it proposes an action,
    /// apply it to the policy and return it. `FeedbackLoop` itself never
    /// touches the engine; this is the one place that bridges the two.
    pub fn feedback_tick(&self, cpu_usage: f64) -> Option<FeedbackAction> {
        let policy = self.policy();
        let action = self
            .feedback
            .lock()
            .expect("feedback lock poisoned")
            .evaluate(policy.performance_profile, policy.security_posture, cpu_usage)?;
        self.apply_feedback_action(&action);
        Some(action)
    }

    fn apply_feedback_action(&self, action: &FeedbackAction) {
        let current = self.policy();
        let mut updated = (*current).clone();
        if let Some(profile) = action.performance {
            updated.performance_profile = profile;
            updated.cognitive_speed = profile.preset().cognitive_speed;
        }
        if let Some(posture) = action.security {
            updated.security_posture = posture;
        }
        *self.policy.write().expect("policy lock poisoned") = Arc::new(updated);
        tracing::info!(target: "governance_core::engine", action = action.name, reason = %action.reason, "feedback action applied");
    }

    /// Structured snapshot for the status surface.
    pub fn status(&self) -> serde_json::Value {
        let policy = self.policy();
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        let breakers = self.breakers.lock().expect("breakers lock poisoned");
        let audit = self.audit.lock().expect("audit lock poisoned");
        let feedback = self.feedback.lock().expect("feedback lock poisoned");
        let (chain_ok, chain_bad_index) = audit.verify_chain();

        let breaker_statuses: serde_json::Map<String, serde_json::Value> = breakers
            .get_all_status()
            .into_iter()
            .map(|(name, status)| {
                (
                    name,
                    json!({
                        "state": status.state.as_str(),
                        "failures": status.failure_count,
                        "total_trips": status.total_trips,
                    }),
                )
            })
            .collect();

        json!({
            "mode": policy.mode.as_str(),
            "security_posture": policy.security_posture.as_str(),
            "performance_profile": policy.performance_profile.as_str(),
            "reload_count": *self.reload_count.lock().expect("reload_count lock poisoned"),
            "panic_active": self.is_panic_active(),
            "breakers": breaker_statuses,
            "audit": {
                "length": audit.len(),
                "chain_ok": chain_ok,
                "chain_bad_index": chain_bad_index,
            },
            "feedback": {
                "last_action": feedback.state().last_action,
                "total_adaptations": feedback.state().total_adaptations,
                "in_cooldown": feedback.state().in_cooldown,
            },
            "sla": self.sla.check(&metrics).all_healthy(),
        })
    }

    /// The most recent `last` audit entries, oldest first.
    pub fn audit_entries(&self, last: usize) -> Vec<crate::audit::AuditEntry> {
        let audit = self.audit.lock().expect("audit lock poisoned");
        let len = audit.len();
        let start = len.saturating_sub(last);
        (start..len).filter_map(|i| audit.get_entry(i as u64).cloned()).collect()
    }

    /// Re-verify the full hash chain. Returns `(ok, first_bad_index)`.
    pub fn audit_verify(&self) -> (bool, Option<u64>) {
        self.audit.lock().expect("audit lock poisoned").verify_chain()
    }

    pub fn sla_report(&self) -> serde_json::Value {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        let checks = self.sla.check(&metrics);
        json!({
            "healthy": checks.all_healthy(),
            "checks": {
                "latency": checks.latency,
                "error_rate": checks.error_rate,
                "approval_rate": checks.approval_rate,
            },
            "total_intents": metrics.get_counter("intents_total"),
            "approved": metrics.get_counter("intents_approved"),
            "rejected": metrics.get_counter("intents_rejected"),
        })
    }
}

fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_engine() -> (tempfile::TempDir, GovernanceEngine) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig {
            config_path: dir.path().join("policy.yaml"),
            audit_log_path: dir.path().join("audit.jsonl"),
            panic_lock_path: dir.path().join("panic.lock"),
            panic_auto_clear: Duration::ZERO,
            breaker_failure_threshold: 5,
            breaker_recovery_timeout: Duration::from_secs(30),
            breaker_half_open_max_probes: 1,
            qos_latency_threshold_ms: 200.0,
            qos_cpu_threshold: 0.85,
            qos_memory_threshold: 0.90,
            metrics_window: 300,
            feedback: FeedbackConfig::default(),
        };
        let engine = GovernanceEngine::new(cfg).unwrap();
        (dir, engine)
    }

    #[test]
    fn scenario_unsigned_intent_in_guarded_is_rejected() {
        let (dir, _guard) = test_engine();
        std::fs::write(dir.path().join("policy.yaml"), "mode: production\nsecurity_posture: guarded\n").unwrap();
        _guard.reload_policy();

        let intent = Intent {
            id: "i1".to_string(),
            action: "read".to_string(),
            scope: Some("/".to_string()),
            fuel_estimate: 1000,
            ..Default::default()
        };
        let before_len = _guard.status()["audit"]["length"].as_u64().unwrap();
        let trace = _guard.evaluate_intent(&intent, 0.9, false);
        assert_eq!(trace.decision, Decision::Rejected);
        assert!((trace.risk_score - 1.0).abs() < 1e-9);
        assert!(trace.reasons.iter().any(|r| r.contains("signature")));
        let after_len = _guard.status()["audit"]["length"].as_u64().unwrap();
        assert_eq!(after_len, before_len + 1);
    }

    #[test]
    fn scenario_happy_path_is_approved() {
        let (dir, engine) = test_engine();
        std::fs::write(dir.path().join("policy.yaml"), "mode: production\nsecurity_posture: open\nperformance_profile: balanced\n").unwrap();
        engine.reload_policy();

        let intent = Intent {
            id: "i2".to_string(),
            action: "read".to_string(),
            scope: Some("/u/a".to_string()),
            fuel_estimate: 1000,
            ..Default::default()
        };
        let trace = engine.evaluate_intent(&intent, 0.9, false);
        assert_eq!(trace.decision, Decision::Approved);
        assert!((trace.risk_score - 0.02).abs() < 1e-6);
        assert!((trace.confidence_score - 0.98).abs() < 1e-6);
    }

    #[test]
    fn panic_flag_rejects_regardless_of_content() {
        let (_dir, engine) = test_engine();
        let intent = Intent {
            action: "read".to_string(),
            scope: Some("/".to_string()),
            signature: Some("sig".to_string()),
            ..Default::default()
        };
        let trace = engine.evaluate_intent(&intent, 1.0, true);
        assert_eq!(trace.decision, Decision::Rejected);
    }

    #[test]
    fn forensic_mode_rejects_every_intent() {
        let (dir, engine) = test_engine();
        std::fs::write(dir.path().join("policy.yaml"), "mode: forensic\n").unwrap();
        engine.reload_policy();
        let intent = Intent {
            action: "read".to_string(),
            signature: Some("sig".to_string()),
            scope: Some("/".to_string()),
            ..Default::default()
        };
        let trace = engine.evaluate_intent(&intent, 1.0, false);
        assert_eq!(trace.decision, Decision::Rejected);
    }

    #[test]
    fn qos_shedding_rejects_low_priority_under_overload() {
        let (_dir, engine) = test_engine();
        engine.update_qos(SystemMetrics {
            cpu_usage: 0.9,
            queue_depth: 250,
            ..Default::default()
        });
        let intent = Intent {
            action: "read".to_string(),
            priority: Priority::Low,
            signature: Some("sig".to_string()),
            scope: Some("/".to_string()),
            ..Default::default()
        };
        let trace = engine.evaluate_intent(&intent, 1.0, false);
        assert_eq!(trace.decision, Decision::Rejected);
        assert!(trace.reasons.iter().any(|r| r.contains("shedding")));
    }

    #[test]
    fn manual_override_updates_decision_when_allowed() {
        let (_dir, engine) = test_engine();
        let intent = Intent {
            action: "read".to_string(),
            scope: Some("/".to_string()),
            signature: Some("sig".to_string()),
            ..Default::default()
        };
        let mut trace = engine.evaluate_intent(&intent, 0.05, false);
        assert_eq!(trace.decision, Decision::Rejected);
        let applied = engine.manual_override(&mut trace, "alice", Decision::Approved, "verified manually");
        assert!(applied);
        assert_eq!(trace.decision, Decision::Approved);
    }

    #[test]
    fn reload_is_idempotent_and_still_audits() {
        let (dir, engine) = test_engine();
        std::fs::write(dir.path().join("policy.yaml"), "mode: production\n").unwrap();
        assert!(engine.reload_policy());
        let len_after_first = engine.status()["audit"]["length"].as_u64().unwrap();
        assert!(engine.reload_policy());
        let len_after_second = engine.status()["audit"]["length"].as_u64().unwrap();
        assert_eq!(len_after_second, len_after_first + 1);
    }
}
