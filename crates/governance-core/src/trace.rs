//! `DecisionTrace` — the explainable record every governance decision
//! produces. Logged to the audit chain, queryable via `explain()`, and
//! replayable for post-incident review in FORENSIC mode.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::modes::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
    Quarantined,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Quarantined => "QUARANTINED",
        }
    }
}

/// Recommended next step derived from the confidence score, not from the
/// decision itself — two APPROVED intents can carry different recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    SafeExecution,
    Monitor,
    ManualReview,
    Block,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SafeExecution => "safe_execution",
            Self::Monitor => "monitor",
            Self::ManualReview => "manual_review",
            Self::Block => "block",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub intent_id: String,
    pub timestamp: f64,
    pub mode_snapshot: String,
    pub security_posture: String,
    pub performance_profile: String,
    pub risk_score: f64,

    pub semantic_risk: f64,
    pub behavioral_risk: f64,
    pub actor_reputation: f64,

    pub confidence_score: f64,
    pub uncertainty: f64,
    pub recommended_action: Option<RecommendedAction>,

    pub load_level: String,
    pub qos_adjusted: bool,

    pub decision: Decision,
    pub reasons: Vec<String>,

    pub overridden: bool,
    pub override_by: String,
    pub override_justification: String,
}

impl DecisionTrace {
    pub fn new(intent_id: impl Into<String>, timestamp: f64) -> Self {
        Self {
            intent_id: intent_id.into(),
            timestamp,
            mode_snapshot: "unknown".to_string(),
            security_posture: "unknown".to_string(),
            performance_profile: "unknown".to_string(),
            risk_score: 0.0,
            semantic_risk: 0.0,
            behavioral_risk: 0.0,
            actor_reputation: 1.0,
            confidence_score: 0.0,
            uncertainty: 0.0,
            recommended_action: None,
            load_level: "unknown".to_string(),
            qos_adjusted: false,
            decision: Decision::Pending,
            reasons: Vec::new(),
            overridden: false,
            override_by: String::new(),
            override_justification: String::new(),
        }
    }

    pub fn add_reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }

    /// Weighted confidence aggregation: `risk_score` is the clamped
    /// weighted sum of the three risk factors, `confidence_score` scales
    /// it by quorum, and `uncertainty` is the population stddev across
    /// the same three factors (not a statistical sample stddev).
    pub fn compute_confidence(&mut self, w_semantic: f64, w_behavioral: f64, w_reputation: f64, quorum_score: f64) {
        let weighted_risk =
            w_semantic * self.semantic_risk + w_behavioral * self.behavioral_risk + w_reputation * (1.0 - self.actor_reputation);
        self.risk_score = weighted_risk.clamp(0.0, 1.0);
        self.confidence_score = (1.0 - self.risk_score) * quorum_score;

        let factors = [self.semantic_risk, self.behavioral_risk, 1.0 - self.actor_reputation];
        let mean = factors.iter().sum::<f64>() / factors.len() as f64;
        let variance = factors.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / factors.len() as f64;
        self.uncertainty = variance.sqrt();

        self.recommended_action = Some(if self.confidence_score >= 0.8 {
            RecommendedAction::SafeExecution
        } else if self.confidence_score >= 0.6 {
            RecommendedAction::Monitor
        } else if self.confidence_score >= 0.4 {
            RecommendedAction::ManualReview
        } else {
            RecommendedAction::Block
        });
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }

    pub fn apply_override(&mut self, operator: &str, new_decision: Decision, justification: &str) {
        self.overridden = true;
        self.override_by = operator.to_string();
        self.override_justification = justification.to_string();
        self.decision = new_decision;
        self.add_reason(format!("HUMAN OVERRIDE by {operator}: {justification}"));
    }

    /// Structured explanation payload for the `/explain` surface.
    pub fn explain(&self) -> Value {
        let mut result = json!({
            "id": self.intent_id,
            "decision": self.decision.as_str(),
            "confidence": format!("{:.1}%", self.confidence_score * 100.0),
            "uncertainty": format!("{:.3}", self.uncertainty),
            "recommended_action": self.recommended_action.map(|a| a.as_str()),
            "risk_level": self.risk_level().as_str(),
            "context": {
                "mode": self.mode_snapshot,
                "security_posture": self.security_posture,
                "performance_profile": self.performance_profile,
                "load_level": self.load_level,
                "qos_adjusted": self.qos_adjusted,
                "timestamp": self.timestamp,
                "reasons": self.reasons,
            },
            "metrics": {
                "semantic_risk": self.semantic_risk,
                "behavioral_risk": self.behavioral_risk,
                "actor_reputation": self.actor_reputation,
                "composite_risk": self.risk_score,
                "confidence_score": self.confidence_score,
            },
        });
        if self.overridden {
            result["override"] = json!({
                "by": self.override_by,
                "justification": self.override_justification,
            });
        }
        result
    }

    /// Serialize for audit-log storage (a flatter shape than `explain()`).
    pub fn to_dict(&self) -> Value {
        json!({
            "intent_id": self.intent_id,
            "timestamp": self.timestamp,
            "mode": self.mode_snapshot,
            "security_posture": self.security_posture,
            "performance_profile": self.performance_profile,
            "decision": self.decision.as_str(),
            "risk_score": self.risk_score,
            "confidence_score": self.confidence_score,
            "uncertainty": self.uncertainty,
            "recommended_action": self.recommended_action.map(|a| a.as_str()),
            "semantic_risk": self.semantic_risk,
            "behavioral_risk": self.behavioral_risk,
            "actor_reputation": self.actor_reputation,
            "load_level": self.load_level,
            "qos_adjusted": self.qos_adjusted,
            "overridden": self.overridden,
            "override_by": self.override_by,
            "reasons": self.reasons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_low_risk_recommends_safe_execution() {
        let mut trace = DecisionTrace::new("intent-1", 0.0);
        trace.semantic_risk = 0.0;
        trace.behavioral_risk = 0.0;
        trace.actor_reputation = 1.0;
        trace.compute_confidence(0.5, 0.3, 0.2, 1.0);
        assert_eq!(trace.recommended_action, Some(RecommendedAction::SafeExecution));
        assert!(trace.risk_score < 0.01);
    }

    #[test]
    fn high_risk_recommends_block() {
        let mut trace = DecisionTrace::new("intent-2", 0.0);
        trace.semantic_risk = 1.0;
        trace.behavioral_risk = 1.0;
        trace.actor_reputation = 0.0;
        trace.compute_confidence(0.5, 0.3, 0.2, 1.0);
        assert_eq!(trace.recommended_action, Some(RecommendedAction::Block));
        assert!((trace.risk_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn quorum_scales_confidence_down() {
        let mut trace = DecisionTrace::new("intent-3", 0.0);
        trace.semantic_risk = 0.0;
        trace.behavioral_risk = 0.0;
        trace.actor_reputation = 1.0;
        trace.compute_confidence(0.5, 0.3, 0.2, 0.5);
        assert!((trace.confidence_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn override_records_reason_and_decision() {
        let mut trace = DecisionTrace::new("intent-4", 0.0);
        trace.decision = Decision::Rejected;
        trace.apply_override("alice", Decision::Approved, "false positive confirmed");
        assert_eq!(trace.decision, Decision::Approved);
        assert!(trace.overridden);
        assert!(trace.reasons[0].contains("alice"));
    }

    #[test]
    fn explain_includes_override_block_only_when_overridden() {
        let mut trace = DecisionTrace::new("intent-5", 0.0);
        assert!(trace.explain().get("override").is_none());
        trace.apply_override("bob", Decision::Quarantined, "needs review");
        assert!(trace.explain().get("override").is_some());
    }
}
