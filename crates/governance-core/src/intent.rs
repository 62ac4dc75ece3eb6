//! The intent object submitted by clients for evaluation.
//!
//! Decision-path errors never throw: missing fields degrade to their
//! documented defaults (`fuel_estimate` absent = 0, `id` absent =
//! "unknown") rather than rejecting the request outright.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    #[serde(default = "default_id")]
    pub id: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub requires_admin: bool,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub fuel_estimate: u64,
    #[serde(default)]
    pub burst_count: u32,
    #[serde(default)]
    pub off_hours: bool,
}

fn default_id() -> String {
    "unknown".to_string()
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            id: default_id(),
            signature: None,
            action: String::new(),
            requires_admin: false,
            scope: None,
            priority: Priority::Normal,
            fuel_estimate: 0,
            burst_count: 0,
            off_hours: false,
        }
    }
}

impl Intent {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Fallback semantic-risk heuristic, used when no real SSAI score is
    /// available: starts at 0.0, adds 0.5 for a destructive-sounding
    /// action, 0.2 for admin intents, 0.1 when scope is unset.
    pub fn semantic_risk_heuristic(&self) -> f64 {
        const DESTRUCTIVE: [&str; 5] = ["delete", "drop", "kill", "override", "bypass"];
        let mut risk: f64 = 0.0;
        let action_lower = self.action.to_ascii_lowercase();
        if DESTRUCTIVE.iter().any(|d| action_lower == *d) {
            risk += 0.5;
        }
        if self.requires_admin {
            risk += 0.2;
        }
        if self.scope.is_none() {
            risk += 0.1;
        }
        risk.clamp(0.0, 1.0)
    }

    /// Fallback behavioral-risk heuristic: bursty or off-hours activity
    /// nudges risk up.
    pub fn behavioral_risk_heuristic(&self) -> f64 {
        let mut risk: f64 = 0.0;
        if self.burst_count > 10 {
            risk += 0.4;
        }
        if self.off_hours {
            risk += 0.2;
        }
        risk.clamp(0.0, 1.0)
    }
}
