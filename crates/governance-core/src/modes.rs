//! Operational modes, security postures, and performance profiles.
//!
//! Three independent axes of system behavior:
//!   - [`OperationalMode`]: what the system *does* (dev/prod/paranoid/forensic)
//!   - [`SecurityPosture`]: how *defensive* the system is (open -> lockdown)
//!   - [`PerformanceProfile`]: how *fast* vs *thorough* (eco -> turbo)
//!
//! They combine independently: `PRODUCTION + HARDENED + ECO` is a
//! low-power secure server; `DEVELOPMENT + OPEN + TURBO` is a local
//! dev box. Security and performance presets are looked up at decision
//! time, not baked into the `Policy` snapshot at load time — see
//! [`SecurityPosture::overrides`] and [`PerformanceProfile::preset`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalMode {
    Development,
    Production,
    Paranoid,
    Forensic,
}

impl OperationalMode {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            "paranoid" => Some(Self::Paranoid),
            "forensic" => Some(Self::Forensic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Paranoid => "paranoid",
            Self::Forensic => "forensic",
        }
    }

    /// Baseline mode preset. Individual fields may still be overridden
    /// by the policy file; this only fills in what the file omits.
    pub fn preset(&self) -> ModePreset {
        match self {
            Self::Development => ModePreset {
                ssai_threshold: 0.4,
                quorum_ratio: 0.51,
                consensus_timeout_ms: 5000,
                max_fuel_per_intent: 1_000_000,
                p2p_rate_limit: 1000,
                require_signed_intents: false,
                sandbox_strictness: "soft",
            },
            Self::Production => ModePreset {
                ssai_threshold: 0.6,
                quorum_ratio: 0.67,
                consensus_timeout_ms: 3000,
                max_fuel_per_intent: 500_000,
                p2p_rate_limit: 100,
                require_signed_intents: true,
                sandbox_strictness: "hard",
            },
            Self::Paranoid => ModePreset {
                ssai_threshold: 0.85,
                quorum_ratio: 0.90,
                consensus_timeout_ms: 2000,
                max_fuel_per_intent: 50_000,
                p2p_rate_limit: 10,
                require_signed_intents: true,
                sandbox_strictness: "vm",
            },
            Self::Forensic => ModePreset {
                ssai_threshold: 0.95,
                quorum_ratio: 1.0,
                consensus_timeout_ms: 10000,
                max_fuel_per_intent: 0,
                p2p_rate_limit: 5,
                require_signed_intents: true,
                sandbox_strictness: "vm",
            },
        }
    }
}

/// Per-mode baseline values a freshly-built [`crate::policy::Policy`] falls
/// back to for any field the config file leaves unspecified.
#[derive(Debug, Clone, Copy)]
pub struct ModePreset {
    pub ssai_threshold: f64,
    pub quorum_ratio: f64,
    pub consensus_timeout_ms: u64,
    pub max_fuel_per_intent: u64,
    pub p2p_rate_limit: u32,
    pub require_signed_intents: bool,
    pub sandbox_strictness: &'static str,
}

/// Independent security axis, reshuffled at decision time, not at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityPosture {
    Open,
    Guarded,
    Hardened,
    Lockdown,
}

impl SecurityPosture {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Some(Self::Open),
            "guarded" => Some(Self::Guarded),
            "hardened" => Some(Self::Hardened),
            "lockdown" => Some(Self::Lockdown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Guarded => "guarded",
            Self::Hardened => "hardened",
            Self::Lockdown => "lockdown",
        }
    }

    /// Security-related overrides applied at evaluation time, on top of
    /// whatever the loaded `Policy` says. This is what lets an operator
    /// flip posture without touching the policy file.
    pub fn overrides(&self) -> SecurityOverrides {
        match self {
            Self::Open => SecurityOverrides {
                require_signed_intents: false,
                min_reputation: 0.0,
                sandbox_strictness: "soft",
            },
            Self::Guarded => SecurityOverrides {
                require_signed_intents: true,
                min_reputation: 0.2,
                sandbox_strictness: "hard",
            },
            Self::Hardened => SecurityOverrides {
                require_signed_intents: true,
                min_reputation: 0.4,
                sandbox_strictness: "hard",
            },
            Self::Lockdown => SecurityOverrides {
                require_signed_intents: true,
                min_reputation: 0.6,
                sandbox_strictness: "vm",
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SecurityOverrides {
    pub require_signed_intents: bool,
    pub min_reputation: f64,
    pub sandbox_strictness: &'static str,
}

/// CPU/AI speed axis: depth vs throughput tradeoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceProfile {
    Eco,
    Balanced,
    Turbo,
}

impl PerformanceProfile {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eco" => Some(Self::Eco),
            "balanced" => Some(Self::Balanced),
            "turbo" => Some(Self::Turbo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eco => "eco",
            Self::Balanced => "balanced",
            Self::Turbo => "turbo",
        }
    }

    pub fn preset(&self) -> PerformancePreset {
        match self {
            Self::Eco => PerformancePreset {
                cognitive_speed: 0.5,
                ssai_depth: "shallow",
                fuel_multiplier: 0.5,
                consensus_timeout_ms: 4000,
                log_verbosity: "error",
            },
            Self::Balanced => PerformancePreset {
                cognitive_speed: 1.0,
                ssai_depth: "normal",
                fuel_multiplier: 1.0,
                consensus_timeout_ms: 2500,
                log_verbosity: "info",
            },
            Self::Turbo => PerformancePreset {
                cognitive_speed: 2.0,
                ssai_depth: "deep",
                fuel_multiplier: 2.0,
                consensus_timeout_ms: 1500,
                log_verbosity: "debug",
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerformancePreset {
    pub cognitive_speed: f64,
    pub ssai_depth: &'static str,
    pub fuel_multiplier: f64,
    pub consensus_timeout_ms: u64,
    pub log_verbosity: &'static str,
}

/// Named risk bands used only for human-readable labeling in `explain()`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum RiskLevel {
    Negligible,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.875 {
            Self::Critical
        } else if score >= 0.625 {
            Self::High
        } else if score >= 0.375 {
            Self::Medium
        } else if score >= 0.125 {
            Self::Low
        } else {
            Self::Negligible
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_loose_parse() {
        for m in [
            OperationalMode::Development,
            OperationalMode::Production,
            OperationalMode::Paranoid,
            OperationalMode::Forensic,
        ] {
            assert_eq!(OperationalMode::from_str_loose(m.as_str()), Some(m));
        }
    }

    #[test]
    fn unknown_mode_is_none() {
        assert_eq!(OperationalMode::from_str_loose("bogus"), None);
    }

    #[test]
    fn risk_level_bands_cover_unit_interval() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Negligible);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(0.5), RiskLevel::Medium);
    }

    #[test]
    fn posture_overrides_are_monotonically_stricter() {
        let open = SecurityPosture::Open.overrides();
        let lockdown = SecurityPosture::Lockdown.overrides();
        assert!(open.min_reputation < lockdown.min_reputation);
        assert!(!open.require_signed_intents);
        assert!(lockdown.require_signed_intents);
    }
}
