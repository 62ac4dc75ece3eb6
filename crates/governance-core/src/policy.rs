//! [`Policy`] — the immutable, typed snapshot of every tunable threshold.
//!
//! Eliminates magic numbers from the decision pipeline. A `Policy` is
//! built once per reload from a mode preset plus file overrides, never
//! mutated in place, and swapped atomically into the engine (see
//! [`crate::engine::GovernanceEngine::reload_policy`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GovernanceError, Result};
use crate::modes::OperationalMode;

const WEIGHT_EPSILON: f64 = 1e-6;

/// Raw shape of the YAML policy file. Every field is optional; anything
/// left out falls back to the active [`OperationalMode`]'s preset.
/// Unknown keys are ignored by `serde_yaml` by default.
#[derive(Debug, Default, Deserialize)]
struct RawPolicyFile {
    mode: Option<String>,
    security_posture: Option<String>,
    performance_profile: Option<String>,

    cognitive_speed: Option<f64>,
    ssai_threshold: Option<f64>,
    quorum_ratio: Option<f64>,
    consensus_timeout_ms: Option<u64>,
    max_fuel_per_intent: Option<u64>,
    p2p_rate_limit: Option<u32>,
    min_reputation: Option<f64>,
    max_parallel_intents: Option<u32>,
    queue_backpressure_threshold: Option<u32>,
    risk_weight_semantic: Option<f64>,
    risk_weight_behavioral: Option<f64>,
    risk_weight_reputation: Option<f64>,

    ssai_depth: Option<String>,
    sandbox_strictness: Option<String>,

    require_signed_intents: Option<bool>,
    adaptive_throttling: Option<bool>,
    allow_manual_override: Option<bool>,
}

/// Immutable policy snapshot. All numeric fields are finite; ratios lie
/// in `[0, 1]`; `risk_weight_semantic + risk_weight_behavioral +
/// risk_weight_reputation` sums to `1.0` within [`WEIGHT_EPSILON`].
///
/// `security_posture` and `performance_profile` are carried here as the
/// *baseline* axis values but are re-looked-up against their preset
/// tables at decision time (see [`crate::modes::SecurityPosture::overrides`]);
/// the policy's own `require_signed_intents`/`min_reputation`/
/// `sandbox_strictness` fields are the mode-level fallback, not the
/// effective value used in `evaluate_intent`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub mode: OperationalMode,
    pub security_posture: crate::modes::SecurityPosture,
    pub performance_profile: crate::modes::PerformanceProfile,

    pub cognitive_speed: f64,
    pub ssai_threshold: f64,
    pub quorum_ratio: f64,
    pub consensus_timeout_ms: u64,
    pub max_fuel_per_intent: u64,
    pub p2p_rate_limit: u32,
    pub require_signed_intents: bool,
    pub sandbox_strictness: String,
    pub min_reputation: f64,
    pub max_parallel_intents: u32,
    pub queue_backpressure_threshold: u32,
    pub adaptive_throttling: bool,
    pub allow_manual_override: bool,

    pub risk_weight_semantic: f64,
    pub risk_weight_behavioral: f64,
    pub risk_weight_reputation: f64,

    pub ssai_depth: String,
}

impl Policy {
    /// Default policy for a mode, no file overrides applied.
    pub fn default_for_mode(mode: OperationalMode) -> Self {
        let preset = mode.preset();
        let perf = crate::modes::PerformanceProfile::Balanced.preset();
        Self {
            mode,
            security_posture: crate::modes::SecurityPosture::Guarded,
            performance_profile: crate::modes::PerformanceProfile::Balanced,
            cognitive_speed: perf.cognitive_speed,
            ssai_threshold: preset.ssai_threshold,
            quorum_ratio: preset.quorum_ratio,
            consensus_timeout_ms: preset.consensus_timeout_ms,
            max_fuel_per_intent: preset.max_fuel_per_intent,
            p2p_rate_limit: preset.p2p_rate_limit,
            require_signed_intents: preset.require_signed_intents,
            sandbox_strictness: preset.sandbox_strictness.to_string(),
            min_reputation: 0.2,
            max_parallel_intents: 64,
            queue_backpressure_threshold: 100,
            adaptive_throttling: true,
            allow_manual_override: true,
            risk_weight_semantic: 0.5,
            risk_weight_behavioral: 0.3,
            risk_weight_reputation: 0.2,
            ssai_depth: perf.ssai_depth.to_string(),
        }
    }

    /// Parse a policy from YAML bytes. Unknown keys are ignored; unknown
    /// enum values fall back to the mode default (caller logs the error).
    pub fn from_yaml_str(raw: &str) -> Result<(Self, Option<String>)> {
        let data: RawPolicyFile = serde_yaml::from_str(raw)?;

        let mode = match &data.mode {
            Some(m) => match OperationalMode::from_str_loose(m) {
                Some(mode) => mode,
                None => {
                    tracing::error!(target: "governance_core::policy", mode = %m, "unknown mode in policy file, falling back to default");
                    OperationalMode::Production
                }
            },
            None => OperationalMode::Production,
        };

        let mut invalid_enum: Option<String> = None;
        let security_posture = data
            .security_posture
            .as_deref()
            .and_then(|s| {
                crate::modes::SecurityPosture::from_str_loose(s).or_else(|| {
                    invalid_enum = Some(format!("security_posture='{s}'"));
                    None
                })
            })
            .unwrap_or(crate::modes::SecurityPosture::Guarded);
        let performance_profile = data
            .performance_profile
            .as_deref()
            .and_then(|s| {
                crate::modes::PerformanceProfile::from_str_loose(s).or_else(|| {
                    invalid_enum = Some(format!("performance_profile='{s}'"));
                    None
                })
            })
            .unwrap_or(crate::modes::PerformanceProfile::Balanced);
        if let Some(bad) = invalid_enum {
            tracing::error!(target: "governance_core::policy", %bad, "unknown enum value in policy file, using default");
        }

        let defaults = Self::default_for_mode(mode);
        let perf_preset = performance_profile.preset();

        let policy = Self {
            mode,
            security_posture,
            performance_profile,
            cognitive_speed: data.cognitive_speed.unwrap_or(perf_preset.cognitive_speed),
            ssai_threshold: data.ssai_threshold.unwrap_or(defaults.ssai_threshold),
            quorum_ratio: data.quorum_ratio.unwrap_or(defaults.quorum_ratio),
            consensus_timeout_ms: data
                .consensus_timeout_ms
                .unwrap_or(perf_preset.consensus_timeout_ms),
            max_fuel_per_intent: data
                .max_fuel_per_intent
                .unwrap_or(defaults.max_fuel_per_intent),
            p2p_rate_limit: data.p2p_rate_limit.unwrap_or(defaults.p2p_rate_limit),
            require_signed_intents: data
                .require_signed_intents
                .unwrap_or(defaults.require_signed_intents),
            sandbox_strictness: data
                .sandbox_strictness
                .unwrap_or(defaults.sandbox_strictness),
            min_reputation: data.min_reputation.unwrap_or(defaults.min_reputation),
            max_parallel_intents: data
                .max_parallel_intents
                .unwrap_or(defaults.max_parallel_intents),
            queue_backpressure_threshold: data
                .queue_backpressure_threshold
                .unwrap_or(defaults.queue_backpressure_threshold),
            adaptive_throttling: data.adaptive_throttling.unwrap_or(defaults.adaptive_throttling),
            allow_manual_override: data
                .allow_manual_override
                .unwrap_or(defaults.allow_manual_override),
            risk_weight_semantic: data
                .risk_weight_semantic
                .unwrap_or(defaults.risk_weight_semantic),
            risk_weight_behavioral: data
                .risk_weight_behavioral
                .unwrap_or(defaults.risk_weight_behavioral),
            risk_weight_reputation: data
                .risk_weight_reputation
                .unwrap_or(defaults.risk_weight_reputation),
            ssai_depth: data.ssai_depth.unwrap_or_else(|| perf_preset.ssai_depth.to_string()),
        };

        if let Err(e) = policy.validate() {
            tracing::error!(target: "governance_core::policy", error = %e, "policy file produced an invalid policy, keeping previous policy in effect");
            return Err(e);
        }

        Ok((policy, None))
    }

    /// Load from disk. Returns `Ok(None)` (not an error) if the file does
    /// not exist, matching `reload_policy`'s "missing file keeps current
    /// policy" contract.
    pub fn load_from_path(path: &Path) -> Result<Option<(Self, String, String)>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path).map_err(|source| GovernanceError::PolicyFileRead {
            path: path.display().to_string(),
            source,
        })?;
        let hash = crate::audit::sha256_hex(raw.as_bytes());
        let (policy, _) = Self::from_yaml_str(&raw)?;
        Ok(Some((policy, raw, hash)))
    }

    /// Validate the invariants spec.md §3 requires of any `Policy`.
    pub fn validate(&self) -> Result<()> {
        let finite_ratio = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !finite_ratio(self.ssai_threshold)
            || !finite_ratio(self.quorum_ratio)
            || !finite_ratio(self.min_reputation)
            || !finite_ratio(self.risk_weight_semantic)
            || !finite_ratio(self.risk_weight_behavioral)
            || !finite_ratio(self.risk_weight_reputation)
        {
            return Err(GovernanceError::InvalidWeights(f64::NAN));
        }
        let sum = self.risk_weight_semantic + self.risk_weight_behavioral + self.risk_weight_reputation;
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(GovernanceError::InvalidWeights(sum));
        }
        if !self.cognitive_speed.is_finite() {
            return Err(GovernanceError::InvalidWeights(self.cognitive_speed));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_for_every_mode() {
        for mode in [
            OperationalMode::Development,
            OperationalMode::Production,
            OperationalMode::Paranoid,
            OperationalMode::Forensic,
        ] {
            Policy::default_for_mode(mode)
                .validate()
                .expect("default policy must satisfy its own invariants");
        }
    }

    #[test]
    fn unspecified_fields_fall_back_to_mode_preset() {
        let (policy, _) = Policy::from_yaml_str("mode: paranoid\n").unwrap();
        assert_eq!(policy.mode, OperationalMode::Paranoid);
        assert_eq!(policy.max_fuel_per_intent, 50_000);
        assert_eq!(policy.quorum_ratio, 0.90);
    }

    #[test]
    fn overrides_replace_individual_fields() {
        let (policy, _) = Policy::from_yaml_str(
            "mode: production\nmax_fuel_per_intent: 7\nunknown_key: true\n",
        )
        .unwrap();
        assert_eq!(policy.max_fuel_per_intent, 7);
        assert_eq!(policy.mode, OperationalMode::Production);
    }

    #[test]
    fn unknown_mode_falls_back_to_production_default() {
        let (policy, _) = Policy::from_yaml_str("mode: quantum\n").unwrap();
        assert_eq!(policy.mode, OperationalMode::Production);
    }

    #[test]
    fn bad_weights_are_rejected() {
        let result = Policy::from_yaml_str(
            "risk_weight_semantic: 0.9\nrisk_weight_behavioral: 0.9\nrisk_weight_reputation: 0.9\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let loaded = Policy::load_from_path(&missing).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn reload_is_idempotent_on_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(&path, "mode: production\n").unwrap();
        let (p1, _, h1) = Policy::load_from_path(&path).unwrap().unwrap();
        let (p2, _, h2) = Policy::load_from_path(&path).unwrap().unwrap();
        assert_eq!(p1, p2);
        assert_eq!(h1, h2);
    }
}
