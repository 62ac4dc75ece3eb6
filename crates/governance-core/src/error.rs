//! Error types for the governance core.
//!
//! Per the decision-path error policy: none of these ever escape
//! [`crate::engine::GovernanceEngine::evaluate_intent`]. They surface only
//! from operations that are explicitly fallible at the API boundary
//! (`reload_policy` returns `bool`, `AuditChain::append` logs and
//! continues). This enum exists so the fallible internals can use `?`
//! instead of threading `Option`/bespoke sentinels through every layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("policy file not found at {0}")]
    PolicyFileMissing(String),

    #[error("failed to read policy file {path}: {source}")]
    PolicyFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("policy file is not a valid YAML mapping")]
    PolicyNotAMapping,

    #[error("failed to parse policy YAML: {0}")]
    PolicyParse(#[from] serde_yaml::Error),

    #[error("unknown operational mode '{0}'")]
    UnknownMode(String),

    #[error("policy weights must sum to 1.0 within epsilon, got {0}")]
    InvalidWeights(f64),

    #[error("audit log I/O error: {0}")]
    AuditIo(#[from] std::io::Error),

    #[error("audit record failed to serialize: {0}")]
    AuditSerialize(#[from] serde_json::Error),

    #[error("audit record at sequence {0} failed to deserialize: {1}")]
    AuditDecode(u64, serde_json::Error),

    #[error("audit chain integrity check failed at entry {0}")]
    AuditTamper(u64),
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
