//! Runtime Governance Engine — core library.
//!
//! This crate implements the decision pipeline and its four coupled
//! subsystems: the adaptive QoS controller, the per-subsystem circuit
//! breaker registry, the tamper-evident audit chain, and the telemetry
//! feedback loop, plus the panic switch that sits above all of them.
//!
//! Everything here is synchronous: the decision path never awaits on
//! I/O beyond a file stat (the panic switch) and an append to the
//! audit log. Callers decide how to schedule concurrent evaluations.

pub mod audit;
pub mod breaker;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod intent;
pub mod metrics;
pub mod modes;
pub mod panic_switch;
pub mod policy;
pub mod qos;
pub mod trace;

pub use engine::{EngineConfig, GovernanceEngine};
pub use error::GovernanceError;
pub use intent::Intent;
pub use modes::{OperationalMode, PerformanceProfile, SecurityPosture};
pub use policy::Policy;
pub use trace::{Decision, DecisionTrace};
