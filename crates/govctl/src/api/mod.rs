//! REST API surface around a shared [`governance_core::GovernanceEngine`].

pub mod governance_handlers;
pub mod handlers;
pub mod intent_handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::create_router;

use std::sync::Arc;

use crate::config::DaemonConfig;
use governance_core::GovernanceEngine;
use state::TraceStore;

/// Shared handler state: the engine, the recent-decisions cache, and the
/// daemon's own configuration (for the `/config` endpoint).
pub type AppState = (Arc<GovernanceEngine>, Arc<TraceStore>, Arc<DaemonConfig>);
