//! Runtime Governance Daemon (govctl)
//!
//! Standalone service that owns one `GovernanceEngine` and exposes its
//! operations over REST:
//! - Intent submission, explanation, and human override
//! - Policy hot-reload and status
//! - The panic switch
//! - A system-load feed driving the adaptive QoS controller
//! - The tamper-evident audit chain
//!
//! Default bind: 127.0.0.1:8871

mod api;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::state::TraceStore;
use config::DaemonConfig;
use governance_core::GovernanceEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,govctl=debug,governance_core=debug")))
        .init();

    info!("Starting Runtime Governance Daemon (govctl)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = DaemonConfig::from_env();
    let bind_addr = config.bind_addr.parse::<std::net::SocketAddr>()?;

    let engine = Arc::new(GovernanceEngine::new(config.engine_config())?);
    let traces = Arc::new(TraceStore::default());
    let config = Arc::new(config);

    spawn_feedback_tick(Arc::clone(&engine), config.feedback_tick());

    let app = api::create_router((Arc::clone(&engine), traces, Arc::clone(&config)));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("govctl listening on http://{}", bind_addr);
    info!("Swagger UI: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Background task driving the feedback loop and the panic switch's
/// file-trigger/auto-clear polling. `GovernanceEngine::is_panic_active`
/// already refreshes the file trigger on every call, so this tick's
/// periodic `is_panic_active` call is what keeps the panic state fresh
/// between intent submissions during quiet periods. CPU usage comes
/// from the last sample `/api/v1/metrics` recorded, defaulting to 0.0
/// before any sample has arrived.
fn spawn_feedback_tick(engine: Arc<GovernanceEngine>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            engine.is_panic_active();
            let cpu_usage = engine.get_gauge("cpu_usage");
            if let Some(action) = engine.feedback_tick(cpu_usage) {
                tracing::info!(target: "govctl::feedback_tick", action = action.name, reason = %action.reason, "feedback action applied");
            }
        }
    });
}
