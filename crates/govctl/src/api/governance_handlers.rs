//! Policy, status, panic switch, metrics feed, and audit-log endpoints.

use axum::{extract::Query, extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use governance_core::qos::SystemMetrics;

use super::handlers::SuccessResponse;
use super::AppState;

/// Engine status snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses((status = 200, description = "Engine status", body = serde_json::Value)),
    tag = "governance"
)]
pub async fn status(State(__appstate): State<AppState>) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    Json(engine.status())
}

/// SLA health snapshot, derived from the same metrics feeding the
/// feedback loop. Not consulted by the decision pipeline itself.
#[utoipa::path(
    get,
    path = "/api/v1/sla",
    responses((status = 200, description = "SLA report", body = serde_json::Value)),
    tag = "governance"
)]
pub async fn sla(State(__appstate): State<AppState>) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    Json(engine.sla_report())
}

/// Hot-reload the policy file from disk.
#[utoipa::path(
    post,
    path = "/api/v1/policy/reload",
    responses(
        (status = 200, description = "Reload result", body = SuccessResponse),
        (status = 304, description = "Policy unchanged or invalid, previous policy kept")
    ),
    tag = "governance"
)]
pub async fn reload_policy(State(__appstate): State<AppState>) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    let applied = engine.reload_policy();
    Json(serde_json::json!({ "applied": applied }))
}

/// Current effective policy snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/policy",
    responses((status = 200, description = "Current policy", body = serde_json::Value)),
    tag = "governance"
)]
pub async fn get_policy(State(__appstate): State<AppState>) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    Json(serde_json::to_value(&*engine.policy()).unwrap_or(serde_json::Value::Null))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PanicActivateRequest {
    pub reason: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "api".to_string()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PanicDeactivateRequest {
    pub operator: String,
}

/// Activate the panic switch, forcing FORENSIC-like rejection of every
/// new intent until cleared.
#[utoipa::path(
    post,
    path = "/api/v1/panic",
    request_body = PanicActivateRequest,
    responses((status = 200, description = "Panic activated", body = SuccessResponse)),
    tag = "panic"
)]
pub async fn panic_activate(
    State(__appstate): State<AppState>,
    Json(req): Json<PanicActivateRequest>,
) -> Json<SuccessResponse> {
    let (engine, _, _) = __appstate;
    engine.activate_panic(&req.reason, &req.source);
    Json(SuccessResponse::new("panic activated"))
}

/// Clear the panic switch.
#[utoipa::path(
    post,
    path = "/api/v1/panic/clear",
    request_body = PanicDeactivateRequest,
    responses((status = 200, description = "Panic cleared", body = SuccessResponse)),
    tag = "panic"
)]
pub async fn panic_deactivate(
    State(__appstate): State<AppState>,
    Json(req): Json<PanicDeactivateRequest>,
) -> Json<SuccessResponse> {
    let (engine, _, _) = __appstate;
    engine.deactivate_panic(&req.operator);
    Json(SuccessResponse::new("panic cleared"))
}

/// Whether the panic switch is currently active.
#[utoipa::path(
    get,
    path = "/api/v1/panic",
    responses((status = 200, description = "Panic state", body = serde_json::Value)),
    tag = "panic"
)]
pub async fn panic_status(State(__appstate): State<AppState>) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    Json(serde_json::json!({ "active": engine.is_panic_active() }))
}

/// System-load sample fed into the adaptive QoS controller.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SystemMetricsRequest {
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub memory_usage: f64,
    #[serde(default)]
    pub queue_depth: u64,
    #[serde(default)]
    pub avg_latency_ms: f64,
    #[serde(default)]
    pub error_rate: f64,
    #[serde(default)]
    pub p2p_packet_loss: f64,
}

/// Feed a system-load sample, returning the QoS adjustment it produced.
#[utoipa::path(
    post,
    path = "/api/v1/metrics",
    request_body = SystemMetricsRequest,
    responses((status = 200, description = "QoS adjustment", body = serde_json::Value)),
    tag = "metrics"
)]
pub async fn submit_metrics(
    State(__appstate): State<AppState>,
    Json(req): Json<SystemMetricsRequest>,
) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    engine.set_gauge("cpu_usage", req.cpu_usage);
    let adjustment = engine.update_qos(SystemMetrics {
        cpu_usage: req.cpu_usage,
        memory_usage: req.memory_usage,
        queue_depth: req.queue_depth,
        avg_latency_ms: req.avg_latency_ms,
        error_rate: req.error_rate,
        p2p_packet_loss: req.p2p_packet_loss,
        timestamp: 0.0,
    });
    Json(serde_json::json!({
        "speed_multiplier": adjustment.speed_multiplier,
        "fuel_multiplier": adjustment.fuel_multiplier,
        "rate_limit_multiplier": adjustment.rate_limit_multiplier,
        "shed_low_priority": adjustment.shed_low_priority,
        "load_level": adjustment.load_level.as_str(),
        "reasons": adjustment.reasons,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_last")]
    pub last: usize,
}

fn default_last() -> usize {
    100
}

/// Tail the audit chain.
#[utoipa::path(
    get,
    path = "/api/v1/audit",
    params(("last" = Option<usize>, Query, description = "Number of most recent entries to return, default 100")),
    responses((status = 200, description = "Audit entries", body = serde_json::Value)),
    tag = "audit"
)]
pub async fn audit_tail(State(__appstate): State<AppState>, Query(q): Query<AuditQuery>) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    let entries = engine.audit_entries(q.last);
    Json(serde_json::to_value(entries).unwrap_or(serde_json::Value::Null))
}

/// Re-verify the audit hash chain end to end.
#[utoipa::path(
    get,
    path = "/api/v1/audit/verify",
    responses((status = 200, description = "Chain verification result", body = serde_json::Value)),
    tag = "audit"
)]
pub async fn audit_verify(State(__appstate): State<AppState>) -> Json<serde_json::Value> {
    let (engine, _, _) = __appstate;
    let (ok, bad_index) = engine.audit_verify();
    Json(serde_json::json!({ "ok": ok, "first_bad_index": bad_index }))
}
