//! Intent submission, override, and explanation endpoints — the HTTP
//! front door onto `GovernanceEngine::evaluate`/`manual_override`.

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use governance_core::intent::{Intent, Priority};
use governance_core::trace::Decision;

use super::handlers::ErrorResponse;
use super::AppState;

/// Intent submitted for evaluation. Mirrors `governance_core::Intent`
/// field-for-field so the wire schema is documented independently of
/// the core crate (which stays free of a web-framework dependency).
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    pub action: String,
    #[serde(default)]
    pub requires_admin: bool,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub fuel_estimate: u64,
    #[serde(default)]
    pub burst_count: u32,
    #[serde(default)]
    pub off_hours: bool,
    /// Reputation score in `[0, 1]` for the submitting actor.
    pub actor_reputation: f64,
}

impl IntentRequest {
    fn into_intent(self) -> Intent {
        let priority = match self.priority.as_deref() {
            Some("low") => Priority::Low,
            Some("high") => Priority::High,
            _ => Priority::Normal,
        };
        Intent {
            id: self.id.unwrap_or_else(|| "unknown".to_string()),
            signature: self.signature,
            action: self.action,
            requires_admin: self.requires_admin,
            scope: self.scope,
            priority,
            fuel_estimate: self.fuel_estimate,
            burst_count: self.burst_count,
            off_hours: self.off_hours,
        }
    }
}

/// A human override of a previously-issued decision.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OverrideRequest {
    pub operator: String,
    pub decision: String,
    pub justification: String,
}

fn parse_decision(s: &str) -> Option<Decision> {
    match s.to_ascii_uppercase().as_str() {
        "APPROVED" => Some(Decision::Approved),
        "REJECTED" => Some(Decision::Rejected),
        "QUARANTINED" => Some(Decision::Quarantined),
        _ => None,
    }
}

/// Submit an intent for evaluation. Returns the decision trace's
/// `explain()` payload and records a latency/rejection observation for
/// the feedback loop.
#[utoipa::path(
    post,
    path = "/api/v1/intents",
    request_body = IntentRequest,
    responses(
        (status = 200, description = "Decision trace", body = serde_json::Value)
    ),
    tag = "intents"
)]
pub async fn submit_intent(
    State(__appstate): State<AppState>,
    Json(req): Json<IntentRequest>,
) -> Json<serde_json::Value> {
    let (engine, traces, _) = __appstate;
    let actor_reputation = req.actor_reputation;
    let intent = req.into_intent();

    let started = Instant::now();
    let trace = engine.evaluate(&intent, actor_reputation);
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    engine.observe_outcome(latency_ms, trace.decision == Decision::Rejected);

    let explanation = trace.explain();
    traces.insert(trace);
    Json(explanation)
}

/// Look up a previously-issued decision's explanation by intent id.
#[utoipa::path(
    get,
    path = "/api/v1/intents/{id}/explain",
    params(("id" = String, Path, description = "Intent id")),
    responses(
        (status = 200, description = "Decision explanation", body = serde_json::Value),
        (status = 404, description = "No such intent", body = ErrorResponse)
    ),
    tag = "intents"
)]
pub async fn explain_intent(
    State(__appstate): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let (_, traces, _) = __appstate;
    traces
        .get(&id)
        .map(|t| Json(t.explain()))
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(ErrorResponse::new(StatusCode::NOT_FOUND, format!("no decision trace for intent '{id}'")))))
}

/// Apply a human override to a previously-issued decision.
#[utoipa::path(
    post,
    path = "/api/v1/intents/{id}/override",
    params(("id" = String, Path, description = "Intent id")),
    request_body = OverrideRequest,
    responses(
        (status = 200, description = "Override applied", body = serde_json::Value),
        (status = 400, description = "Unknown decision value", body = ErrorResponse),
        (status = 403, description = "Manual overrides disabled by policy", body = ErrorResponse),
        (status = 404, description = "No such intent", body = ErrorResponse)
    ),
    tag = "intents"
)]
pub async fn override_intent(
    State(__appstate): State<AppState>,
    axum::extract::Path(id): axum::extract::Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let (engine, traces, _) = __appstate;
    let Some(mut trace) = traces.get(&id) else {
        return Err((StatusCode::NOT_FOUND, Json(ErrorResponse::new(StatusCode::NOT_FOUND, format!("no decision trace for intent '{id}'")))));
    };
    let Some(decision) = parse_decision(&req.decision) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(StatusCode::BAD_REQUEST, format!("unknown decision '{}'", req.decision))),
        ));
    };

    let applied = engine.manual_override(&mut trace, &req.operator, decision, &req.justification);
    if !applied {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(StatusCode::FORBIDDEN, "manual overrides are disabled by the active policy")),
        ));
    }

    let explanation = trace.explain();
    traces.insert(trace);
    Ok(Json(explanation))
}
