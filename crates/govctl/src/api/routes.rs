//! API routing

use super::{governance_handlers, handlers, intent_handlers, middleware};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::get_config,
        intent_handlers::submit_intent,
        intent_handlers::explain_intent,
        intent_handlers::override_intent,
        governance_handlers::status,
        governance_handlers::sla,
        governance_handlers::reload_policy,
        governance_handlers::get_policy,
        governance_handlers::panic_activate,
        governance_handlers::panic_deactivate,
        governance_handlers::panic_status,
        governance_handlers::submit_metrics,
        governance_handlers::audit_tail,
        governance_handlers::audit_verify,
    ),
    components(
        schemas(
            crate::config::DaemonConfig,
            handlers::ErrorResponse,
            handlers::SuccessResponse,
            handlers::HealthResponse,
            intent_handlers::IntentRequest,
            intent_handlers::OverrideRequest,
            governance_handlers::PanicActivateRequest,
            governance_handlers::PanicDeactivateRequest,
            governance_handlers::SystemMetricsRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "config", description = "Daemon configuration"),
        (name = "intents", description = "Intent submission, explanation, and human override"),
        (name = "governance", description = "Policy and engine status"),
        (name = "panic", description = "Emergency panic switch"),
        (name = "metrics", description = "System load feed and adaptive QoS"),
        (name = "audit", description = "Tamper-evident audit chain")
    ),
    info(
        title = "Runtime Governance Daemon (govctl)",
        version = "0.1.0",
        description = "REST API around the runtime governance engine",
    )
)]
pub struct ApiDoc;

/// Build the daemon's router.
pub fn create_router(state: AppState) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/config", get(handlers::get_config))
        .route("/api/v1/intents", post(intent_handlers::submit_intent))
        .route("/api/v1/intents/:id/explain", get(intent_handlers::explain_intent))
        .route("/api/v1/intents/:id/override", post(intent_handlers::override_intent))
        .route("/api/v1/status", get(governance_handlers::status))
        .route("/api/v1/sla", get(governance_handlers::sla))
        .route("/api/v1/policy", get(governance_handlers::get_policy))
        .route("/api/v1/policy/reload", post(governance_handlers::reload_policy))
        .route("/api/v1/panic", get(governance_handlers::panic_status).post(governance_handlers::panic_activate))
        .route("/api/v1/panic/clear", post(governance_handlers::panic_deactivate))
        .route("/api/v1/metrics", post(governance_handlers::submit_metrics))
        .route("/api/v1/audit", get(governance_handlers::audit_tail))
        .route("/api/v1/audit/verify", get(governance_handlers::audit_verify))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
