//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use hookwire_core::config::HookwireConfig;
use hookwire_engine::{Dispatcher, PollScheduler, WorkflowRegistry};

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub config: HookwireConfig,
    /// Workflow definitions, persisted to workflows.json.
    pub registry: Arc<tokio::sync::Mutex<WorkflowRegistry>>,
    /// Poll loops for the scheduled workflows.
    pub scheduler: Arc<PollScheduler>,
    /// Action routing table shared with the scheduler.
    pub dispatcher: Arc<Dispatcher>,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    let api = Router::new()
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/workflows", get(super::routes::list_workflows))
        .route("/api/v1/workflows", post(super::routes::create_workflow))
        .route(
            "/api/v1/workflows/{id}",
            get(super::routes::get_workflow),
        )
        .route(
            "/api/v1/workflows/{id}",
            axum::routing::delete(super::routes::delete_workflow),
        )
        .route(
            "/api/v1/workflows/{id}/enable",
            post(super::routes::enable_workflow),
        )
        .route(
            "/api/v1/workflows/{id}/disable",
            post(super::routes::disable_workflow),
        )
        .route("/api/v1/dispatch", post(super::routes::manual_dispatch))
        .route(
            "/api/v1/debug/scheduled",
            get(super::routes::debug_scheduled),
        );

    let public = Router::new()
        .route("/health", get(super::routes::health_check))
        .route(
            "/hooks/webhook/{path}",
            post(super::routes::webhook_inbound),
        );

    api.merge(public)
        .layer({
            let cors = CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .max_age(std::time::Duration::from_secs(3600));

            // Restrict CORS origins in production via env var
            // Example: HOOKWIRE_CORS_ORIGINS=https://ops.example.com
            if let Ok(origins_str) = std::env::var("HOOKWIRE_CORS_ORIGINS") {
                let origins: Vec<_> = origins_str
                    .split(',')
                    .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
                    .collect();
                cors.allow_origin(origins)
            } else {
                cors.allow_origin(Any)
            }
        })
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server and block until it exits.
pub async fn start(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
