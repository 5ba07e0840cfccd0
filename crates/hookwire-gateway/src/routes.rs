//! API route handlers for the gateway.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use hookwire_core::{DeliveryPayload, SourceKind, WorkflowDraft};
use hookwire_engine::fan_out;

use super::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "hookwire",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();
    let scheduled = state.scheduler.scheduled().len();
    let workflows = state.registry.lock().await.list().len();
    Json(serde_json::json!({
        "service": "hookwire",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        "uptime_secs": uptime.as_secs(),
        "workflows": workflows,
        "scheduled": scheduled,
        "routes": state.dispatcher.routes().len(),
        "gateway": {
            "host": state.config.gateway.host,
            "port": state.config.gateway.port,
        }
    }))
}

/// List all workflows.
pub async fn list_workflows(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let workflows = state.registry.lock().await.list();
    Json(serde_json::json!({"ok": true, "workflows": workflows}))
}

/// Get one workflow by id.
pub async fn get_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    match state.registry.lock().await.get(&id) {
        Some(wf) => Json(serde_json::json!({"ok": true, "workflow": wf})),
        None => Json(serde_json::json!({"ok": false, "error": format!("Unknown workflow: {id}")})),
    }
}

/// Create a workflow and start polling it if its source is scheduled.
pub async fn create_workflow(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let draft: WorkflowDraft = match serde_json::from_value(body) {
        Ok(d) => d,
        Err(e) => {
            return Json(serde_json::json!({"ok": false, "error": format!("Invalid workflow: {e}")}));
        }
    };

    let workflow = {
        let mut registry = state.registry.lock().await;
        match registry.add(draft) {
            Ok(wf) => wf,
            Err(e) => return Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        }
    };

    state.scheduler.schedule(workflow.clone());
    Json(serde_json::json!({"ok": true, "workflow": workflow}))
}

/// Delete a workflow, stopping its poll loop first.
pub async fn delete_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    state.scheduler.unschedule(&id);
    let removed = {
        let mut registry = state.registry.lock().await;
        match registry.remove(&id) {
            Ok(removed) => removed,
            Err(e) => return Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        }
    };
    Json(serde_json::json!({"ok": removed}))
}

/// Enable a workflow and schedule its poll loop.
pub async fn enable_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    set_enabled(state, &id, true).await
}

/// Disable a workflow and stop its poll loop. In-flight deliveries
/// are allowed to finish.
pub async fn disable_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    set_enabled(state, &id, false).await
}

async fn set_enabled(state: Arc<AppState>, id: &str, enabled: bool) -> Json<serde_json::Value> {
    let workflow = {
        let mut registry = state.registry.lock().await;
        match registry.set_enabled(id, enabled) {
            Ok(Some(wf)) => wf,
            Ok(None) => {
                return Json(
                    serde_json::json!({"ok": false, "error": format!("Unknown workflow: {id}")}),
                );
            }
            Err(e) => return Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        }
    };

    if enabled {
        state.scheduler.schedule(workflow.clone());
    } else {
        state.scheduler.unschedule(id);
    }
    Json(serde_json::json!({"ok": true, "workflow": workflow}))
}

/// Inbound webhook. Fans the event out to every enabled workflow
/// registered on this path; always answers 200 once accepted so the
/// emitter never retries on our delivery failures.
pub async fn webhook_inbound(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let secret = &state.config.gateway.webhook_secret;
    if !secret.is_empty() {
        let provided = headers
            .get("X-Hookwire-Signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != signature(secret, &body) {
            tracing::warn!("Webhook on /{path} rejected: bad signature");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"ok": false, "error": "Invalid signature"})),
            );
        }
    }

    let event: serde_json::Value = serde_json::from_slice(&body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()));

    let workflows = state.registry.lock().await.list();
    let outcome = fan_out(&workflows, &path, &event, &state.dispatcher).await;
    tracing::info!(
        "📨 Webhook /{path}: {} matched, {} delivered",
        outcome.matched,
        outcome.delivered
    );

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "ok": true,
            "results": [{"id": outcome.id, "delivered": outcome.delivered}],
        })),
    )
}

/// Hex SHA-256 over secret plus raw body.
fn signature(secret: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Manually push a payload through one routing table entry. Unlike the
/// webhook intake this surfaces an unknown target/action pair as 400.
pub async fn manual_dispatch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let target = body["target"].as_str().unwrap_or("").to_string();
    let action = body["action"].as_str().unwrap_or("").to_string();
    let params = body.get("params").cloned().unwrap_or(serde_json::json!({}));
    let payload = DeliveryPayload {
        workflow_id: "manual".into(),
        source: SourceKind::Webhook,
        fields: body.get("fields").cloned().unwrap_or(serde_json::json!({})),
    };

    match state
        .dispatcher
        .dispatch(&target, &action, &params, &payload)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Err(e) if e.is_unsupported() => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        ),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        ),
    }
}

/// Debug view of the live poll loops and persisted cursors.
pub async fn debug_scheduled(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let scheduled = state.scheduler.scheduled();
    Json(serde_json::json!({
        "ok": true,
        "total": scheduled.len(),
        "scheduled": scheduled,
        "cursors": state.scheduler.cursors().snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwire_core::Result;
    use hookwire_engine::{CursorStore, Dispatcher, PollScheduler, WorkflowRegistry};

    struct OkSender;

    #[async_trait::async_trait]
    impl hookwire_core::ActionSender for OkSender {
        async fn send(
            &self,
            _target_cfg: &serde_json::Value,
            _payload: &DeliveryPayload,
        ) -> Result<()> {
            Ok(())
        }
    }

    fn test_state(name: &str) -> State<Arc<AppState>> {
        let dir = std::env::temp_dir().join(format!("hookwire-gw-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let cursors = Arc::new(CursorStore::open(&dir));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("chat", "message", Arc::new(OkSender));
        let dispatcher = Arc::new(dispatcher);
        let scheduler = Arc::new(PollScheduler::new(cursors, dispatcher.clone(), 5));

        State(Arc::new(AppState {
            config: hookwire_core::config::HookwireConfig::default(),
            registry: Arc::new(tokio::sync::Mutex::new(WorkflowRegistry::open(&dir))),
            scheduler,
            dispatcher,
            start_time: std::time::Instant::now(),
        }))
    }

    fn webhook_draft(path: &str) -> serde_json::Value {
        serde_json::json!({
            "source": "webhook",
            "trigger": "webhook_received",
            "target": "chat",
            "action": "message",
            "params": {"source": {"path": path}, "target": {}},
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check().await.0;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "hookwire");
    }

    #[tokio::test]
    async fn test_system_info() {
        let json = system_info(test_state("info")).await.0;
        assert!(json["uptime_secs"].is_number());
        assert_eq!(json["workflows"], 0);
        assert_eq!(json["routes"], 1);
    }

    #[tokio::test]
    async fn test_workflow_crud() {
        let state = test_state("crud");

        let created = create_workflow(state.clone(), Json(webhook_draft("deploys"))).await.0;
        assert_eq!(created["ok"], true);
        let id = created["workflow"]["id"].as_str().unwrap().to_string();

        let listed = list_workflows(state.clone()).await.0;
        assert_eq!(listed["workflows"].as_array().unwrap().len(), 1);

        let fetched = get_workflow(state.clone(), Path(id.clone())).await.0;
        assert_eq!(fetched["workflow"]["id"], id.as_str());

        let deleted = delete_workflow(state.clone(), Path(id.clone())).await.0;
        assert_eq!(deleted["ok"], true);
        let missing = get_workflow(state, Path(id)).await.0;
        assert_eq!(missing["ok"], false);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_body() {
        let state = test_state("badbody");
        let json = create_workflow(state, Json(serde_json::json!({"source": "webhook"}))).await.0;
        assert_eq!(json["ok"], false);
    }

    #[tokio::test]
    async fn test_enable_disable_unknown_id() {
        let state = test_state("toggle");
        let json = enable_workflow(state.clone(), Path("wf-nope".into())).await.0;
        assert_eq!(json["ok"], false);
        let json = disable_workflow(state, Path("wf-nope".into())).await.0;
        assert_eq!(json["ok"], false);
    }

    #[tokio::test]
    async fn test_webhook_inbound_delivers() {
        let state = test_state("inbound");
        create_workflow(state.clone(), Json(webhook_draft("deploys"))).await;

        let (status, json) = webhook_inbound(
            state,
            Path("deploys".into()),
            HeaderMap::new(),
            Bytes::from_static(br#"{"env": "prod"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.0["ok"], true);
        assert_eq!(json.0["results"][0]["delivered"], 1);
    }

    #[tokio::test]
    async fn test_webhook_inbound_unknown_path_still_ok() {
        let state = test_state("nopath");
        let (status, json) = webhook_inbound(
            state,
            Path("nobody-home".into()),
            HeaderMap::new(),
            Bytes::from_static(b"{}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.0["results"][0]["delivered"], 0);
    }

    #[tokio::test]
    async fn test_webhook_signature_enforced() {
        let state = test_state("sig");
        let mut config = hookwire_core::config::HookwireConfig::default();
        config.gateway.webhook_secret = "s3cret".into();
        let state = State(Arc::new(AppState {
            config,
            registry: state.0.registry.clone(),
            scheduler: state.0.scheduler.clone(),
            dispatcher: state.0.dispatcher.clone(),
            start_time: std::time::Instant::now(),
        }));

        let body = Bytes::from_static(b"{}");
        let (status, _) =
            webhook_inbound(state.clone(), Path("x".into()), HeaderMap::new(), body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Hookwire-Signature",
            signature("s3cret", &body).parse().unwrap(),
        );
        let (status, _) = webhook_inbound(state, Path("x".into()), headers, body).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_manual_dispatch_unknown_pair_is_400() {
        let state = test_state("dispatch");
        let (status, json) = manual_dispatch(
            state.clone(),
            Json(serde_json::json!({"target": "fax", "action": "ring", "fields": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json.0["ok"], false);

        let (status, _) = manual_dispatch(
            state,
            Json(serde_json::json!({"target": "chat", "action": "message", "fields": {"a": "b"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_debug_scheduled_empty() {
        let state = test_state("sched");
        let json = debug_scheduled(state).await.0;
        assert_eq!(json["ok"], true);
        assert_eq!(json["total"], 0);
        assert_eq!(json["scheduled"].as_array().unwrap().len(), 0);
        assert!(json["cursors"].is_object());
    }
}
