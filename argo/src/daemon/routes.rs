//! HTTP routes
//!
//! Axum router and handlers implementing the daemon's endpoint table
//! (spec.md §4.6). Loopback-only; no auth layer (explicit Non-goal).

use super::error::ApiError;
use super::process;
use super::state::{DaemonState, IoChannelPair};
use crate::error::ArgoError;
use crate::health::{ComponentHealth, HealthReport, HealthStatus};
use crate::provider::{AiProvider, AiRequest};
use crate::workflow::{WorkflowEntry, WorkflowState};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<DaemonState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/workflow/start", post(start_workflow))
        .route("/api/workflow/list", get(list_workflows))
        .route("/api/workflow/status/:id", get(get_status))
        .route("/api/workflow/abandon/:id", delete(abandon_workflow))
        .route("/api/workflow/pause/:id", post(pause_workflow))
        .route("/api/workflow/resume/:id", post(resume_workflow))
        .route("/api/workflow/progress/:id", post(post_progress))
        .route("/api/workflow/input/:id", post(post_input))
        .route("/api/ci/query", post(ci_query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn health(State(state): State<Arc<DaemonState>>) -> impl IntoResponse {
    let registry = state.registry.lock().await;
    let registry_component = ComponentHealth {
        name: "registry".to_string(),
        status: HealthStatus::Healthy,
        detail: Some(format!("{} workflows tracked", registry.count(None))),
    };
    drop(registry);

    let uptime = (now() - state.start_time).max(0) as u64;
    let report = HealthReport::from_components(vec![registry_component], uptime);
    Json(report)
}

#[derive(Deserialize)]
struct StartRequest {
    script: String,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    instance: Option<String>,
    #[serde(default)]
    args: HashMap<String, String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

#[derive(Serialize)]
struct StartResponse {
    workflow_id: String,
}

async fn start_workflow(
    State(state): State<Arc<DaemonState>>,
    Json(req): Json<StartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.script.trim().is_empty() {
        return Err(ApiError::BadRequest("script must not be empty".to_string()));
    }

    let template_name = req.template.clone().unwrap_or_else(|| req.script.clone());
    if !state.graph_path_for(&template_name).exists() {
        return Err(ApiError::Argo(ArgoError::NotFound(template_name)));
    }

    let id = {
        let mut registry = state.registry.lock().await;
        let id = registry.allocate_id(&req.script, req.instance.as_deref());
        registry.add(WorkflowEntry::new(id.clone(), req.script.clone()))?;
        id
    };
    state.persist_registry().await?;

    let mut seed = req.args;
    seed.extend(req.env);
    let seed_path = state.context_seed_path_for(&id);
    let seed_json = serde_json::to_string(&seed).map_err(ArgoError::from)?;
    tokio::fs::write(&seed_path, seed_json).await.map_err(ArgoError::from)?;

    let channel = Arc::new(IoChannelPair::new(state.log_path_for(&id)));
    state.register_channel(id.clone(), channel).await;

    process::spawn_executor(&state, &id, &template_name).await?;

    Ok((axum::http::StatusCode::OK, Json(StartResponse { workflow_id: id })))
}

async fn list_workflows(State(state): State<Arc<DaemonState>>) -> impl IntoResponse {
    let registry = state.registry.lock().await;
    Json(registry.list())
}

#[derive(Serialize)]
struct StatusResponse {
    workflow_id: String,
    state: WorkflowState,
    pid: u32,
    exit_code: Option<i32>,
    script: String,
}

impl From<WorkflowEntry> for StatusResponse {
    fn from(entry: WorkflowEntry) -> Self {
        Self {
            workflow_id: entry.id,
            state: entry.state,
            pid: entry.pid,
            exit_code: entry.exit_code,
            script: entry.name,
        }
    }
}

async fn get_status(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let registry = state.registry.lock().await;
    registry
        .find(&id)
        .map(|entry| Json(StatusResponse::from(entry)))
        .ok_or_else(|| ApiError::Argo(ArgoError::NotFound(id)))
}

async fn abandon_workflow(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let pid = {
        let mut registry = state.registry.lock().await;
        let entry = registry
            .find(&id)
            .ok_or_else(|| ArgoError::NotFound(id.clone()))?;
        registry.mutate(&id, |e| {
            e.abandon_requested = true;
            e.transition(WorkflowState::Abandoned, now());
        })?;
        entry.pid
    };
    state.persist_registry().await?;

    if pid != 0 {
        // Best-effort: the process may already have exited.
        let _ = process::send_sigterm(pid);
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn pause_workflow(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Registry-visible only; no signal is sent to the executor process
    // (spec.md Non-goal: pause/resume without process signaling).
    let mut registry = state.registry.lock().await;
    registry.update_state(&id, WorkflowState::Paused, now())?;
    drop(registry);
    state.persist_registry().await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn resume_workflow(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut registry = state.registry.lock().await;
    registry.update_state(&id, WorkflowState::Running, now())?;
    drop(registry);
    state.persist_registry().await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct ProgressRequest {
    step: u64,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    name: Option<String>,
}

async fn post_progress(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut registry = state.registry.lock().await;
    registry.update_progress(&id, req.step)?;
    if let Some(total) = req.total {
        registry.mutate(&id, |e| e.total_steps = total)?;
    }
    drop(registry);
    state.persist_registry().await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct InputRequest {
    input: String,
}

async fn post_input(
    State(state): State<Arc<DaemonState>>,
    Path(id): Path<String>,
    Json(req): Json<InputRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Decided ambiguity (SPEC_FULL.md §4.5): input to a non-running
    // workflow is accepted and discarded, not rejected, for symmetry
    // with the daemon's other best-effort endpoints.
    if let Some(channel) = state.channel_for(&id).await {
        let _ = channel.input.push(req.input).await;
    }
    Ok(axum::http::StatusCode::OK)
}

#[derive(Deserialize)]
struct CiQueryRequest {
    query: String,
    #[serde(default)]
    #[allow(dead_code)]
    provider: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    model: Option<String>,
}

#[derive(Serialize)]
struct CiQueryResponse {
    response: String,
}

async fn ci_query(
    State(_state): State<Arc<DaemonState>>,
    Json(req): Json<CiQueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // No provider is wired into the daemon by default (spec.md Non-goal:
    // AI-provider client internals). This endpoint exists so a provider
    // can be plugged in later without changing the wire contract; an
    // unconfigured provider surfaces as 502 via `ArgoError::Provider`.
    let provider = crate::provider::UnconfiguredProvider;
    let reply = provider
        .complete(AiRequest {
            system_prompt: None,
            messages: vec![crate::provider::AiMessage {
                role: "user".to_string(),
                content: req.query,
            }],
        })
        .await?;
    Ok(Json(CiQueryResponse {
        response: reply.content,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArgoConfig;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_state(base: &std::path::Path) -> Arc<DaemonState> {
        let mut config = ArgoConfig::default();
        config.daemon.registry_path = base.join("registry.json").to_string_lossy().to_string();
        config.daemon.log_dir = base.join("logs").to_string_lossy().to_string();
        config.daemon.templates_dir = base.join("templates").to_string_lossy().to_string();
        Arc::new(DaemonState::new(config, 1000))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_for_missing_workflow_is_404() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/workflow/status/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_input_to_unknown_workflow_is_discarded_not_rejected() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/workflow/input/nonexistent")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"input": "hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_with_missing_script_is_404() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/workflow/start")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"script": "no-such-template"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ci_query_with_no_provider_is_502() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ci/query")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"query": "what is the status?"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_list_is_empty_initially() {
        let dir = tempdir().unwrap();
        let state = test_state(dir.path());
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/workflow/list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let entries: Vec<WorkflowEntry> = serde_json::from_slice(&body).unwrap();
        assert!(entries.is_empty());
    }
}
