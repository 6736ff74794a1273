//! HTTP surface: liveness/readiness/metrics endpoints and the GitHub
//! issues webhook receiver.
//!
//! The webhook handler parses the payload, then spawns `process_issue` as
//! a detached task and returns immediately — GitHub expects a fast 2xx and
//! will retry on timeout, which would otherwise double-process the issue.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use coordination::events::MetricsEventEmitter;
use serde_json::{json, Value};

use crate::orchestrator::PipelineOrchestrator;
use crate::webhook::{parse_issue_event, WebhookParseError};

pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub metrics: Arc<MetricsEventEmitter>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/webhooks/github", post(github_webhook))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Probes the state store, GitHub, and the classifier's LLM endpoint
/// through the orchestrator; reports 503 if any of them is unreachable.
async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    if state.orchestrator.readiness_check().await {
        Json(json!({ "status": "ready" })).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not ready" }))).into_response()
    }
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.metrics().render() {
        Ok(body) => ([("content-type", "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

async fn github_webhook(State(state): State<Arc<AppState>>, Json(payload): Json<Value>) -> impl IntoResponse {
    let event = match parse_issue_event(&payload) {
        Ok(event) => event,
        Err(WebhookParseError::UnsupportedAction(action)) => {
            tracing::debug!(action, "ignoring unsupported issue action");
            return (StatusCode::OK, Json(json!({ "status": "ignored" })));
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed webhook payload");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
        }
    };

    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.process_issue(event).await;
    });

    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}
