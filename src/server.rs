//! Inbound webhook HTTP surface.
//!
//! Exposes `POST /feishu` and `POST /syslog` for Alertmanager batches (with
//! an optional `?target=` comma-separated destination list), a Prometheus
//! `/metrics` endpoint and a `/healthz` liveness probe. Any successfully
//! decoded batch is acknowledged with `200 ok` regardless of downstream
//! delivery outcomes; only a malformed body is surfaced to the caller.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::AlertBatch;
use crate::dispatch::{ChannelKind, Dispatcher};

/// Shared read-only state behind every request handler.
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Absent when no Prometheus recorder is installed (tests).
    pub prometheus: Option<PrometheusHandle>,
}

#[derive(Debug, Deserialize)]
pub struct HookParams {
    /// Comma-separated destination names; absent means broadcast.
    pub target: Option<String>,
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/feishu", post(feishu_hook))
        .route("/syslog", post(syslog_hook))
        .route("/healthz", get(healthz))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

async fn feishu_hook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HookParams>,
    payload: Result<Json<AlertBatch>, JsonRejection>,
) -> impl IntoResponse {
    handle_hook(state, ChannelKind::Feishu, params, payload).await
}

async fn syslog_hook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HookParams>,
    payload: Result<Json<AlertBatch>, JsonRejection>,
) -> impl IntoResponse {
    handle_hook(state, ChannelKind::Syslog, params, payload).await
}

async fn handle_hook(
    state: Arc<AppState>,
    kind: ChannelKind,
    params: HookParams,
    payload: Result<Json<AlertBatch>, JsonRejection>,
) -> (StatusCode, &'static str) {
    let batch = match payload {
        Ok(Json(batch)) => batch,
        Err(rejection) => {
            warn!(channel = kind.as_str(), error = %rejection, "Rejected malformed batch");
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let summary = state
        .dispatcher
        .dispatch(kind, &batch, params.target.as_deref())
        .await;
    debug!(
        channel = kind.as_str(),
        attempted = summary.attempted,
        failed = summary.failed,
        "Batch processed"
    );

    // Fire-and-forget contract: delivery failures are not the sender's
    // problem once the batch decoded.
    (StatusCode::OK, "ok")
}

async fn healthz() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
