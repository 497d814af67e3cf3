//! Read-only HTTP surface: liveness and counters.
//!
//! Both routes ask the lobby actor for a fresh snapshot, so they answer
//! `503` once the lobby has stopped.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use duelhall_lobby::LobbyHandle;
use duelhall_protocol::MetricsSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Clone)]
struct HttpState {
    lobby: LobbyHandle,
    started: Instant,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub uptime_secs: u64,
    pub metrics: MetricsSnapshot,
}

/// Builds the router for `/health` and `/metrics`.
pub fn router(lobby: LobbyHandle) -> Router {
    let state = HttpState {
        lobby,
        started: Instant::now(),
    };
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn health(State(state): State<HttpState>) -> Result<Json<HealthReport>, StatusCode> {
    let metrics = state.lobby.metrics().await.map_err(|e| {
        tracing::warn!(error = %e, "health check could not reach the lobby");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok(Json(HealthReport {
        status: "ok".to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
        metrics,
    }))
}

async fn metrics(State(state): State<HttpState>) -> Result<Json<MetricsSnapshot>, StatusCode> {
    state
        .lobby
        .metrics()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}
