//! Liveness route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// GET /api/health — server status.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now() - state.started_at;
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.config.port,
        "cdpUrl": state.config.cdp_url,
        "startedAt": state.started_at.to_rfc3339(),
        "uptimeSecs": uptime.num_seconds(),
        "pendingRevocations": state.controller.revocations().len(),
    }))
}
