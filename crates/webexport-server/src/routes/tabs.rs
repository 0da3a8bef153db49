//! Tab listing routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tabs", get(list_tabs))
        .route("/tabs/active", get(active_tab))
}

/// GET /api/tabs — open page tabs, active first.
async fn list_tabs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.tabs.list_tabs().await {
        Ok(tabs) => (StatusCode::OK, Json(serde_json::json!(tabs))),
        Err(e) => {
            warn!("Failed to list tabs: {}", e);
            error_response(&e)
        }
    }
}

/// GET /api/tabs/active — the tab an export applies to.
async fn active_tab(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.tabs.active_tab().await {
        Ok(tab) => (StatusCode::OK, Json(serde_json::json!(tab))),
        Err(e) => {
            warn!("Failed to resolve active tab: {}", e);
            error_response(&e)
        }
    }
}
