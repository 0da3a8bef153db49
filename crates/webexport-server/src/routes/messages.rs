//! Popup → background messages.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tracing::error;
use webexport_core::{BackgroundRequest, StatusReply};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/messages", post(post_message))
}

/// POST /api/messages — run one export and reply with its status.
///
/// Export failures are part of the reply body, not HTTP errors; the popup
/// shows whatever message comes back. The export runs on its own task so a
/// client that hangs up does not cut it short between attach and detach.
async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BackgroundRequest>,
) -> Result<Json<StatusReply>, (StatusCode, Json<Value>)> {
    let export = tokio::spawn(async move { state.controller.handle(request).await });
    match export.await {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            error!("Export task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("Export task failed: {}", e) })),
            ))
        }
    }
}
