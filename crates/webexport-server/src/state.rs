//! Shared application state.

use std::sync::Arc;

use webexport_core::WebExportConfig;
use webexport_runtime::{BackgroundController, TabDirectory};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: WebExportConfig,
    pub controller: BackgroundController,
    pub tabs: Arc<dyn TabDirectory>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: WebExportConfig,
        controller: BackgroundController,
        tabs: Arc<dyn TabDirectory>,
    ) -> Self {
        Self {
            config,
            controller,
            tabs,
            started_at: chrono::Utc::now(),
        }
    }
}
