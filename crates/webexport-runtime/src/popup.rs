//! Popup controller. Turns a button press into a background request and
//! the reply into the status line shown to the user.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use webexport_core::{BackgroundRequest, ExportAction, Result, StatusReply, TabId};

/// Shown when the background replied without a message.
pub const CONVERSION_STARTED: &str = "Conversion started...";

/// How the popup reaches the background controller.
#[async_trait]
pub trait BackgroundChannel: Send + Sync {
    /// Id of the active tab in the current window.
    async fn active_tab(&self) -> Result<TabId>;
    async fn send(&self, request: BackgroundRequest) -> Result<StatusReply>;
}

/// What the popup displays after an export attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupStatus {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PopupStatus {
    fn error(e: impl std::fmt::Display) -> Self {
        Self {
            message: format!("Error: {}", e),
            warnings: Vec::new(),
        }
    }
}

pub struct PopupController<C> {
    channel: C,
}

impl<C: BackgroundChannel> PopupController<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Request an export of the active tab.
    pub async fn export(&self, action: ExportAction) -> PopupStatus {
        let tab_id = match self.channel.active_tab().await {
            Ok(id) => id,
            Err(e) => {
                warn!("No active tab: {}", e);
                return PopupStatus::error(e);
            }
        };

        info!("Requesting {} for tab {}", action, tab_id);
        match self.channel.send(BackgroundRequest { action, tab_id }).await {
            Ok(reply) => {
                let message = if reply.message.is_empty() {
                    CONVERSION_STARTED.to_string()
                } else {
                    reply.message
                };
                PopupStatus {
                    message,
                    warnings: reply.warnings,
                }
            }
            Err(e) => PopupStatus::error(e),
        }
    }

    pub async fn word(&self) -> PopupStatus {
        self.export(ExportAction::Word).await
    }

    pub async fn pdf(&self) -> PopupStatus {
        self.export(ExportAction::Pdf).await
    }
}
