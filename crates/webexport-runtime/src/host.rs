//! Browser capabilities the controllers depend on.

use async_trait::async_trait;
use serde_json::Value;
use webexport_core::{PageReply, PageRequest, Result, TabId, TabInfo};

use crate::types::{DownloadId, DownloadRequest};

/// Script injection and messaging into tabs.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Install the snapshot routine and its converter into the tab.
    async fn inject(&self, tab: TabId) -> Result<()>;

    /// Deliver a request to the routine injected into `tab`. `Ok(None)` means
    /// the receiver answered nothing.
    async fn send_message(&self, tab: TabId, request: PageRequest) -> Result<Option<PageReply>>;
}

/// Remote debugging sessions over tabs.
#[async_trait]
pub trait Debugger: Send + Sync {
    async fn attach(&self, tab: TabId, protocol_version: &str) -> Result<()>;
    async fn send_command(&self, tab: TabId, method: &str, params: Value) -> Result<Value>;
    async fn detach(&self, tab: TabId) -> Result<()>;
}

/// The platform download facility.
#[async_trait]
pub trait Downloads: Send + Sync {
    async fn download(&self, request: DownloadRequest) -> Result<DownloadId>;
}

/// Tab enumeration for the popup.
#[async_trait]
pub trait TabDirectory: Send + Sync {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>>;
    /// Active tab of the focused window.
    async fn active_tab(&self) -> Result<TabInfo>;
}
