//! HTTP channel from the popup client to the background server.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use webexport_core::{BackgroundRequest, Error, Result, StatusReply, TabId, TabInfo};
use webexport_runtime::BackgroundChannel;

pub struct HttpBackground {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackground {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let resp = self.client.get(self.url("/api/tabs")).send().await;
        read_json(resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn read_json<T: DeserializeOwned>(
    resp: std::result::Result<reqwest::Response, reqwest::Error>,
) -> Result<T> {
    let resp = resp.map_err(|e| Error::Http(format!("Background server unreachable: {}", e)))?;
    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let reason = body
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        return Err(Error::Http(reason));
    }
    resp.json()
        .await
        .map_err(|e| Error::Http(format!("Invalid response: {}", e)))
}

#[async_trait]
impl BackgroundChannel for HttpBackground {
    async fn active_tab(&self) -> Result<TabId> {
        let resp = self.client.get(self.url("/api/tabs/active")).send().await;
        let tab: TabInfo = read_json(resp).await?;
        Ok(tab.id)
    }

    async fn send(&self, request: BackgroundRequest) -> Result<StatusReply> {
        let resp = self
            .client
            .post(self.url("/api/messages"))
            .json(&request)
            .send()
            .await;
        read_json(resp).await
    }
}
