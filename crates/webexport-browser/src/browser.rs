//! Browser endpoint: HTTP discovery (`/json/list`, `/json/version`), the
//! shared DevTools connection, and stable numeric ids for page targets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};
use webexport_core::{Error, Result, TabId, TabInfo};
use webexport_runtime::TabDirectory;

use crate::cdp::CdpConnection;

/// Entry of `/json/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Response of `/json/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser", default)]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

impl BrowserVersion {
    /// Whether a client asking for `required` (`major.minor`) can talk to
    /// this browser: same major version, minor no newer than the browser's.
    pub fn supports(&self, required: &str) -> bool {
        match (parse_version(required), parse_version(&self.protocol_version)) {
            (Some((req_major, req_minor)), Some((major, minor))) => {
                req_major == major && req_minor <= minor
            }
            _ => false,
        }
    }
}

fn parse_version(v: &str) -> Option<(u32, u32)> {
    let (major, minor) = v.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Maps DevTools target ids to the small integers callers use as tab ids.
#[derive(Default)]
pub struct TabRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    by_target: HashMap<String, TabId>,
    by_tab: HashMap<TabId, String>,
    next: TabId,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for a target, assigned on first sight and stable afterwards.
    pub fn tab_id(&self, target_id: &str) -> TabId {
        if let Some(id) = self.inner.read().by_target.get(target_id) {
            return *id;
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.by_target.get(target_id) {
            return *id;
        }
        inner.next += 1;
        let id = inner.next;
        inner.by_target.insert(target_id.to_string(), id);
        inner.by_tab.insert(id, target_id.to_string());
        id
    }

    pub fn target_id(&self, tab: TabId) -> Option<String> {
        self.inner.read().by_tab.get(&tab).cloned()
    }
}

pub struct Browser {
    endpoint: String,
    http: reqwest::Client,
    registry: TabRegistry,
    connection: tokio::sync::Mutex<Option<Arc<CdpConnection>>>,
}

impl Browser {
    /// `endpoint` is the HTTP root of the remote debugging port,
    /// e.g. `http://127.0.0.1:9222`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            http,
            registry: TabRegistry::new(),
            connection: tokio::sync::Mutex::new(None),
        })
    }

    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        let resp = self.http.get(&url).send().await.map_err(|e| {
            Error::Cdp(format!(
                "Cannot reach {}. Is the browser running with --remote-debugging-port? Error: {}",
                url, e
            ))
        })?;
        if !resp.status().is_success() {
            return Err(Error::Http(format!("{} returned {}", url, resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| Error::Cdp(format!("Invalid response from {}: {}", url, e)))
    }

    pub async fn version(&self) -> Result<BrowserVersion> {
        self.get_json("/json/version").await
    }

    /// Page targets, most recently focused first.
    pub async fn page_targets(&self) -> Result<Vec<TargetInfo>> {
        let targets: Vec<TargetInfo> = self.get_json("/json/list").await?;
        Ok(targets.into_iter().filter(|t| t.kind == "page").collect())
    }

    /// Page target behind a tab id.
    pub async fn target(&self, tab: TabId) -> Result<TargetInfo> {
        let target_id = self
            .registry
            .target_id(tab)
            .ok_or_else(|| Error::NotFound(format!("No tab with id: {}.", tab)))?;
        self.page_targets()
            .await?
            .into_iter()
            .find(|t| t.id == target_id)
            .ok_or_else(|| Error::NotFound(format!("No tab with id: {}.", tab)))
    }

    /// Browser-level DevTools connection, opened on first use and reopened
    /// after the browser drops it.
    pub async fn connection(&self) -> Result<Arc<CdpConnection>> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            if !conn.is_closed() {
                return Ok(conn.clone());
            }
            debug!("Reopening DevTools connection");
        }
        let version = self.version().await?;
        info!(
            "Browser {} (protocol {})",
            version.browser, version.protocol_version
        );
        let conn = Arc::new(CdpConnection::connect(&version.web_socket_debugger_url).await?);
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Attach a flat session to a page target and return its session id.
    pub async fn attach_session(&self, target_id: &str) -> Result<(Arc<CdpConnection>, String)> {
        let conn = self.connection().await?;
        let result = conn
            .send(
                "Target.attachToTarget",
                serde_json::json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        let session_id = result
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Cdp("attachToTarget returned no sessionId".to_string()))?
            .to_string();
        debug!("Attached session {} to target {}", session_id, target_id);
        Ok((conn, session_id))
    }

    fn tab_info(&self, target: &TargetInfo, active: bool) -> TabInfo {
        TabInfo {
            id: self.registry.tab_id(&target.id),
            url: target.url.clone(),
            title: target.title.clone(),
            active,
        }
    }
}

#[async_trait]
impl TabDirectory for Browser {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let targets = self.page_targets().await?;
        Ok(targets
            .iter()
            .enumerate()
            .map(|(i, t)| self.tab_info(t, i == 0))
            .collect())
    }

    async fn active_tab(&self) -> Result<TabInfo> {
        let targets = self.page_targets().await?;
        targets
            .first()
            .map(|t| self.tab_info(t, true))
            .ok_or_else(|| Error::NotFound("No active tab".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_ids_are_stable() {
        let registry = TabRegistry::new();
        let a = registry.tab_id("AAA");
        let b = registry.tab_id("BBB");
        assert_ne!(a, b);
        assert_eq!(registry.tab_id("AAA"), a);
        assert_eq!(registry.target_id(b).as_deref(), Some("BBB"));
        assert!(registry.target_id(99).is_none());
    }

    #[test]
    fn test_version_support() {
        let version = BrowserVersion {
            browser: "Chrome/126.0".to_string(),
            protocol_version: "1.3".to_string(),
            web_socket_debugger_url: "ws://127.0.0.1:9222/devtools/browser/x".to_string(),
        };
        assert!(version.supports("1.3"));
        assert!(version.supports("1.0"));
        assert!(!version.supports("1.4"));
        assert!(!version.supports("2.0"));
        assert!(!version.supports("garbage"));
    }

    #[test]
    fn test_target_list_parsing() {
        let body = r#"[
            {"id":"P1","type":"page","title":"Docs","url":"https://example.com/","webSocketDebuggerUrl":"ws://x"},
            {"id":"W1","type":"service_worker","url":"https://example.com/sw.js"}
        ]"#;
        let targets: Vec<TargetInfo> = serde_json::from_str(body).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].kind, "page");
        assert_eq!(targets[1].title, "");
    }

    #[test]
    fn test_version_parsing() {
        let body = r#"{"Browser":"Chrome/126.0.6478.126","Protocol-Version":"1.3","User-Agent":"x",
            "webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/browser/abc"}"#;
        let version: BrowserVersion = serde_json::from_str(body).unwrap();
        assert_eq!(version.protocol_version, "1.3");
        assert!(version.web_socket_debugger_url.ends_with("/abc"));
    }

    #[tokio::test]
    async fn test_unknown_tab_is_not_found() {
        let browser = Browser::new("http://127.0.0.1:1/", Duration::from_secs(1)).unwrap();
        let err = browser.target(42).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
