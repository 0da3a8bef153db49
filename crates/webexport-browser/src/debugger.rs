//! Debugger sessions over tabs, one at a time per tab.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::info;
use webexport_core::{Error, Result, TabId};
use webexport_runtime::Debugger;

use crate::browser::Browser;
use crate::cdp::CdpConnection;

struct Session {
    conn: Arc<CdpConnection>,
    session_id: String,
}

pub struct CdpDebugger {
    browser: Arc<Browser>,
    sessions: Mutex<HashMap<TabId, Arc<Session>>>,
}

impl CdpDebugger {
    pub fn new(browser: Arc<Browser>) -> Self {
        Self {
            browser,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_attached(&self, tab: TabId) -> bool {
        self.sessions.lock().contains_key(&tab)
    }

    fn session(&self, tab: TabId) -> Result<Arc<Session>> {
        self.sessions
            .lock()
            .get(&tab)
            .cloned()
            .ok_or_else(|| not_attached(tab))
    }
}

fn not_attached(tab: TabId) -> Error {
    Error::Debugger(format!("Debugger is not attached to the tab with id: {}.", tab))
}

#[async_trait]
impl Debugger for CdpDebugger {
    async fn attach(&self, tab: TabId, protocol_version: &str) -> Result<()> {
        if self.is_attached(tab) {
            return Err(Error::Debugger(format!(
                "Another debugger is already attached to the tab with id: {}.",
                tab
            )));
        }

        let version = self.browser.version().await?;
        if !version.supports(protocol_version) {
            return Err(Error::Debugger(format!(
                "Requested protocol version is not supported: {}.",
                protocol_version
            )));
        }

        let target = self
            .browser
            .target(tab)
            .await
            .map_err(|e| Error::Debugger(e.to_string()))?;
        let (conn, session_id) = self.browser.attach_session(&target.id).await?;

        let session = Arc::new(Session { conn, session_id });
        let raced = {
            let mut sessions = self.sessions.lock();
            if sessions.contains_key(&tab) {
                true
            } else {
                sessions.insert(tab, session.clone());
                false
            }
        };
        if raced {
            // A concurrent attach won; release ours.
            let _ = session
                .conn
                .send(
                    "Target.detachFromTarget",
                    json!({ "sessionId": session.session_id }),
                    None,
                )
                .await;
            return Err(Error::Debugger(format!(
                "Another debugger is already attached to the tab with id: {}.",
                tab
            )));
        }
        info!("Debugger attached to tab {} ({})", tab, target.url);
        Ok(())
    }

    async fn send_command(&self, tab: TabId, method: &str, params: Value) -> Result<Value> {
        let session = self.session(tab)?;
        session
            .conn
            .send(method, params, Some(&session.session_id))
            .await
    }

    async fn detach(&self, tab: TabId) -> Result<()> {
        let session = self
            .sessions
            .lock()
            .remove(&tab)
            .ok_or_else(|| not_attached(tab))?;
        session
            .conn
            .send(
                "Target.detachFromTarget",
                json!({ "sessionId": session.session_id }),
                None,
            )
            .await?;
        info!("Debugger detached from tab {}", tab);
        Ok(())
    }
}
