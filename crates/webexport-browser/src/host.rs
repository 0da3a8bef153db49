//! Script host. "Injects" the snapshot routine into a tab by binding a
//! [`PageAgent`] to a DevTools session on it, then delivers messages to it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};
use url::Url;
use webexport_core::{Error, PageReply, PageRequest, Result, TabId};
use webexport_runtime::TabHost;
use webexport_snapshot::{BlobStore, DocumentConverter, Fetcher, PageAgent};

use crate::browser::{Browser, TargetInfo};
use crate::page::CdpPage;

/// Schemes whose pages refuse script injection.
const RESTRICTED_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "chrome-search",
    "chrome-untrusted",
    "devtools",
    "edge",
    "about",
    "view-source",
];

/// Whether scripts may be injected into a page at `url`.
pub fn is_injectable(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => !RESTRICTED_SCHEMES.contains(&parsed.scheme()),
        Err(_) => false,
    }
}

const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

/// Snapshot routine bound to one tab's session.
struct InjectedTab {
    page: Arc<CdpPage>,
    agent: Arc<PageAgent>,
}

impl InjectedTab {
    /// Sessions die with the DevTools socket that carried them.
    fn is_live(&self) -> bool {
        self.page.is_live()
    }
}

pub struct CdpTabHost {
    browser: Arc<Browser>,
    fetcher: Arc<dyn Fetcher>,
    converter: Arc<dyn DocumentConverter>,
    blobs: Arc<BlobStore>,
    agents: RwLock<HashMap<TabId, InjectedTab>>,
}

impl CdpTabHost {
    pub fn new(
        browser: Arc<Browser>,
        fetcher: Arc<dyn Fetcher>,
        converter: Arc<dyn DocumentConverter>,
        blobs: Arc<BlobStore>,
    ) -> Self {
        Self {
            browser,
            fetcher,
            converter,
            blobs,
            agents: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_injected(&self, tab: TabId) -> bool {
        self.agents.read().get(&tab).is_some_and(InjectedTab::is_live)
    }

    /// Forget agents whose tab is no longer among `targets`.
    fn retain_targets(&self, targets: &[TargetInfo]) {
        let registry = self.browser.registry();
        self.agents.write().retain(|tab, _| {
            let open = registry
                .target_id(*tab)
                .is_some_and(|id| targets.iter().any(|t| t.id == id));
            if !open {
                debug!("Tab {} is gone, dropping its snapshot routine", tab);
            }
            open
        });
    }

    fn bind(&self, tab: TabId, page: Arc<CdpPage>) {
        let agent = PageAgent::new(
            page.clone(),
            self.fetcher.clone(),
            self.converter.clone(),
            self.blobs.clone(),
        );
        self.agents.write().insert(
            tab,
            InjectedTab {
                page,
                agent: Arc::new(agent),
            },
        );
    }
}

#[async_trait]
impl TabHost for CdpTabHost {
    async fn inject(&self, tab: TabId) -> Result<()> {
        let targets = self
            .browser
            .page_targets()
            .await
            .map_err(|e| Error::Injection(e.to_string()))?;
        self.retain_targets(&targets);

        let target = self
            .browser
            .registry()
            .target_id(tab)
            .and_then(|id| targets.into_iter().find(|t| t.id == id))
            .ok_or_else(|| Error::Injection(format!("No tab with id: {}.", tab)))?;

        if !is_injectable(&target.url) {
            return Err(Error::Injection(format!(
                "Cannot access contents of url \"{}\".",
                target.url
            )));
        }

        if self.is_injected(tab) {
            debug!("Tab {} already has the snapshot routine", tab);
            return Ok(());
        }

        let (conn, session_id) = self
            .browser
            .attach_session(&target.id)
            .await
            .map_err(|e| Error::Injection(e.to_string()))?;
        self.bind(tab, Arc::new(CdpPage::new(conn, session_id)));
        info!("Injected snapshot routine into tab {} ({})", tab, target.url);
        Ok(())
    }

    async fn send_message(&self, tab: TabId, request: PageRequest) -> Result<Option<PageReply>> {
        let agent = {
            let mut agents = self.agents.write();
            match agents.get(&tab) {
                Some(entry) if entry.is_live() => Some(entry.agent.clone()),
                Some(_) => {
                    debug!("Session for tab {} closed with its connection", tab);
                    agents.remove(&tab);
                    None
                }
                None => None,
            }
        };
        let agent = agent.ok_or_else(|| Error::Messaging(NO_RECEIVER.to_string()))?;
        Ok(Some(agent.handle(request).await))
    }
}
