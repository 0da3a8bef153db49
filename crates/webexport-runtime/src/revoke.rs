//! Delayed blob revocation.
//!
//! A blob handle handed to the download facility must outlive the start of
//! the download, so its release is deferred. Each handle is released exactly
//! once: by its timer, by an immediate revoke, or by [`PendingRevocations::flush`]
//! on shutdown, whichever comes first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webexport_core::{PageRequest, TabId};

use crate::host::TabHost;

struct Pending {
    tab: TabId,
    timer: JoinHandle<()>,
}

pub struct PendingRevocations {
    tabs: Arc<dyn TabHost>,
    pending: Mutex<HashMap<String, Pending>>,
}

impl PendingRevocations {
    pub fn new(tabs: Arc<dyn TabHost>) -> Self {
        Self {
            tabs,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Revoke `blob_url` in `tab` once `delay` has elapsed.
    pub fn schedule(self: &Arc<Self>, tab: TabId, blob_url: String, delay: Duration) {
        let this = Arc::clone(self);
        let url = blob_url.clone();
        let mut pending = self.pending.lock();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire(&url).await;
        });
        debug!("Revocation of {} scheduled in {:?}", blob_url, delay);
        if let Some(previous) = pending.insert(blob_url, Pending { tab, timer }) {
            previous.timer.abort();
        }
    }

    /// Revoke right away, cancelling any scheduled revocation of the same URL.
    pub async fn revoke_now(&self, tab: TabId, blob_url: &str) {
        if let Some(entry) = self.pending.lock().remove(blob_url) {
            entry.timer.abort();
        }
        self.send_revoke(tab, blob_url).await;
    }

    /// Revoke every outstanding handle immediately. Returns how many were released.
    pub async fn flush(&self) -> usize {
        let drained: Vec<(String, Pending)> = self.pending.lock().drain().collect();
        let count = drained.len();
        for (url, entry) in drained {
            entry.timer.abort();
            self.send_revoke(entry.tab, &url).await;
        }
        if count > 0 {
            info!("Released {} pending blob handles", count);
        }
        count
    }

    /// Number of handles still waiting for their timer.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    async fn fire(&self, blob_url: &str) {
        let entry = self.pending.lock().remove(blob_url);
        if let Some(entry) = entry {
            self.send_revoke(entry.tab, blob_url).await;
        }
    }

    async fn send_revoke(&self, tab: TabId, blob_url: &str) {
        let request = PageRequest::RevokeBlobUrl {
            blob_url: blob_url.to_string(),
        };
        match self.tabs.send_message(tab, request).await {
            Ok(_) => debug!("Revoked {} in tab {}", blob_url, tab),
            Err(e) => warn!("Failed to revoke {} in tab {}: {}", blob_url, tab, e),
        }
    }
}
