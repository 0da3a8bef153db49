//! Background controller. Performs exports requested by the popup.
//!
//! Word: inject the snapshot routine into the tab, ask it for a DOCX blob,
//! download the blob, release it later. PDF: attach the debugger, print the
//! page, download the bytes, detach.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{error, info, warn};
use webexport_core::{BackgroundRequest, ExportAction, PageReply, PageRequest, StatusReply, TabId};

use crate::host::{Debugger, Downloads, TabHost};
use crate::revoke::PendingRevocations;
use crate::types::*;

/// Result of one export: the status plus any non-fatal snapshot warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub status: ExportStatus,
    pub warnings: Vec<String>,
}

impl From<ExportStatus> for ExportOutcome {
    fn from(status: ExportStatus) -> Self {
        Self {
            status,
            warnings: Vec::new(),
        }
    }
}

impl From<ExportOutcome> for StatusReply {
    fn from(outcome: ExportOutcome) -> Self {
        Self {
            message: outcome.status.message().to_string(),
            warnings: outcome.warnings,
        }
    }
}

/// Detaches the debugger if the export future is dropped while attached.
struct DetachGuard {
    debugger: Arc<dyn Debugger>,
    tab: TabId,
    armed: bool,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to detach the debugger from tab {}", self.tab);
            return;
        };
        warn!("PDF export for tab {} cancelled, detaching debugger", self.tab);
        let debugger = self.debugger.clone();
        let tab = self.tab;
        runtime.spawn(async move {
            if let Err(e) = debugger.detach(tab).await {
                warn!("Debugger detach failed for tab {}: {}", tab, e);
            }
        });
    }
}

pub struct BackgroundController {
    tabs: Arc<dyn TabHost>,
    debugger: Arc<dyn Debugger>,
    downloads: Arc<dyn Downloads>,
    revocations: Arc<PendingRevocations>,
    revoke_delay: Duration,
}

impl BackgroundController {
    pub fn new(
        tabs: Arc<dyn TabHost>,
        debugger: Arc<dyn Debugger>,
        downloads: Arc<dyn Downloads>,
    ) -> Self {
        let revocations = Arc::new(PendingRevocations::new(tabs.clone()));
        Self {
            tabs,
            debugger,
            downloads,
            revocations,
            revoke_delay: BLOB_REVOKE_DELAY,
        }
    }

    /// Blob handles still waiting for release.
    pub fn revocations(&self) -> &Arc<PendingRevocations> {
        &self.revocations
    }

    /// Handle one popup request and produce the reply shown to the user.
    pub async fn handle(&self, request: BackgroundRequest) -> StatusReply {
        info!("Export requested: {} for tab {}", request.action, request.tab_id);
        let outcome = match request.action {
            ExportAction::Word => self.convert_to_word(request.tab_id).await,
            ExportAction::Pdf => self.convert_to_pdf(request.tab_id).await,
        };
        if outcome.status.is_success() {
            info!("Export finished for tab {}: {}", request.tab_id, outcome.status);
        }
        outcome.into()
    }

    pub async fn convert_to_word(&self, tab: TabId) -> ExportOutcome {
        if let Err(e) = self.tabs.inject(tab).await {
            error!("Script injection failed: {}", e);
            return ExportStatus::InjectionFailed.into();
        }

        let reply = match self.tabs.send_message(tab, PageRequest::ConvertToDocx).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Message sending failed: {}", e);
                return ExportStatus::MessagingFailed.into();
            }
        };

        let (blob_url, warnings) = match reply {
            Some(PageReply::Blob { blob_url, warnings }) => (blob_url, warnings),
            Some(PageReply::Error { error }) => {
                error!("Error from content script: {}", error);
                return ExportStatus::ConversionError.into();
            }
            _ => {
                error!("No response or blobUrl received from content script");
                return ExportStatus::ConversionFailed.into();
            }
        };

        let request = DownloadRequest::prompted(blob_url.clone(), WORD_FILENAME);
        match self.downloads.download(request).await {
            Ok(download_id) => {
                info!("Download {} started for {}", download_id, blob_url);
                self.revocations
                    .schedule(tab, blob_url, self.revoke_delay);
                ExportOutcome {
                    status: ExportStatus::WordDownloaded,
                    warnings,
                }
            }
            Err(e) => {
                error!("Download failed: {}", e);
                self.revocations.revoke_now(tab, &blob_url).await;
                ExportOutcome {
                    status: ExportStatus::DownloadFailed,
                    warnings,
                }
            }
        }
    }

    pub async fn convert_to_pdf(&self, tab: TabId) -> ExportOutcome {
        if let Err(e) = self
            .debugger
            .attach(tab, DEBUGGER_PROTOCOL_VERSION)
            .await
        {
            error!("Debugger attach failed: {}", e);
            return ExportStatus::DebuggerAttachFailed.into();
        }

        let mut guard = DetachGuard {
            debugger: self.debugger.clone(),
            tab,
            armed: true,
        };
        let status = self.print_and_download(tab).await;

        guard.armed = false;
        if let Err(e) = self.debugger.detach(tab).await {
            warn!("Debugger detach failed for tab {}: {}", tab, e);
        }

        status.into()
    }

    /// Runs while the debugger is attached; every path returns to the caller
    /// so the detach happens exactly once.
    async fn print_and_download(&self, tab: TabId) -> ExportStatus {
        let result = match self
            .debugger
            .send_command(tab, "Page.printToPDF", json!({}))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!("Print to PDF failed: {}", e);
                return ExportStatus::PrintFailed;
            }
        };

        let Some(data) = result.get("data").and_then(Value::as_str) else {
            error!("Print to PDF returned no data");
            return ExportStatus::PrintFailed;
        };

        let data_url = format!("data:application/pdf;base64,{}", data);
        match self
            .downloads
            .download(DownloadRequest::prompted(data_url, PDF_FILENAME))
            .await
        {
            Ok(download_id) => {
                info!("Download {} started for tab {} PDF", download_id, tab);
                ExportStatus::PdfDownloaded
            }
            Err(e) => {
                error!("Download failed: {}", e);
                ExportStatus::DownloadFailed
            }
        }
    }
}
