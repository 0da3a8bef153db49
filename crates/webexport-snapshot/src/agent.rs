//! Page agent: the handler that answers background requests on behalf of
//! one tab once the snapshot routine has been injected into it.

use std::sync::Arc;

use tracing::{error, info};
use webexport_core::{PageReply, PageRequest, Result};

use crate::blob::BlobStore;
use crate::docx::{DocumentConverter, DOCX_MIME};
use crate::fetch::Fetcher;
use crate::page::PageContext;
use crate::snapshot;

pub struct PageAgent {
    page: Arc<dyn PageContext>,
    fetcher: Arc<dyn Fetcher>,
    converter: Arc<dyn DocumentConverter>,
    blobs: Arc<BlobStore>,
}

impl PageAgent {
    pub fn new(
        page: Arc<dyn PageContext>,
        fetcher: Arc<dyn Fetcher>,
        converter: Arc<dyn DocumentConverter>,
        blobs: Arc<BlobStore>,
    ) -> Self {
        Self {
            page,
            fetcher,
            converter,
            blobs,
        }
    }

    /// Answer one request from the background controller.
    pub async fn handle(&self, request: PageRequest) -> PageReply {
        match request {
            PageRequest::ConvertToDocx => match self.convert_to_docx().await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Error processing HTML: {}", e);
                    PageReply::Error {
                        error: e.to_string(),
                    }
                }
            },
            PageRequest::RevokeBlobUrl { blob_url } => {
                self.blobs.revoke(&blob_url);
                PageReply::Ack { success: true }
            }
        }
    }

    async fn convert_to_docx(&self) -> Result<PageReply> {
        let snapshot = snapshot::capture(self.page.as_ref(), self.fetcher.as_ref()).await?;
        let bytes = self.converter.convert(&snapshot.html)?;
        let size = bytes.len();
        let blob_url = self.blobs.create(bytes, DOCX_MIME);

        info!("Converted page to Word document ({} bytes): {}", size, blob_url);

        Ok(PageReply::Blob {
            blob_url,
            warnings: snapshot.warnings.iter().map(|w| w.to_string()).collect(),
        })
    }
}
