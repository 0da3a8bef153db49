//! Runtime types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Suggested filename of a Word export.
pub const WORD_FILENAME: &str = "webpage.docx";
/// Suggested filename of a PDF export.
pub const PDF_FILENAME: &str = "webpage.pdf";
/// Remote debugging protocol version requested on attach.
pub const DEBUGGER_PROTOCOL_VERSION: &str = "1.3";
/// How long a blob handle outlives the start of its download.
pub const BLOB_REVOKE_DELAY: Duration = Duration::from_secs(60);

/// Identifier handed out by the download facility.
pub type DownloadId = u64;

/// Request to the download facility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// `blob:` or `data:` URL of the content.
    pub source: String,
    pub filename: String,
    #[serde(rename = "promptForLocation")]
    pub prompt_for_location: bool,
}

impl DownloadRequest {
    /// Download that always asks where to save.
    pub fn prompted(source: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
            prompt_for_location: true,
        }
    }
}

/// Terminal outcome of one export, reported to the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportStatus {
    WordDownloaded,
    PdfDownloaded,
    InjectionFailed,
    MessagingFailed,
    ConversionError,
    ConversionFailed,
    DownloadFailed,
    DebuggerAttachFailed,
    PrintFailed,
}

impl ExportStatus {
    /// Human-readable status string shown in the popup.
    pub fn message(&self) -> &'static str {
        match self {
            Self::WordDownloaded => "Word document downloaded.",
            Self::PdfDownloaded => "PDF downloaded.",
            Self::InjectionFailed => "Failed to inject scripts.",
            Self::MessagingFailed => "Failed to send message to content script.",
            Self::ConversionError => "Error during conversion.",
            Self::ConversionFailed => "Conversion failed.",
            Self::DownloadFailed => "Download failed.",
            Self::DebuggerAttachFailed => "Failed to attach debugger.",
            Self::PrintFailed => "Print to PDF failed.",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::WordDownloaded | Self::PdfDownloaded)
    }
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}
