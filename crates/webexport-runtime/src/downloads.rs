//! File-backed download facility.
//!
//! Resolves `blob:` sources through the shared [`BlobStore`] and `data:`
//! sources by decoding them, then writes the bytes where the save prompt
//! says.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use tracing::info;
use webexport_core::{Error, Result};
use webexport_snapshot::BlobStore;

use crate::host::Downloads;
use crate::types::{DownloadId, DownloadRequest};

/// Asks where a download should be saved. `None` means the user cancelled.
pub trait SavePrompt: Send + Sync {
    fn choose(&self, suggested: &str) -> Option<PathBuf>;
}

/// Non-interactive prompt: saves into a fixed directory, adding ` (n)` to the
/// name when the file already exists.
pub struct DirectoryPrompt {
    dir: PathBuf,
}

impl DirectoryPrompt {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SavePrompt for DirectoryPrompt {
    fn choose(&self, suggested: &str) -> Option<PathBuf> {
        Some(unique_path(&self.dir, suggested))
    }
}

fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match filename.rfind('.') {
        Some(dot) if dot > 0 => (&filename[..dot], &filename[dot..]),
        _ => (filename, ""),
    };
    (1u32..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

pub struct FileDownloads {
    blobs: Arc<BlobStore>,
    prompt: Arc<dyn SavePrompt>,
    next_id: AtomicU64,
}

impl FileDownloads {
    pub fn new(blobs: Arc<BlobStore>, prompt: Arc<dyn SavePrompt>) -> Self {
        Self {
            blobs,
            prompt,
            next_id: AtomicU64::new(1),
        }
    }

    fn resolve(&self, source: &str) -> Result<Vec<u8>> {
        if BlobStore::is_blob_url(source) {
            return self
                .blobs
                .get(source)
                .map(|blob| blob.bytes.to_vec())
                .ok_or_else(|| Error::Download(format!("{} is no longer available", source)));
        }
        if let Some(rest) = source.strip_prefix("data:") {
            return decode_data_url(rest);
        }
        Err(Error::Download(format!("Unsupported download source: {}", source)))
    }
}

/// Decode the part of a `data:` URL after the scheme.
fn decode_data_url(rest: &str) -> Result<Vec<u8>> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::Download("Malformed data URL".to_string()))?;
    if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::Download(format!("Invalid base64 payload: {}", e)))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Only the final path component of a suggested name is honoured.
fn sanitize_filename(filename: &str) -> Result<String> {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Download(format!("Invalid filename: {}", filename)))
}

#[async_trait]
impl Downloads for FileDownloads {
    async fn download(&self, request: DownloadRequest) -> Result<DownloadId> {
        let filename = sanitize_filename(&request.filename)?;
        let bytes = self.resolve(&request.source)?;

        let path = if request.prompt_for_location {
            self.prompt
                .choose(&filename)
                .ok_or_else(|| Error::Download("Download canceled by the user".to_string()))?
        } else {
            DirectoryPrompt::new(".").choose(&filename).unwrap_or_else(|| PathBuf::from(&filename))
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&path, &bytes).await?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        info!("Download {} saved to {} ({} bytes)", id, path.display(), bytes.len());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct CancelPrompt;

    impl SavePrompt for CancelPrompt {
        fn choose(&self, _suggested: &str) -> Option<PathBuf> {
            None
        }
    }

    fn downloads(tmp: &TempDir) -> (Arc<BlobStore>, FileDownloads) {
        let blobs = Arc::new(BlobStore::new());
        let prompt = Arc::new(DirectoryPrompt::new(tmp.path()));
        (blobs.clone(), FileDownloads::new(blobs, prompt))
    }

    #[tokio::test]
    async fn test_blob_download() {
        let tmp = TempDir::new().unwrap();
        let (blobs, downloads) = downloads(&tmp);
        let url = blobs.create(b"PK docx".to_vec(), "application/octet-stream");

        let id = downloads
            .download(DownloadRequest::prompted(url, "webpage.docx"))
            .await
            .unwrap();

        assert_eq!(id, 1);
        let saved = std::fs::read(tmp.path().join("webpage.docx")).unwrap();
        assert_eq!(saved, b"PK docx");
    }

    #[tokio::test]
    async fn test_data_url_download_uniquifies() {
        let tmp = TempDir::new().unwrap();
        let (_, downloads) = downloads(&tmp);
        let source = "data:application/pdf;base64,JVBERi0xLjQ=";

        downloads
            .download(DownloadRequest::prompted(source, "webpage.pdf"))
            .await
            .unwrap();
        let second = downloads
            .download(DownloadRequest::prompted(source, "webpage.pdf"))
            .await
            .unwrap();

        assert_eq!(second, 2);
        assert_eq!(std::fs::read(tmp.path().join("webpage.pdf")).unwrap(), b"%PDF-1.4");
        assert!(tmp.path().join("webpage (1).pdf").exists());
    }

    #[tokio::test]
    async fn test_revoked_blob_fails() {
        let tmp = TempDir::new().unwrap();
        let (blobs, downloads) = downloads(&tmp);
        let url = blobs.create(vec![1], "application/octet-stream");
        blobs.revoke(&url);

        let err = downloads
            .download(DownloadRequest::prompted(url, "webpage.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Download(_)));
        assert!(!tmp.path().join("webpage.docx").exists());
    }

    #[tokio::test]
    async fn test_cancelled_prompt_fails() {
        let blobs = Arc::new(BlobStore::new());
        let downloads = FileDownloads::new(blobs, Arc::new(CancelPrompt));

        let err = downloads
            .download(DownloadRequest::prompted("data:text/plain,hi", "a.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Download failed: Download canceled by the user");
    }

    #[tokio::test]
    async fn test_downloads_keep_no_per_file_state() {
        let tmp = TempDir::new().unwrap();
        let (blobs, downloads) = downloads(&tmp);

        for n in 0..50u64 {
            let url = blobs.create(vec![0; 1024], "application/octet-stream");
            let id = downloads
                .download(DownloadRequest::prompted(url.clone(), "webpage.docx"))
                .await
                .unwrap();
            assert_eq!(id, n + 1);
            blobs.revoke(&url);
        }

        // Only the files on disk remain
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 50);
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/webpage.pdf").unwrap(), "webpage.pdf");
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("").is_err());
    }

    #[test]
    fn test_decode_plain_data_url() {
        assert_eq!(decode_data_url("text/plain,hello").unwrap(), b"hello");
        assert!(decode_data_url("no-comma").is_err());
    }
}
