//! Revocable in-memory blob handles (`blob:` URLs).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

const BLOB_URL_PREFIX: &str = "blob:webexport/";

/// Binary payload behind a blob URL.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

/// Holds blobs until their URL is revoked.
#[derive(Default)]
pub struct BlobStore {
    blobs: RwLock<HashMap<String, Blob>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes and return a fresh URL referencing them.
    pub fn create(&self, bytes: Vec<u8>, mime: impl Into<String>) -> String {
        let url = format!("{}{}", BLOB_URL_PREFIX, uuid::Uuid::new_v4());
        let blob = Blob {
            bytes: Arc::from(bytes),
            mime: mime.into(),
        };
        debug!("Created {} ({} bytes)", url, blob.bytes.len());
        self.blobs.write().insert(url.clone(), blob);
        url
    }

    /// Look up a live blob.
    pub fn get(&self, url: &str) -> Option<Blob> {
        self.blobs.read().get(url).cloned()
    }

    /// Release a blob. Returns `false` if the URL was unknown or already revoked.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.blobs.write().remove(url).is_some();
        if removed {
            debug!("Revoked {}", url);
        }
        removed
    }

    /// Number of live blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn is_blob_url(url: &str) -> bool {
        url.starts_with("blob:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let store = BlobStore::new();
        let url = store.create(b"hello".to_vec(), "text/plain");
        assert!(url.starts_with("blob:webexport/"));
        assert!(BlobStore::is_blob_url(&url));

        let blob = store.get(&url).unwrap();
        assert_eq!(&*blob.bytes, b"hello");
        assert_eq!(blob.mime, "text/plain");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_urls_are_unique() {
        let store = BlobStore::new();
        let a = store.create(vec![1], "application/octet-stream");
        let b = store.create(vec![1], "application/octet-stream");
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_revoke_once() {
        let store = BlobStore::new();
        let url = store.create(vec![0; 16], "application/octet-stream");

        assert!(store.revoke(&url));
        assert!(store.get(&url).is_none());
        assert!(!store.revoke(&url)); // already revoked
        assert!(store.is_empty());
    }
}
