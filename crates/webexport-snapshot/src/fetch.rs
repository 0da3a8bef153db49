//! Network access for the snapshot routine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use webexport_core::{Error, Result};

/// Body and content type of a successfully fetched resource.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Fetches page resources. Non-success statuses are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource>;
}

/// Credential-less HTTP fetcher backed by reqwest.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("{} returned {}", url, status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("Reading {} failed: {}", url, e)))?;

        debug!("Fetched {} ({} bytes)", url, body.len());

        Ok(FetchedResource {
            content_type,
            body: body.to_vec(),
        })
    }
}
