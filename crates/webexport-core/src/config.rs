//! Configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_PORT: u16 = 3004;
const DEFAULT_CDP_URL: &str = "http://127.0.0.1:9222";
const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Top-level webexport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebExportConfig {
    /// Background server port.
    pub port: u16,
    /// Chromium remote debugging endpoint (`http://host:port`).
    pub cdp_url: String,
    /// Directory exported files are saved into.
    pub download_dir: PathBuf,
    /// Timeout for stylesheet and image fetches during a snapshot.
    pub fetch_timeout: Duration,
    /// Where the popup reaches the background server.
    pub server_url: String,
}

impl Default for WebExportConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cdp_url: DEFAULT_CDP_URL.to_string(),
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            server_url: format!("http://127.0.0.1:{}", DEFAULT_PORT),
        }
    }
}

impl WebExportConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        let fetch_timeout = match lookup("WEBEXPORT_FETCH_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| {
                Error::Config(format!("invalid WEBEXPORT_FETCH_TIMEOUT_SECS: {}", raw))
            })?),
            None => Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        };

        let cdp_url = lookup("WEBEXPORT_CDP_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_CDP_URL.to_string());

        Ok(Self {
            port,
            cdp_url,
            download_dir: lookup("WEBEXPORT_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            fetch_timeout,
            server_url: lookup("WEBEXPORT_SERVER_URL")
                .unwrap_or_else(|| format!("http://127.0.0.1:{}", port)),
        })
    }

    /// Create the download directory if it does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.download_dir)
    }
}
