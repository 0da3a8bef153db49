//! Error types for webexport.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Script injection failed: {0}")]
    Injection(String),

    #[error("Message sending failed: {0}")]
    Messaging(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Debugger error: {0}")]
    Debugger(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
