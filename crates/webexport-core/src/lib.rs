//! Shared configuration, error taxonomy and cross-context messages.

pub mod config;
pub mod error;
pub mod messages;

pub use config::WebExportConfig;
pub use error::{Error, Result};
pub use messages::*;
