//! Runtime: the background controller that drives exports, and the popup
//! controller that requests them.
//!
//! Browser capabilities (script injection, tab messaging, the debugger, the
//! download facility) are reached through the traits in [`host`], so the
//! controllers run unchanged against CDP or against test doubles.

pub mod background;
pub mod downloads;
pub mod host;
pub mod popup;
pub mod revoke;
pub mod types;

pub use background::{BackgroundController, ExportOutcome};
pub use downloads::{DirectoryPrompt, FileDownloads, SavePrompt};
pub use host::{Debugger, Downloads, TabDirectory, TabHost};
pub use popup::{BackgroundChannel, PopupController, PopupStatus};
pub use revoke::PendingRevocations;
pub use types::*;
