//! Access to the live document of the tab a snapshot is taken from.

use async_trait::async_trait;
use webexport_core::Result;

/// Read-only view of a live page, evaluated inside the tab.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Full markup of the document's root element (`outerHTML`).
    async fn document_html(&self) -> Result<String>;

    /// Base URI relative sources are resolved against.
    async fn base_url(&self) -> Result<String>;

    /// Text of every parsed rule of the loaded stylesheet with this absolute
    /// `href`. `None` when no such stylesheet is loaded or its rules are not
    /// readable from the page.
    async fn stylesheet_rules(&self, href: &str) -> Result<Option<Vec<String>>>;
}
