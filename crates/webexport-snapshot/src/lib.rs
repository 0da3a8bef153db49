//! Page snapshot routine. Turns a live page into one self-contained HTML
//! document and from there into a Word-compatible blob.
//!
//! The routine is bound to a tab through [`PageContext`]; network access goes
//! through [`Fetcher`] so both can be swapped out in tests.

pub mod agent;
pub mod blob;
pub mod docx;
pub mod fetch;
pub mod page;
mod serialize;
pub mod snapshot;

pub use agent::PageAgent;
pub use blob::{Blob, BlobStore};
pub use docx::{AltChunkConverter, DocumentConverter, Margins, Orientation, PageSetup, DOCX_MIME};
pub use fetch::{FetchedResource, Fetcher, HttpFetcher};
pub use page::PageContext;
pub use snapshot::{capture, Snapshot, SnapshotWarning};
