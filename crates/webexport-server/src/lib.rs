//! WebExport background server. Exports the active browser tab as a Word
//! document or a PDF on request from the popup client.

pub mod popup;
pub mod routes;
pub mod state;

pub use popup::HttpBackground;
pub use routes::build_router;
pub use state::AppState;
