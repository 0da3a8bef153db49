//! Chrome DevTools Protocol backend.
//!
//! Talks to a browser started with `--remote-debugging-port`: tabs are the
//! page targets of `/json/list`, script injection binds a page agent to a
//! flat DevTools session on the tab, and the debugger attaches its own
//! session for `Page.printToPDF`.

pub mod browser;
pub mod cdp;
pub mod debugger;
pub mod host;
pub mod page;

pub use browser::{Browser, BrowserVersion, TabRegistry, TargetInfo};
pub use cdp::CdpConnection;
pub use debugger::CdpDebugger;
pub use host::CdpTabHost;
pub use page::CdpPage;
