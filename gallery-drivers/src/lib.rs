//! Driver layer for browser automation.
//!
//! This crate exposes one long-lived WebDriver session and scoped tabs used
//! to render pages whose content only appears after scripts run.
//!
//! - [`browser::session::BrowserSession`]: WebDriver client wrapper, launched once per run
//! - [`browser::tab::BrowserTab`]: a single tab with navigation and DOM helpers
//! - [`browser::stealth`]: Chrome arguments and JS evasions
pub mod browser;
