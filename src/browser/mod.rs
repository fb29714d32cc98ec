//! Chrome-backed pages
//!
//! [`BrowserSession`] launches or attaches to a browser through headless_chrome,
//! and [`ChromePage`] exposes one of its tabs through the [`Page`](crate::dom::Page)
//! trait so every locator works against live documents.

pub mod chrome;
pub mod config;
pub mod session;

pub use chrome::{ChromePage, MUTATION_POLL_INTERVAL};
pub use config::{ConnectionOptions, LaunchOptions};
pub use session::BrowserSession;
