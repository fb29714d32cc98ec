//! # domesticated
//!
//! A toolkit for locating elements in web pages, plus a chat layer that keeps
//! multi-turn threads and summarizes page text through a chat completion API.
//!
//! ## Features
//!
//! - **Element location**: CSS and XPath behind one call, waiting for elements to appear,
//!   searching outward through an element's family, hit-testing and directional navigation
//! - **Element watches**: selector handlers re-run whenever elements are added to the page
//! - **Chat threads**: conversations persisted in a flat key-value store
//! - **Page summaries**: summarize a wiki article's first paragraph and insert the result after it
//!
//! ## Locating Elements
//!
//! Every locator works against the [`Page`] trait. [`Document`] is an in-memory page,
//! [`ChromePage`] a live browser tab.
//!
//! ```rust
//! use domesticated::dom::{Document, ElementNode, Viewport, locate, select_at_point, PointOptions};
//!
//! # fn main() -> domesticated::Result<()> {
//! let doc = Document::with_body(
//!     Viewport::new(800.0, 600.0),
//!     vec![ElementNode::new("button").with_id("ok").with_bounding_box(10.0, 10.0, 80.0, 30.0)],
//! );
//!
//! // Selectors starting with `/` are XPath
//! let by_css = locate(&doc, "#ok", None)?;
//! let by_xpath = locate(&doc, "//button[@id='ok']", None)?;
//! assert_eq!(by_css, by_xpath);
//!
//! assert_eq!(select_at_point(&doc, 20.0, 20.0, &PointOptions::new())?, by_css);
//! # Ok(())
//! # }
//! ```
//!
//! ## Summarizing a Page
//!
//! ```rust,no_run
//! use domesticated::{Background, BrowserSession, Config, FileStorage, LaunchOptions};
//! use domesticated::scripts::inject_summary;
//! use std::sync::Arc;
//!
//! # async fn run() -> domesticated::Result<()> {
//! let config = Config::from_env()?;
//! let storage = Arc::new(FileStorage::open(&config.storage_dir)?);
//! let background = Background::new(config, storage);
//! background.set_key("sk-...");
//!
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let page = session.open("https://en.wikipedia.org/wiki/Rust_(programming_language)")?;
//! inject_summary(&page, &background).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`dom`]: page abstraction, in-memory document and the element locators
//! - [`browser`]: Chrome sessions and the browser-backed page
//! - [`chat`]: chat messages, thread storage and the completion client
//! - [`bridge`]: typed request/response surface over the chat client
//! - [`scripts`]: page scripts built from the above
//! - [`config`]: runtime configuration
//! - [`error`]: error types and result aliases

pub mod bridge;
pub mod browser;
pub mod chat;
pub mod config;
pub mod debounce;
pub mod dom;
pub mod error;
pub mod ids;
pub mod scripts;

pub use bridge::{Background, BridgeRequest, BridgeResponse};
pub use browser::{BrowserSession, ChromePage, ConnectionOptions, LaunchOptions};
pub use chat::{ChatClient, ChatMessage, ChatMessageThread, ChatThreadStore, FileStorage, KeyValueStorage, MemoryStorage, Role};
pub use config::Config;
pub use dom::{BoundingBox, Document, ElementNode, ElementRancher, NodeId, Page, PageContext, Viewport};
pub use error::{DomesticatedError, Result};
pub use ids::{IdGenerator, MAX_SAFE_INTEGER, next_global_id};
