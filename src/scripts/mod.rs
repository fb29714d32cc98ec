//! Scripts run against a page once it has loaded

pub mod text_extraction;

pub use text_extraction::{FIRST_PARAGRAPH_SELECTOR, SUMMARY_STYLE, inject_summary};
