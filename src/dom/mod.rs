//! Element location toolkit
//!
//! Everything here works against the [`Page`] trait:
//! - [`Document`]: in-memory page with layout boxes, CSS/XPath evaluation and mutation batches
//! - [`locate`] / [`await_element`]: unified CSS and XPath lookup, optionally waiting for insertion
//! - [`find_in_family`]: outward depth-first search from an element
//! - [`select_at_point`] / [`search_direction`]: hit-testing and directional navigation
//! - [`ElementRancher`]: selector watches re-run on DOM additions

pub mod css;
pub mod direction;
pub mod document;
pub mod element;
pub mod locate;
pub mod page;
pub mod point;
pub mod rancher;
pub mod xpath;

pub use direction::{ArrowKeys, DEFAULT_MAX_DISTANCE, Direction, SearchOptions, find_element_below, search_direction};
pub use document::Document;
pub use element::{BoundingBox, ElementNode, NodeId, Viewport};
pub use locate::{ELEMENT_WAIT_TIMEOUT, Selector, await_element, find_in_family, locate, locate_all};
pub use page::{MutationBatch, MutationRecord, Page};
pub use point::{ElementPredicate, PointOptions, select_all_at_point, select_at_point};
pub use rancher::{ElementRancher, PageContext, RESCAN_QUIET_PERIOD, WatchHandler};
