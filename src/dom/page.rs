use crate::dom::element::{BoundingBox, ElementNode, NodeId, Viewport};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the mutation broadcast channel used by page implementations
pub const MUTATION_CHANNEL_CAPACITY: usize = 256;

/// One childList change observed under `body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Element whose children changed
    pub target: NodeId,
    #[serde(default)]
    pub added_nodes: Vec<NodeId>,
    #[serde(default)]
    pub removed_nodes: Vec<NodeId>,
}

/// Records delivered together, as a MutationObserver callback receives them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    pub fn new(records: Vec<MutationRecord>) -> Self {
        Self { records }
    }

    /// Whether any record added at least one element
    pub fn has_additions(&self) -> bool {
        self.records.iter().any(|r| !r.added_nodes.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A document the locator toolkit can query
///
/// Implementations are the in-memory [`Document`](crate::dom::Document) and the
/// browser-backed [`ChromePage`](crate::browser::ChromePage). Element handles are
/// only meaningful for the page that produced them.
pub trait Page: Send + Sync {
    /// All elements under `context` (default: whole document) matching a CSS selector, in document order
    fn query_css(&self, selector: &str, context: Option<NodeId>) -> Result<Vec<NodeId>>;

    /// Snapshot of the elements an XPath expression selects, in document order
    fn query_xpath(&self, expression: &str, context: Option<NodeId>) -> Result<Vec<NodeId>>;

    /// Element stack at a viewport point, front-most first
    fn elements_from_point(&self, x: f64, y: f64) -> Result<Vec<NodeId>>;

    fn bounding_box(&self, element: NodeId) -> Result<BoundingBox>;

    fn viewport(&self) -> Result<Viewport>;

    fn parent(&self, element: NodeId) -> Result<Option<NodeId>>;

    /// Child elements in document order
    fn children(&self, element: NodeId) -> Result<Vec<NodeId>>;

    /// Lowercase tag name
    fn tag_name(&self, element: NodeId) -> Result<String>;

    fn attribute(&self, element: NodeId, name: &str) -> Result<Option<String>>;

    /// Rendered text of the element's subtree
    fn inner_text(&self, element: NodeId) -> Result<String>;

    /// Insert a new element subtree as the next sibling of `reference`
    fn insert_after(&self, reference: NodeId, node: ElementNode) -> Result<NodeId>;

    /// Subscribe to childList mutations in the `body` subtree.
    /// Dropping the receiver ends the subscription.
    fn subscribe_mutations(&self) -> broadcast::Receiver<MutationBatch>;
}
