use crate::dom::css::SelectorList;
use crate::dom::element::{BoundingBox, ElementNode, NodeId, Viewport};
use crate::dom::page::{MUTATION_CHANNEL_CAPACITY, MutationBatch, MutationRecord, Page};
use crate::dom::xpath::XPath;
use crate::error::{DomesticatedError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Tags whose text never renders
const NON_RENDERED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Read access to an element tree, shared by the CSS and XPath evaluators
pub(crate) trait TreeView {
    fn root(&self) -> NodeId;
    fn tag(&self, node: NodeId) -> &str;
    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;
    fn own_text(&self, node: NodeId) -> Option<&str>;
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
    fn children_of(&self, node: NodeId) -> &[NodeId];

    /// `node` and everything below it, in document order
    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children_of(current).iter().rev());
        }
        out
    }

    /// Concatenated text of the subtree
    fn text_content(&self, node: NodeId) -> String {
        self.subtree(node)
            .into_iter()
            .filter_map(|n| self.own_text(n))
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    tag_name: String,
    attributes: HashMap<String, String>,
    text: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    bounding_box: Option<BoundingBox>,
    z_index: i32,
}

#[derive(Debug)]
struct DocumentTree {
    nodes: HashMap<NodeId, NodeData>,
    root: NodeId,
    body: NodeId,
    next_id: u64,
    viewport: Viewport,
}

impl DocumentTree {
    fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes
            .get(&id)
            .ok_or_else(|| DomesticatedError::ElementNotFound(format!("No element {}", id)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| DomesticatedError::ElementNotFound(format!("No element {}", id)))
    }

    fn allocate(&mut self, node: &ElementNode, parent: Option<NodeId>) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            NodeData {
                tag_name: node.tag_name.to_ascii_lowercase(),
                attributes: node.attributes.clone(),
                text: node.text_content.clone(),
                parent,
                children: Vec::new(),
                bounding_box: node.bounding_box,
                z_index: node.z_index,
            },
        );
        id
    }

    /// Insert `node` with its subtree under `parent` at `position`
    fn insert_subtree(&mut self, parent: NodeId, position: usize, node: &ElementNode) -> Result<NodeId> {
        self.node(parent)?;
        let id = self.allocate(node, Some(parent));
        let siblings = &mut self.node_mut(parent)?.children;
        let position = position.min(siblings.len());
        siblings.insert(position, id);

        let mut pending = vec![(id, node)];
        while let Some((owner, description)) = pending.pop() {
            for child in &description.children {
                let child_id = self.allocate(child, Some(owner));
                self.node_mut(owner)?.children.push(child_id);
                pending.push((child_id, child));
            }
        }
        Ok(id)
    }

    fn detach(&mut self, id: NodeId) -> Result<NodeId> {
        let parent = self
            .node(id)?
            .parent
            .ok_or_else(|| DomesticatedError::ElementNotFound("The root element cannot be removed".to_string()))?;
        self.node_mut(parent)?.children.retain(|c| *c != id);
        for node in self.subtree(id) {
            self.nodes.remove(&node);
        }
        Ok(parent)
    }

    fn is_in_body(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.body {
                return true;
            }
            current = self.parent_of(node);
        }
        false
    }

    /// Stacking layer: the nearest non-zero z-index on the ancestor-or-self chain
    fn effective_z_index(&self, id: NodeId) -> i32 {
        let mut current = Some(id);
        while let Some(node) = current {
            match self.nodes.get(&node) {
                Some(data) if data.z_index != 0 => return data.z_index,
                Some(data) => current = data.parent,
                None => break,
            }
        }
        0
    }

    fn inner_text(&self, id: NodeId) -> Result<String> {
        self.node(id)?;
        let mut parts = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let data = self.node(current)?;
            if NON_RENDERED_TAGS.contains(&data.tag_name.as_str()) {
                continue;
            }
            if let Some(text) = data.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                parts.push(text.to_string());
            }
            stack.extend(data.children.iter().rev());
        }
        Ok(parts.join(" "))
    }
}

impl TreeView for DocumentTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn tag(&self, node: NodeId) -> &str {
        self.nodes.get(&node).map(|n| n.tag_name.as_str()).unwrap_or("")
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(&node)?.attributes.get(name).map(String::as_str)
    }

    fn own_text(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(&node)?.text.as_deref()
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node)?.parent
    }

    fn children_of(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(&node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }
}

/// In-memory document with layout boxes and mutation notifications
///
/// The document starts as `html > body`, both covering the viewport. Every
/// mutating call under `body` is delivered to subscribers as one
/// [`MutationBatch`].
pub struct Document {
    tree: RwLock<DocumentTree>,
    mutations: broadcast::Sender<MutationBatch>,
}

impl Document {
    /// Create an empty document
    pub fn new(viewport: Viewport) -> Self {
        let mut tree = DocumentTree {
            nodes: HashMap::new(),
            root: NodeId(0),
            body: NodeId(0),
            next_id: 0,
            viewport,
        };
        let full = viewport.as_box();
        let root = tree.allocate(&ElementNode::new("html").with_bounding_box(full.x, full.y, full.width, full.height), None);
        let body_node = ElementNode::new("body").with_bounding_box(full.x, full.y, full.width, full.height);
        let body = tree.allocate(&body_node, Some(root));
        if let Some(data) = tree.nodes.get_mut(&root) {
            data.children.push(body);
        }
        tree.root = root;
        tree.body = body;

        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        Self {
            tree: RwLock::new(tree),
            mutations,
        }
    }

    /// Create a document whose body holds `children`, without notifying anyone
    pub fn with_body(viewport: Viewport, children: Vec<ElementNode>) -> Self {
        let document = Self::new(viewport);
        {
            let mut tree = document.tree.write();
            let body = tree.body;
            for (position, child) in children.iter().enumerate() {
                // body always exists, so insertion cannot fail
                let _ = tree.insert_subtree(body, position, child);
            }
        }
        document
    }

    /// The `html` element
    pub fn root(&self) -> NodeId {
        self.tree.read().root
    }

    /// The `body` element
    pub fn body(&self) -> NodeId {
        self.tree.read().body
    }

    /// Append one subtree to `parent`
    pub fn append_child(&self, parent: NodeId, node: ElementNode) -> Result<NodeId> {
        let mut ids = self.append_children(parent, vec![node])?;
        Ok(ids.remove(0))
    }

    /// Append several subtrees to `parent`, delivered as a single batch
    pub fn append_children(&self, parent: NodeId, nodes: Vec<ElementNode>) -> Result<Vec<NodeId>> {
        let (ids, notify) = {
            let mut tree = self.tree.write();
            let mut ids = Vec::with_capacity(nodes.len());
            for node in &nodes {
                let end = tree.children_of(parent).len();
                ids.push(tree.insert_subtree(parent, end, node)?);
            }
            (ids, tree.is_in_body(parent))
        };
        if notify {
            self.emit(MutationRecord {
                target: parent,
                added_nodes: ids.clone(),
                removed_nodes: vec![],
            });
        }
        Ok(ids)
    }

    /// Remove an element and its subtree
    pub fn remove(&self, node: NodeId) -> Result<()> {
        let (parent, notify) = {
            let mut tree = self.tree.write();
            let parent = tree.detach(node)?;
            (parent, tree.is_in_body(parent))
        };
        if notify {
            self.emit(MutationRecord {
                target: parent,
                added_nodes: vec![],
                removed_nodes: vec![node],
            });
        }
        Ok(())
    }

    /// Move an element's layout box
    pub fn set_bounding_box(&self, node: NodeId, bounding_box: BoundingBox) -> Result<()> {
        self.tree.write().node_mut(node)?.bounding_box = Some(bounding_box);
        Ok(())
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.tree.write().viewport = viewport;
    }

    /// Total number of elements, including `html` and `body`
    pub fn count_elements(&self) -> usize {
        self.tree.read().nodes.len()
    }

    /// Number of live mutation subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.mutations.receiver_count()
    }

    fn emit(&self, record: MutationRecord) {
        // No subscribers is not an error
        let _ = self.mutations.send(MutationBatch::new(vec![record]));
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl Page for Document {
    fn query_css(&self, selector: &str, context: Option<NodeId>) -> Result<Vec<NodeId>> {
        let list = SelectorList::parse(selector)?;
        let tree = self.tree.read();
        let candidates = match context {
            Some(element) => {
                tree.node(element)?;
                tree.subtree(element).into_iter().skip(1).collect::<Vec<_>>()
            }
            None => tree.subtree(tree.root),
        };
        Ok(candidates
            .into_iter()
            .filter(|node| list.matches(&*tree, *node))
            .collect())
    }

    fn query_xpath(&self, expression: &str, context: Option<NodeId>) -> Result<Vec<NodeId>> {
        let xpath = XPath::parse(expression)?;
        let tree = self.tree.read();
        if let Some(element) = context {
            tree.node(element)?;
        }
        Ok(xpath.evaluate(&*tree, context))
    }

    fn elements_from_point(&self, x: f64, y: f64) -> Result<Vec<NodeId>> {
        let tree = self.tree.read();
        let mut hits: Vec<(i32, usize, NodeId)> = tree
            .subtree(tree.root)
            .into_iter()
            .enumerate()
            .filter(|(_, node)| {
                tree.nodes
                    .get(node)
                    .and_then(|data| data.bounding_box)
                    .is_some_and(|bbox| bbox.contains(x, y))
            })
            .map(|(order, node)| (tree.effective_z_index(node), order, node))
            .collect();
        // Higher layer first, then later paint order first
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        Ok(hits.into_iter().map(|(_, _, node)| node).collect())
    }

    fn bounding_box(&self, element: NodeId) -> Result<BoundingBox> {
        let tree = self.tree.read();
        Ok(tree
            .node(element)?
            .bounding_box
            .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0)))
    }

    fn viewport(&self) -> Result<Viewport> {
        Ok(self.tree.read().viewport)
    }

    fn parent(&self, element: NodeId) -> Result<Option<NodeId>> {
        Ok(self.tree.read().node(element)?.parent)
    }

    fn children(&self, element: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.tree.read().node(element)?.children.clone())
    }

    fn tag_name(&self, element: NodeId) -> Result<String> {
        Ok(self.tree.read().node(element)?.tag_name.clone())
    }

    fn attribute(&self, element: NodeId, name: &str) -> Result<Option<String>> {
        Ok(self.tree.read().node(element)?.attributes.get(name).cloned())
    }

    fn inner_text(&self, element: NodeId) -> Result<String> {
        self.tree.read().inner_text(element)
    }

    fn insert_after(&self, reference: NodeId, node: ElementNode) -> Result<NodeId> {
        let (parent, id, notify) = {
            let mut tree = self.tree.write();
            let parent = tree
                .node(reference)?
                .parent
                .ok_or_else(|| DomesticatedError::ElementNotFound(format!("{} has no parent", reference)))?;
            let position = tree
                .children_of(parent)
                .iter()
                .position(|c| *c == reference)
                .map_or(0, |p| p + 1);
            let id = tree.insert_subtree(parent, position, &node)?;
            (parent, id, tree.is_in_body(parent))
        };
        if notify {
            self.emit(MutationRecord {
                target: parent,
                added_nodes: vec![id],
                removed_nodes: vec![],
            });
        }
        Ok(id)
    }

    fn subscribe_mutations(&self) -> broadcast::Receiver<MutationBatch> {
        self.mutations.subscribe()
    }
}
