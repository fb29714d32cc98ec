use crate::dom::element::NodeId;
use crate::dom::page::Page;
use crate::error::Result;

/// Filter applied to candidate elements
pub type ElementPredicate<'a> = &'a (dyn Fn(NodeId) -> bool + 'a);

/// Restrictions for a point query
#[derive(Clone, Copy, Default)]
pub struct PointOptions<'a> {
    /// Only elements painted in front of this one are returned
    pub context: Option<NodeId>,
    pub predicate: Option<ElementPredicate<'a>>,
}

impl<'a> PointOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn within(mut self, context: NodeId) -> Self {
        self.context = Some(context);
        self
    }

    pub fn matching(mut self, predicate: ElementPredicate<'a>) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

impl std::fmt::Debug for PointOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointOptions")
            .field("context", &self.context)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Elements stacked at `(x, y)`, front-most first.
///
/// With a context the stack is cut at the context element, which is excluded.
/// A context missing from the stack yields nothing.
pub fn select_all_at_point<P: Page + ?Sized>(page: &P, x: f64, y: f64, options: &PointOptions<'_>) -> Result<Vec<NodeId>> {
    let mut stack = page.elements_from_point(x, y)?;

    if let Some(context) = options.context {
        match stack.iter().position(|e| *e == context) {
            Some(index) => stack.truncate(index),
            None => return Ok(Vec::new()),
        }
    }

    if let Some(predicate) = options.predicate {
        stack.retain(|e| predicate(*e));
    }

    Ok(stack)
}

/// Front-most element at `(x, y)` passing the options
pub fn select_at_point<P: Page + ?Sized>(page: &P, x: f64, y: f64, options: &PointOptions<'_>) -> Result<Option<NodeId>> {
    Ok(select_all_at_point(page, x, y, options)?.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, ElementNode, Viewport};
    use crate::dom::locate::locate;

    fn layered() -> Document {
        Document::with_body(
            Viewport::new(400.0, 300.0),
            vec![
                ElementNode::new("div")
                    .with_id("panel")
                    .with_bounding_box(0.0, 0.0, 200.0, 200.0)
                    .with_child(
                        ElementNode::new("button")
                            .with_id("ok")
                            .with_bounding_box(10.0, 10.0, 50.0, 20.0),
                    ),
                ElementNode::new("div")
                    .with_id("overlay")
                    .with_z_index(5)
                    .with_bounding_box(150.0, 0.0, 100.0, 100.0),
                ElementNode::new("aside")
                    .with_id("side")
                    .with_bounding_box(300.0, 0.0, 100.0, 300.0),
            ],
        )
    }

    fn ids(doc: &Document, nodes: &[NodeId]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| {
                doc.attribute(*n, "id")
                    .unwrap()
                    .unwrap_or_else(|| doc.tag_name(*n).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_stack_front_to_back() {
        let doc = layered();
        let stack = select_all_at_point(&doc, 20.0, 15.0, &PointOptions::new()).unwrap();
        assert_eq!(ids(&doc, &stack), vec!["ok", "panel", "body", "html"]);
    }

    #[test]
    fn test_z_index_wins_over_paint_order() {
        let doc = layered();
        let front = select_at_point(&doc, 160.0, 50.0, &PointOptions::new()).unwrap();
        assert_eq!(ids(&doc, &[front.unwrap()]), vec!["overlay"]);
    }

    #[test]
    fn test_context_truncates_stack() {
        let doc = layered();
        let panel = locate(&doc, "#panel", None).unwrap().unwrap();
        let options = PointOptions::new().within(panel);
        let stack = select_all_at_point(&doc, 20.0, 15.0, &options).unwrap();
        assert_eq!(ids(&doc, &stack), vec!["ok"]);
    }

    #[test]
    fn test_context_not_in_stack_is_empty() {
        let doc = layered();
        let side = locate(&doc, "#side", None).unwrap().unwrap();
        let options = PointOptions::new().within(side);
        assert!(select_all_at_point(&doc, 20.0, 15.0, &options).unwrap().is_empty());
        assert_eq!(select_at_point(&doc, 20.0, 15.0, &options).unwrap(), None);
    }

    #[test]
    fn test_predicate_filters() {
        let doc = layered();
        let is_div = |n: NodeId| doc.tag_name(n).map(|t| t == "div").unwrap_or(false);
        let options = PointOptions::new().matching(&is_div);
        let found = select_at_point(&doc, 20.0, 15.0, &options).unwrap();
        assert_eq!(ids(&doc, &[found.unwrap()]), vec!["panel"]);
    }

    #[test]
    fn test_outside_viewport_is_empty() {
        let doc = layered();
        assert!(select_all_at_point(&doc, -5.0, 10.0, &PointOptions::new()).unwrap().is_empty());
    }
}
