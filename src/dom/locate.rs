use crate::dom::element::NodeId;
use crate::dom::page::{MutationBatch, Page};
use crate::error::{DomesticatedError, Result};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Fixed budget for [`await_element`]
pub const ELEMENT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a selector string is evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    /// Any selector starting with `/`
    XPath(String),
}

impl Selector {
    pub fn parse(selector: &str) -> Self {
        if selector.starts_with('/') {
            Selector::XPath(selector.to_string())
        } else {
            Selector::Css(selector.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }

    pub fn is_xpath(&self) -> bool {
        matches!(self, Selector::XPath(_))
    }
}

impl From<&str> for Selector {
    fn from(selector: &str) -> Self {
        Selector::parse(selector)
    }
}

/// First element matching `selector` under `context`, or `None`
pub fn locate<P: Page + ?Sized>(page: &P, selector: &str, context: Option<NodeId>) -> Result<Option<NodeId>> {
    Ok(locate_all(page, selector, context)?.into_iter().next())
}

/// Every element matching `selector` under `context`, in document order
pub fn locate_all<P: Page + ?Sized>(page: &P, selector: &str, context: Option<NodeId>) -> Result<Vec<NodeId>> {
    match Selector::parse(selector) {
        Selector::XPath(expression) => page.query_xpath(&expression, context),
        Selector::Css(css) => page.query_css(&css, context),
    }
}

/// Resolve once `selector` matches, watching body mutations for up to
/// [`ELEMENT_WAIT_TIMEOUT`].
///
/// An element that already exists is returned on the first poll. The mutation
/// subscription is released on every exit path.
pub async fn await_element<P: Page + ?Sized>(page: &P, selector: &str, context: Option<NodeId>) -> Result<NodeId> {
    log::debug!("await_element {}", selector);
    // Subscribe before the first check so an insertion in between is not missed
    let mut mutations = page.subscribe_mutations();

    if let Some(found) = locate(page, selector, context)? {
        log::debug!("found element for {}", selector);
        return Ok(found);
    }

    match tokio::time::timeout(ELEMENT_WAIT_TIMEOUT, watch_for(page, selector, context, &mut mutations)).await {
        Ok(result) => result,
        Err(_) => {
            log::debug!("await_element timeout on {}", selector);
            Err(DomesticatedError::Timeout(selector.to_string()))
        }
    }
}

async fn watch_for<P: Page + ?Sized>(
    page: &P,
    selector: &str,
    context: Option<NodeId>,
    mutations: &mut broadcast::Receiver<MutationBatch>,
) -> Result<NodeId> {
    loop {
        match mutations.recv().await {
            Ok(batch) if !batch.has_additions() => continue,
            Ok(_) | Err(RecvError::Lagged(_)) => {
                if let Some(found) = locate(page, selector, context)? {
                    log::debug!("found element for {}", selector);
                    return Ok(found);
                }
            }
            Err(RecvError::Closed) => {
                return Err(DomesticatedError::ElementNotFound(format!(
                    "Page closed while waiting for '{}'",
                    selector
                )));
            }
        }
    }
}

/// Depth-first search outward from `start`: the start element, its subtree,
/// then each ancestor with the subtrees not yet visited.
pub fn find_in_family<P, F>(page: &P, start: NodeId, mut predicate: F) -> Result<Option<NodeId>>
where
    P: Page + ?Sized,
    F: FnMut(NodeId) -> bool,
{
    let mut visited = HashSet::new();
    let mut anchor = Some(start);

    while let Some(current) = anchor {
        let mut stack = vec![current];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if predicate(node) {
                log::debug!("found node {} in family of {}", node, start);
                return Ok(Some(node));
            }
            stack.extend(page.children(node)?.into_iter().rev());
        }
        anchor = page.parent(current)?;
    }

    Ok(None)
}
