use crate::dom::{BoundingBox, ElementNode, MutationBatch, NodeId, Page, Viewport, page::MUTATION_CHANNEL_CAPACITY};
use crate::error::{DomesticatedError, Result};
use headless_chrome::Tab;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::sync::broadcast;

/// Installs `window.__domesticated` once per document
const PAGE_HELPER: &str = include_str!("page_helper.js");

/// How often queued mutation records are pulled out of the page
pub const MUTATION_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Deserialize)]
#[serde(untagged)]
enum Outcome<T> {
    Failed { error: String },
    Done { ok: T },
}

/// Evaluate `expression` against the page helper and decode its JSON result
fn evaluate_json<T: DeserializeOwned>(tab: &Tab, expression: &str) -> Result<T> {
    let script = format!(
        "{helper}\n(() => {{ try {{ return JSON.stringify({{ ok: ({expression}) ?? null }}); }} \
         catch (e) {{ return JSON.stringify({{ error: String(e && e.message ? e.message : e) }}); }} }})()",
        helper = PAGE_HELPER,
        expression = expression,
    );

    let result = tab
        .evaluate(&script, false)
        .map_err(|e| DomesticatedError::EvaluationFailed(e.to_string()))?;

    let json_value = result
        .value
        .ok_or_else(|| DomesticatedError::EvaluationFailed("No value returned from page".to_string()))?;

    // The script returns a JSON string, so it is decoded twice
    let json_str: String = serde_json::from_value(json_value)?;
    match serde_json::from_str::<Outcome<T>>(&json_str)? {
        Outcome::Done { ok } => Ok(ok),
        Outcome::Failed { error } => Err(DomesticatedError::EvaluationFailed(error)),
    }
}

fn js<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// A live browser tab seen through the [`Page`] trait
///
/// Element handles come from an id table kept inside the page; they are
/// invalidated by navigation. Mutation batches are drained from the page by a
/// background thread every [`MUTATION_POLL_INTERVAL`].
pub struct ChromePage {
    tab: Arc<Tab>,
    mutations: broadcast::Sender<MutationBatch>,
    stop: Arc<AtomicBool>,
}

impl ChromePage {
    /// Wrap `tab`, install the page helper and start draining mutations
    pub fn attach(tab: Arc<Tab>) -> Result<Self> {
        evaluate_json::<bool>(&tab, "true")?;

        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));

        let poll_tab = tab.clone();
        let poll_sender = mutations.clone();
        let poll_stop = stop.clone();
        thread::Builder::new()
            .name("domesticated-mutations".to_string())
            .spawn(move || poll_mutations(poll_tab, poll_sender, poll_stop))
            .map_err(|e| DomesticatedError::Runtime(format!("Failed to start mutation poller: {}", e)))?;

        log::debug!("Attached to tab {}", tab.get_target_id());
        Ok(Self { tab, mutations, stop })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Navigate and wait for the load to finish
    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| DomesticatedError::NavigationFailed(format!("Failed to navigate to {}: {}", url, e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| DomesticatedError::NavigationFailed(format!("Navigation timeout: {}", e)))?;
        evaluate_json::<bool>(&self.tab, "true")?;
        Ok(())
    }

    /// Scroll the window to the bottom of the body
    pub fn scroll_to_bottom(&self) -> Result<()> {
        self.call::<bool>("window.__domesticated.scrollToBottom()")?;
        Ok(())
    }

    fn call<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        evaluate_json(&self.tab, expression)
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollAction {
    /// Forward queued batches to subscribers
    Drain,
    /// Drop queued records without assigning handles
    Discard,
}

impl PollAction {
    /// Nobody listening means the queue is emptied and thrown away, so a later
    /// subscriber never receives batches from before it subscribed.
    fn for_receivers(receivers: usize) -> Self {
        if receivers == 0 {
            PollAction::Discard
        } else {
            PollAction::Drain
        }
    }
}

fn poll_mutations(tab: Arc<Tab>, sender: broadcast::Sender<MutationBatch>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(MUTATION_POLL_INTERVAL);
        let result = match PollAction::for_receivers(sender.receiver_count()) {
            PollAction::Discard => {
                evaluate_json::<usize>(&tab, "window.__domesticated.discard()").map(|dropped| {
                    if dropped > 0 {
                        log::trace!("Discarded {} unobserved mutation batches", dropped);
                    }
                })
            }
            PollAction::Drain => {
                evaluate_json::<Vec<MutationBatch>>(&tab, "window.__domesticated.drain()").map(|batches| {
                    for batch in batches {
                        let _ = sender.send(batch);
                    }
                })
            }
        };
        // Expected while a navigation is in flight
        if let Err(e) = result {
            log::debug!("Mutation poll failed: {}", e);
        }
    }
    log::debug!("Mutation poller stopped");
}

impl Page for ChromePage {
    fn query_css(&self, selector: &str, context: Option<NodeId>) -> Result<Vec<NodeId>> {
        let expression = format!("window.__domesticated.css({}, {})", js(&selector)?, js(&context)?);
        self.call(&expression).map_err(|e| match e {
            DomesticatedError::EvaluationFailed(reason) => DomesticatedError::invalid_selector(selector, reason),
            other => other,
        })
    }

    fn query_xpath(&self, expression: &str, context: Option<NodeId>) -> Result<Vec<NodeId>> {
        let call = format!("window.__domesticated.xpath({}, {})", js(&expression)?, js(&context)?);
        self.call(&call).map_err(|e| match e {
            DomesticatedError::EvaluationFailed(reason) => DomesticatedError::invalid_selector(expression, reason),
            other => other,
        })
    }

    fn elements_from_point(&self, x: f64, y: f64) -> Result<Vec<NodeId>> {
        self.call(&format!("window.__domesticated.fromPoint({}, {})", x, y))
    }

    fn bounding_box(&self, element: NodeId) -> Result<BoundingBox> {
        self.call(&format!("window.__domesticated.rect({})", element.0))
    }

    fn viewport(&self) -> Result<Viewport> {
        self.call("window.__domesticated.viewport()")
    }

    fn parent(&self, element: NodeId) -> Result<Option<NodeId>> {
        self.call(&format!("window.__domesticated.parent({})", element.0))
    }

    fn children(&self, element: NodeId) -> Result<Vec<NodeId>> {
        self.call(&format!("window.__domesticated.children({})", element.0))
    }

    fn tag_name(&self, element: NodeId) -> Result<String> {
        self.call(&format!("window.__domesticated.tag({})", element.0))
    }

    fn attribute(&self, element: NodeId, name: &str) -> Result<Option<String>> {
        self.call(&format!("window.__domesticated.attr({}, {})", element.0, js(&name)?))
    }

    fn inner_text(&self, element: NodeId) -> Result<String> {
        self.call(&format!("window.__domesticated.text({})", element.0))
    }

    fn insert_after(&self, reference: NodeId, node: ElementNode) -> Result<NodeId> {
        self.call(&format!("window.__domesticated.insertAfter({}, {})", reference.0, js(&node)?))
    }

    fn subscribe_mutations(&self) -> broadcast::Receiver<MutationBatch> {
        self.mutations.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_decoding() {
        let done: Outcome<Vec<NodeId>> = serde_json::from_str(r#"{"ok":[1,2]}"#).unwrap();
        assert!(matches!(done, Outcome::Done { ok } if ok == vec![NodeId(1), NodeId(2)]));

        let missing: Outcome<Option<NodeId>> = serde_json::from_str(r#"{"ok":null}"#).unwrap();
        assert!(matches!(missing, Outcome::Done { ok: None }));

        let failed: Outcome<Vec<NodeId>> = serde_json::from_str(r#"{"error":"bad selector"}"#).unwrap();
        assert!(matches!(failed, Outcome::Failed { error } if error == "bad selector"));
    }

    #[test]
    fn test_js_literals() {
        assert_eq!(js(&"a'b\"c").unwrap(), r#""a'b\"c""#);
        assert_eq!(js(&None::<NodeId>).unwrap(), "null");
        assert_eq!(js(&Some(NodeId(7))).unwrap(), "7");
    }

    #[test]
    fn test_helper_exposes_page_operations() {
        for name in [
            "css(",
            "xpath(",
            "fromPoint(",
            "rect(",
            "insertAfter(",
            "drain(",
            "discard(",
            "scrollToBottom(",
        ] {
            assert!(PAGE_HELPER.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_unobserved_mutations_are_discarded() {
        assert_eq!(PollAction::for_receivers(0), PollAction::Discard);
        assert_eq!(PollAction::for_receivers(1), PollAction::Drain);
        assert_eq!(PollAction::for_receivers(3), PollAction::Drain);
    }

    #[test]
    fn test_helper_holds_elements_weakly() {
        assert!(PAGE_HELPER.contains("new WeakRef(el)"));
        assert!(PAGE_HELPER.contains("FinalizationRegistry"));
        // Observer callbacks queue raw records; no handle is assigned there
        let observer = &PAGE_HELPER[PAGE_HELPER.find("new MutationObserver").unwrap()..];
        let callback = &observer[..observer.find(".observe(").unwrap()];
        assert!(!callback.contains("idOf("));
    }
}
