use crate::bridge::Background;
use crate::dom::{ElementNode, NodeId, Page, await_element};
use crate::error::Result;

/// First rendered paragraph of a wiki article body
pub const FIRST_PARAGRAPH_SELECTOR: &str = "#mw-content-text > div > p:not(.mw-empty-elt)";

/// Inline style of the inserted summary paragraph
pub const SUMMARY_STYLE: &str = "background-color: rgba(0, 0, 0, 0.25)";

/// Wait for the article's first paragraph, summarize it and insert the
/// summary right after it. Returns the new paragraph.
pub async fn inject_summary<P: Page + ?Sized>(page: &P, background: &Background) -> Result<NodeId> {
    let paragraph = await_element(page, FIRST_PARAGRAPH_SELECTOR, None).await?;
    log::debug!("First paragraph found: {}", paragraph);

    let text = page.inner_text(paragraph)?;
    log::debug!("Extracted {} characters", text.len());

    let summary = background.summarize(&text).await?;
    log::info!("Summary received ({} characters)", summary.len());

    let node = ElementNode::new("p").with_attribute("style", SUMMARY_STYLE).with_text(summary);
    page.insert_after(paragraph, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::client::tests::{ScriptedApi, choice, reply};
    use crate::chat::{CREDENTIAL_KEY, CompletionApi, KeyValueStorage, MemoryStorage, Role};
    use crate::config::Config;
    use crate::dom::{Document, Viewport, locate_all};
    use crate::error::DomesticatedError;
    use std::sync::Arc;
    use std::time::Duration;

    fn article(paragraphs: Vec<ElementNode>) -> ElementNode {
        ElementNode::new("div")
            .with_id("mw-content-text")
            .with_child(ElementNode::new("div").with_children(paragraphs))
    }

    fn background(api: Arc<ScriptedApi>) -> Background {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(CREDENTIAL_KEY, "sk-test").unwrap();
        let connector = move |_: &Config, _: &str| -> Result<Box<dyn CompletionApi>> { Ok(Box::new(api.clone())) };
        Background::with_connector(Config::default(), storage, Box::new(connector))
    }

    #[tokio::test]
    async fn test_summary_inserted_after_first_paragraph() {
        let doc = Document::with_body(
            Viewport::default(),
            vec![article(vec![
                ElementNode::new("p").with_class("mw-empty-elt"),
                ElementNode::new("p").with_text("Rust is a systems programming language."),
                ElementNode::new("p").with_text("Second paragraph."),
            ])],
        );
        let api = ScriptedApi::replying(vec![reply(vec![choice(Role::Assistant, Some("A language."))])]);
        let background = background(api.clone());

        let inserted = inject_summary(&doc, &background).await.unwrap();

        assert_eq!(doc.inner_text(inserted).unwrap(), "A language.");
        assert_eq!(doc.attribute(inserted, "style").unwrap().as_deref(), Some(SUMMARY_STYLE));

        let texts: Vec<String> = locate_all(&doc, "#mw-content-text > div > p", None)
            .unwrap()
            .into_iter()
            .map(|p| doc.inner_text(p).unwrap())
            .collect();
        assert_eq!(texts, vec!["", "Rust is a systems programming language.", "A language.", "Second paragraph."]);

        let sent = &api.requests.lock()[0].messages[1].content;
        assert_eq!(sent, "Summarize this text: Rust is a systems programming language.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_paragraph_to_load() {
        let doc = Arc::new(Document::default());
        let writer = doc.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let body = writer.body();
            writer
                .append_child(body, article(vec![ElementNode::new("p").with_text("Late text.")]))
                .unwrap();
        });

        let api = ScriptedApi::replying(vec![reply(vec![choice(Role::Assistant, Some("Late."))])]);
        let inserted = inject_summary(&*doc, &background(api)).await.unwrap();
        assert_eq!(doc.inner_text(inserted).unwrap(), "Late.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_paragraph_times_out() {
        let doc = Document::default();
        let api = ScriptedApi::replying(vec![]);
        let result = inject_summary(&doc, &background(api.clone())).await;

        assert!(matches!(result, Err(DomesticatedError::Timeout(_))));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn test_summary_failure_leaves_page_untouched() {
        let doc = Document::with_body(
            Viewport::default(),
            vec![article(vec![ElementNode::new("p").with_text("Text.")])],
        );
        let before = doc.count_elements();
        let api = ScriptedApi::replying(vec![reply(vec![])]);

        let result = inject_summary(&doc, &background(api)).await;
        assert!(matches!(result, Err(DomesticatedError::NoChoices)));
        assert_eq!(doc.count_elements(), before);
    }
}
