use domesticated::dom::{
    Document, ElementNode, ElementRancher, NodeId, Page, PageContext, PointOptions, SearchOptions, Viewport, await_element,
    find_in_family, find_element_below, locate, select_all_at_point,
};
use domesticated::{IdGenerator, MAX_SAFE_INTEGER};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn menu() -> Document {
    Document::with_body(
        Viewport::new(400.0, 400.0),
        vec![
            ElementNode::new("nav")
                .with_id("menu")
                .with_bounding_box(0.0, 0.0, 400.0, 40.0)
                .with_children(vec![
                    ElementNode::new("a").with_class("entry").with_text("Home").with_bounding_box(0.0, 0.0, 100.0, 40.0),
                    ElementNode::new("a").with_class("entry").with_text("Docs").with_bounding_box(100.0, 0.0, 100.0, 40.0),
                ]),
            ElementNode::new("main")
                .with_id("content")
                .with_bounding_box(0.0, 40.0, 400.0, 360.0)
                .with_child(ElementNode::new("p").with_text("Body text").with_bounding_box(0.0, 290.0, 400.0, 40.0)),
        ],
    )
}

#[test]
fn test_family_search_reaches_sibling_subtree() {
    let doc = menu();
    let home = locate(&doc, "//a[text()='Home']", None).unwrap().unwrap();
    let paragraph = find_in_family(&doc, home, |n| doc.tag_name(n).map(|t| t == "p").unwrap_or(false)).unwrap();
    assert_eq!(doc.inner_text(paragraph.unwrap()).unwrap(), "Body text");
}

#[test]
fn test_point_selection_within_context() {
    let doc = menu();
    let nav = locate(&doc, "#menu", None).unwrap().unwrap();
    let content = locate(&doc, "#content", None).unwrap().unwrap();

    let in_nav = select_all_at_point(&doc, 150.0, 20.0, &PointOptions::new().within(nav)).unwrap();
    assert_eq!(in_nav.len(), 1);
    assert_eq!(doc.inner_text(in_nav[0]).unwrap(), "Docs");

    // The content box is not under this point
    assert!(select_all_at_point(&doc, 150.0, 20.0, &PointOptions::new().within(content)).unwrap().is_empty());
}

#[test]
fn test_find_element_below_menu() {
    let doc = menu();
    let docs = locate(&doc, "a.entry:last-child", None).unwrap().unwrap();
    let is_p = |n: NodeId| doc.tag_name(n).map(|t| t == "p").unwrap_or(false);
    let found = find_element_below(&doc, docs, &SearchOptions::unbounded().matching(&is_p)).unwrap();
    assert_eq!(doc.inner_text(found.unwrap()).unwrap(), "Body text");
}

#[tokio::test(start_paused = true)]
async fn test_watch_and_wait_together() {
    let doc = Arc::new(menu());
    let context = PageContext::new(doc.clone());
    let rancher: Arc<ElementRancher<Document>> = context.rancher().unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    rancher
        .add_handler(".entry", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);

    let writer = doc.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let nav = locate(&*writer, "#menu", None).unwrap().unwrap();
        writer
            .append_child(nav, ElementNode::new("a").with_class("entry").with_text("Blog"))
            .unwrap();
    });

    let blog = await_element(&*doc, "//a[contains(text(), 'Blog')]", None).await.unwrap();
    assert_eq!(doc.inner_text(blog).unwrap(), "Blog");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(context.rancher().unwrap().scan_count(), 1);
    // A scan reports every match again
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[test]
fn test_id_generator_ceiling() {
    let ids = IdGenerator::starting_at(MAX_SAFE_INTEGER - 2);
    assert_eq!(ids.next_id().unwrap(), MAX_SAFE_INTEGER - 1);
    assert_eq!(ids.next_id().unwrap(), MAX_SAFE_INTEGER);
    assert!(ids.next_id().is_err());
}
