use domesticated::dom::{
    Direction, ElementNode, Page, PointOptions, SearchOptions, await_element, locate, locate_all, search_direction,
    select_at_point,
};
use domesticated::{BrowserSession, ChromePage, LaunchOptions};

const GRID_PAGE: &str = "data:text/html,<html><body style='margin:0'>\
    <div id='a' style='position:absolute;left:0;top:0;width:100px;height:50px'>A</div>\
    <div id='b' style='position:absolute;left:100px;top:0;width:100px;height:50px'>B</div>\
    <div id='c' style='position:absolute;left:0;top:50px;width:100px;height:50px'>C</div>\
    </body></html>";

fn open(session: &BrowserSession, url: &str) -> ChromePage {
    session.open(url).expect("Failed to open page")
}

fn launch() -> BrowserSession {
    BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser")
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_css_and_xpath_agree() {
    let session = launch();
    let page = open(&session, GRID_PAGE);

    let by_css = locate(&page, "#b", None).unwrap();
    let by_xpath = locate(&page, "//div[@id='b']", None).unwrap();
    assert!(by_css.is_some());
    assert_eq!(by_css, by_xpath);

    assert_eq!(locate_all(&page, "div", None).unwrap().len(), 3);
    assert!(locate_all(&page, ".missing", None).unwrap().is_empty());
}

#[test]
#[ignore]
fn test_point_and_direction() {
    let session = launch();
    let page = open(&session, GRID_PAGE);
    let a = locate(&page, "#a", None).unwrap().unwrap();

    assert_eq!(select_at_point(&page, 10.0, 10.0, &PointOptions::new()).unwrap(), Some(a));

    let right = search_direction(&page, a, Direction::Right, &SearchOptions::new()).unwrap();
    assert_eq!(page.attribute(right.unwrap(), "id").unwrap().as_deref(), Some("b"));

    let down = search_direction(&page, a, Direction::Down, &SearchOptions::new()).unwrap();
    assert_eq!(page.attribute(down.unwrap(), "id").unwrap().as_deref(), Some("c"));

    assert_eq!(search_direction(&page, a, Direction::Up, &SearchOptions::new()).unwrap(), None);
}

#[test]
#[ignore]
fn test_await_inserted_element() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let session = launch();
    let page = open(&session, GRID_PAGE);

    runtime.block_on(async {
        let c = locate(&page, "#c", None).unwrap().unwrap();
        let waiting = await_element(&page, "p.late", None);
        page.insert_after(c, ElementNode::new("p").with_class("late").with_text("Late"))
            .unwrap();

        let found = waiting.await.unwrap();
        assert_eq!(page.inner_text(found).unwrap(), "Late");
    });
}

#[test]
#[ignore]
fn test_scroll_to_bottom() {
    let session = launch();
    let page = open(
        &session,
        "data:text/html,<html><body style='margin:0'><div style='height:5000px'>Tall</div></body></html>",
    );

    page.scroll_to_bottom().unwrap();
    let scrolled = page
        .tab()
        .evaluate("window.scrollY", false)
        .unwrap()
        .value
        .and_then(|v| v.as_f64())
        .unwrap();
    assert!(scrolled > 0.0);
}

#[test]
#[ignore]
fn test_moved_element_keeps_handle() {
    let session = launch();
    let page = open(&session, GRID_PAGE);
    let b = locate(&page, "#b", None).unwrap().unwrap();

    page.tab()
        .evaluate("document.body.appendChild(document.getElementById('b'))", false)
        .unwrap();
    std::thread::sleep(domesticated::browser::MUTATION_POLL_INTERVAL * 3);

    // Moved, not recreated: the handle is unchanged
    assert_eq!(locate(&page, "#b", None).unwrap(), Some(b));
    assert_eq!(page.tag_name(b).unwrap(), "div");
}
