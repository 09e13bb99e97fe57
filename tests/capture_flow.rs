use std::sync::Arc;
use std::time::{Duration, Instant};

use code_assistant_lib::analysis::AnalysisMode;
use code_assistant_lib::background::{MenuClick, ANALYZE_COMMAND, CONTEXT_MENU_ID};
use code_assistant_lib::browser::{Browser, BrowserEvent, TabStatus};
use code_assistant_lib::config::AssistantConfig;
use code_assistant_lib::extractor::{CodeBlock, PageApi, PageSnapshot};
use code_assistant_lib::handoff::{now_ms, CapturedPayload, HandoffSlot, FRESHNESS_THRESHOLD_MS};
use code_assistant_lib::messaging::{Delivery, Unavailable};
use code_assistant_lib::panel::Prefill;
use code_assistant_lib::Extension;

const PROBLEM_URL: &str = "https://leetcode.com/problems/two-sum/";
const SEPARATOR: &str = "\n\n----\nLeetCode Function Stub:\n\n";

fn install() -> Extension {
    Extension::install(AssistantConfig::default()).unwrap()
}

async fn wait_for_panel(ext: &Extension, mut events: tokio::sync::broadcast::Receiver<BrowserEvent>) {
    if ext.browser.is_panel_open() {
        return;
    }
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(BrowserEvent::PanelOpened) = events.recv().await {
                break;
            }
        }
    })
    .await
    .expect("panel did not open");
}

#[tokio::test]
async fn test_command_capture_prefills_every_mode() {
    let ext = install();
    ext.open_page(vec![
        PageSnapshot::new(PROBLEM_URL)
            .with_selection("Given an array of integers, return indices of the two numbers")
            .with_monaco(vec!["class Solution {\n  twoSum() {}\n}", "// second model"]),
    ])
    .await
    .unwrap();

    ext.background.on_command(ANALYZE_COMMAND).await;
    assert!(ext.browser.is_panel_open());

    let panel = ext.open_panel_view();
    assert_eq!(panel.load_captured().await, Prefill::Handoff);
    let expected = format!(
        "Given an array of integers, return indices of the two numbers{}class Solution {{\n  twoSum() {{}}\n}}",
        SEPARATOR
    );
    for mode in AnalysisMode::ALL {
        assert_eq!(panel.input(mode), expected);
    }
    assert!(ext.local.is_empty());
}

#[tokio::test]
async fn test_first_qualifying_frame_selection_wins() {
    let ext = install();
    ext.open_page(vec![
        PageSnapshot::new(PROBLEM_URL),
        PageSnapshot::new("https://ads.example.com").script_blocked(),
        PageSnapshot::new("https://leetcode.com/frame/a").with_selection("selection in the second frame"),
        PageSnapshot::new("https://leetcode.com/frame/b").with_selection("selection in the third frame"),
    ])
    .await
    .unwrap();

    let stored = ext.background.handle_analyze_code(None, None, None).await.unwrap();
    assert_eq!(stored.selected_text, "selection in the second frame");
    assert_eq!(stored.editor_code, "");
}

#[tokio::test]
async fn test_twenty_char_frame_selection_is_rejected() {
    let ext = install();
    let twenty = "x".repeat(20);
    let twenty_one = "y".repeat(21);

    ext.open_page(vec![
        PageSnapshot::new(PROBLEM_URL),
        PageSnapshot::new("https://leetcode.com/frame").with_selection(twenty.as_str()),
    ])
    .await
    .unwrap();
    assert!(ext.background.handle_analyze_code(None, None, None).await.is_none());

    ext.open_page(vec![
        PageSnapshot::new(PROBLEM_URL),
        PageSnapshot::new("https://leetcode.com/frame").with_selection(twenty_one.as_str()),
    ])
    .await
    .unwrap();
    let stored = ext.background.handle_analyze_code(None, None, None).await.unwrap();
    assert_eq!(stored.selected_text, twenty_one);
}

#[tokio::test]
async fn test_content_script_fills_only_missing_fields() {
    let ext = install();
    // The frame pass rejects the short selection; the content script has no length limit.
    ext.open_page(vec![PageSnapshot::new(PROBLEM_URL)
        .with_selection("short")
        .with_text_area(Some("Code editor"), "def two_sum(nums): pass")])
    .await
    .unwrap();

    let stored = ext.background.handle_analyze_code(None, None, None).await.unwrap();
    assert_eq!(stored.selected_text, "short");
    assert_eq!(stored.editor_code, "def two_sum(nums): pass");
}

#[tokio::test]
async fn test_context_menu_on_restricted_page() {
    let ext = install();
    let tab = ext
        .open_page(vec![PageSnapshot::new("chrome://extensions")])
        .await
        .unwrap();
    assert!(ext.browser.content_script(tab).is_none());

    let click = MenuClick {
        menu_item_id: CONTEXT_MENU_ID.to_string(),
        selection_text: Some("abc".to_string()),
    };
    ext.background.on_context_menu_clicked(&click, Some(tab)).await;

    let panel = ext.open_panel_view();
    assert_eq!(panel.load_captured().await, Prefill::Handoff);
    assert_eq!(panel.input(AnalysisMode::Hints), "abc");
}

#[tokio::test]
async fn test_stale_payload_falls_back_to_live_query() {
    let ext = install();
    ext.open_page(vec![PageSnapshot::new(PROBLEM_URL)
        .with_selection("live selection")
        .with_code_mirror("let live = true;")])
    .await
    .unwrap();

    let stale = now_ms() - FRESHNESS_THRESHOLD_MS as i64 - 1;
    HandoffSlot::new(ext.local.clone()).put(&CapturedPayload::captured_at("old", "old code", stale));

    let panel = ext.open_panel_view();
    assert_eq!(panel.load_captured().await, Prefill::LiveTab);
    assert_eq!(
        panel.input(AnalysisMode::Hints),
        format!("live selection{}let live = true;", SEPARATOR)
    );
    assert_eq!(panel.input(AnalysisMode::Solutions), "");
    // The stale payload is ignored, not deleted.
    assert_eq!(HandoffSlot::new(ext.local.clone()).peek().unwrap().selected_text, "old");
}

#[tokio::test]
async fn test_code_only_capture_leaves_panel_on_live_query() {
    let ext = install();
    ext.open_page(vec![PageSnapshot::new(PROBLEM_URL).with_monaco(vec!["fn two_sum() {}"])])
        .await
        .unwrap();

    ext.background.on_command(ANALYZE_COMMAND).await;
    let stored = HandoffSlot::new(ext.local.clone()).peek().unwrap();
    assert_eq!(stored.selected_text, "");
    assert_eq!(stored.editor_code, "fn two_sum() {}");

    let panel = ext.open_panel_view();
    assert_eq!(panel.load_captured().await, Prefill::LiveTab);
    assert_eq!(panel.input(AnalysisMode::Hints), format!("{}fn two_sum() {{}}", SEPARATOR));
    assert_eq!(panel.input(AnalysisMode::Solutions), "");
    assert_eq!(HandoffSlot::new(ext.local.clone()).peek(), Some(stored));
}

#[tokio::test]
async fn test_mouse_up_triggers_background_capture() {
    let ext = install();
    let tab = ext
        .open_page(vec![PageSnapshot::new(PROBLEM_URL)
            .with_selection("Return the indices of the two numbers")
            .with_fault(PageApi::Monaco)
            .with_code_mirror("function twoSum() {}")])
        .await
        .unwrap();
    let events = ext.browser.subscribe();

    let script = ext.browser.content_script(tab).unwrap();
    assert!(script.on_mouse_up(Instant::now()));
    wait_for_panel(&ext, events).await;

    let stored = HandoffSlot::new(ext.local.clone()).peek().unwrap();
    assert_eq!(stored.selected_text, "Return the indices of the two numbers");
    assert_eq!(stored.editor_code, "function twoSum() {}");
}

#[tokio::test]
async fn test_code_button_after_reload_and_invalidation() {
    let ext = install();
    let block = CodeBlock {
        id: "snippet-1".to_string(),
        tag: "pre".to_string(),
        classes: vec!["highlight".to_string()],
        has_parent: true,
        text: "print('hi')".to_string(),
    };
    let tab = ext
        .open_page(vec![PageSnapshot::new(PROBLEM_URL).with_code_block(block)])
        .await
        .unwrap();
    let script = ext.browser.content_script(tab).unwrap();
    assert!(script.has_button("snippet-1"));

    ext.runtime.invalidate();
    assert_eq!(
        script.on_code_button_click("snippet-1"),
        Delivery::Unavailable(Unavailable::ContextInvalidated)
    );
    assert!(!script.has_button("snippet-1"));

    // A reload injects a fresh script; the old one keeps its removed state.
    let url = ext.browser.active_tab().await.unwrap().url;
    ext.background
        .on_tab_updated(tab, TabStatus::Complete, url.as_deref())
        .await;
    let reloaded = ext.browser.content_script(tab).unwrap();
    assert!(!Arc::ptr_eq(&script, &reloaded));
    assert!(reloaded.has_button("snippet-1"));
}
