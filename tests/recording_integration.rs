//! Integration tests for the recording pipeline.
//!
//! These tests drive a real headless Chrome and verify the capture
//! properties end to end: idempotent instrumentation, debounced typing,
//! drag/click disambiguation, atomic drains, and the pause gate.
//!
//! Run with: cargo test --test recording_integration -- --ignored --test-threads=1

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

use autobrowser_sidecar::browser::BrowserManager;
use autobrowser_sidecar::models::{Action, Script, ScriptEntry};
use autobrowser_sidecar::recording::{injector, SessionRecorder};

/// Get file:// URL for the test page
fn test_page_url() -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!("file://{}/tests/fixtures/test_page.html", manifest_dir)
}

/// Wait for events to flow through the page debounce and a poll tick.
async fn wait_for_events(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}

fn recorder() -> (Arc<BrowserManager>, Arc<Mutex<Script>>, SessionRecorder) {
    let browser = Arc::new(BrowserManager::new());
    let script = Arc::new(Mutex::new(Script::new()));
    let recorder = SessionRecorder::new(
        Arc::clone(&browser),
        Arc::clone(&script),
        Duration::from_millis(250),
    );
    (browser, script, recorder)
}

fn count_kind(entries: &[ScriptEntry], kind: &str) -> usize {
    entries.iter().filter(|e| e.kind() == kind).count()
}

// ============================================================================
// Test 1: Idempotent installation
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install; run with --ignored --test-threads=1"]
async fn double_install_records_a_single_click() {
    let (browser, script, recorder) = recorder();
    let url = test_page_url();

    recorder.start(Some(&url), true, None).await.unwrap();
    wait_for_events(1200).await;

    // Re-arm twice; the document marker must keep the listener set single.
    let report = injector::install(&browser).await.unwrap();
    assert!(!report.newly_installed, "second install must be a no-op");
    injector::install(&browser).await.unwrap();

    browser
        .evaluate("document.querySelector('#btn-simple').click()")
        .await
        .unwrap();
    wait_for_events(800).await;

    recorder.stop().await.unwrap();

    let entries = script.lock().await.snapshot();
    assert_eq!(
        count_kind(&entries, "click"),
        1,
        "one real click must yield exactly one click entry, got: {:?}",
        entries
    );
}

// ============================================================================
// Test 2: Debounce correctness
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install; run with --ignored --test-threads=1"]
async fn character_wise_typing_settles_into_one_entry() {
    let (browser, script, recorder) = recorder();
    let url = test_page_url();

    recorder.start(Some(&url), true, None).await.unwrap();
    wait_for_events(1200).await;

    // Four input events with no pause exceeding the settle window.
    browser
        .evaluate(
            r#"(() => {
                var el = document.querySelector('#q');
                el.focus();
                'Pune'.split('').forEach(function (ch) {
                    el.value = el.value + ch;
                    el.dispatchEvent(new Event('input', { bubbles: true }));
                });
                return true;
            })()"#,
        )
        .await
        .unwrap();

    // Settle window (550ms) + poll tick + margin.
    wait_for_events(1200).await;

    recorder.stop().await.unwrap();

    let entries = script.lock().await.snapshot();
    let types: Vec<&ScriptEntry> = entries.iter().filter(|e| e.kind() == "type").collect();
    assert_eq!(types.len(), 1, "typing burst must settle into one entry");
    match types[0].as_action() {
        Some(Action::Type {
            selector, value, ..
        }) => {
            assert_eq!(selector, "#q");
            assert_eq!(value, "Pune");
        }
        other => panic!("expected a type action, got {:?}", other),
    }
}

// ============================================================================
// Test 3: Drag vs click disambiguation
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install; run with --ignored --test-threads=1"]
async fn short_pointer_pair_is_a_click_long_pair_is_a_drag() {
    let (browser, script, recorder) = recorder();
    let url = test_page_url();

    recorder.start(Some(&url), true, None).await.unwrap();
    wait_for_events(1200).await;

    // Displacement below the threshold: the follow-up click must survive.
    browser
        .evaluate(
            r#"(() => {
                var el = document.querySelector('#btn-simple');
                function fire(type, x, y) {
                    el.dispatchEvent(new PointerEvent(type, {
                        bubbles: true, clientX: x, clientY: y, pointerId: 1
                    }));
                }
                fire('pointerdown', 20, 20);
                fire('pointerup', 22, 23);
                el.click();
                return true;
            })()"#,
        )
        .await
        .unwrap();
    wait_for_events(600).await;

    // Displacement past the threshold: drag recorded, click suppressed.
    browser
        .evaluate(
            r#"(() => {
                var el = document.querySelector('#drag-source');
                function fire(type, x, y) {
                    el.dispatchEvent(new PointerEvent(type, {
                        bubbles: true, clientX: x, clientY: y, pointerId: 1
                    }));
                }
                fire('pointerdown', 40, 300);
                fire('pointerup', 160, 340);
                el.click();
                return true;
            })()"#,
        )
        .await
        .unwrap();
    wait_for_events(800).await;

    recorder.stop().await.unwrap();

    let entries = script.lock().await.snapshot();
    assert_eq!(count_kind(&entries, "click"), 1, "entries: {:?}", entries);
    assert_eq!(count_kind(&entries, "drag"), 1, "entries: {:?}", entries);

    let drag = entries
        .iter()
        .find_map(|e| match e.as_action() {
            Some(Action::Drag { from, to, .. }) => Some((from.clone(), to.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(drag.0.selector, "#drag-source");
    assert_eq!((drag.0.x, drag.0.y), (40, 300));
    assert_eq!((drag.1.x, drag.1.y), (160, 340));
}

// ============================================================================
// Test 4: Drain atomicity
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install; run with --ignored --test-threads=1"]
async fn events_across_ticks_are_neither_lost_nor_duplicated() {
    let (browser, script, recorder) = recorder();
    let url = test_page_url();

    recorder.start(Some(&url), true, None).await.unwrap();
    wait_for_events(1200).await;

    // Push synthetic events straight into the page queue, spread across
    // several poll ticks.
    const N: usize = 25;
    for i in 0..N {
        browser
            .evaluate(&format!(
                "window.__autobrowserEvents.push({{action: 'click', selector: '#e{}', ts: Date.now()}})",
                i
            ))
            .await
            .unwrap();
        sleep(Duration::from_millis(30)).await;
    }
    wait_for_events(800).await;

    recorder.stop().await.unwrap();

    let entries = script.lock().await.snapshot();
    let clicks: Vec<String> = entries
        .iter()
        .filter_map(|e| match e.as_action() {
            Some(Action::Click { selector, .. }) => Some(selector.clone()),
            _ => None,
        })
        .collect();

    let expected: Vec<String> = (0..N).map(|i| format!("#e{}", i)).collect();
    assert_eq!(clicks, expected, "exactly N clicks, in order");
}

// ============================================================================
// Test 5: Pause gate
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install; run with --ignored --test-threads=1"]
async fn paused_bridge_discards_events() {
    let (browser, script, recorder) = recorder();
    let url = test_page_url();

    let session = recorder.start(Some(&url), true, None).await.unwrap();
    assert_eq!(session.status, "recording");
    wait_for_events(1200).await;

    recorder.pause().await.unwrap();
    browser
        .evaluate("document.querySelector('#btn-simple').click()")
        .await
        .unwrap();
    wait_for_events(800).await;

    recorder.resume().await.unwrap();
    browser
        .evaluate("document.querySelector('#search').click()")
        .await
        .unwrap();
    wait_for_events(800).await;

    recorder.stop().await.unwrap();

    let entries = script.lock().await.snapshot();
    let clicks: Vec<String> = entries
        .iter()
        .filter_map(|e| match e.as_action() {
            Some(Action::Click { selector, .. }) => Some(selector.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(clicks, vec!["#search".to_string()], "only the post-resume click survives");
}

// ============================================================================
// Test 6: Stop joins the bridge
// ============================================================================

#[tokio::test]
#[ignore = "requires a local Chrome install; run with --ignored --test-threads=1"]
async fn script_is_stable_after_stop_returns() {
    let (browser, script, recorder) = recorder();
    let url = test_page_url();

    recorder.start(Some(&url), true, None).await.unwrap();
    wait_for_events(1200).await;

    recorder.stop().await.unwrap();
    let len_at_stop = script.lock().await.len();

    // Events arriving after stop() must never reach the script.
    browser
        .evaluate("document.querySelector('#btn-simple').click()")
        .await
        .unwrap();
    wait_for_events(800).await;

    assert_eq!(script.lock().await.len(), len_at_stop);
}
