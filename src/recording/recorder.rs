use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::browser::{BrowserManager, Viewport};
use crate::models::{now_ms, Action, RecordingSession, Script, ScriptEntry};
use crate::recording::injector;

/// The event bridge: a host-side polling loop that atomically drains the
/// page-side queue each tick and appends the normalized entries to the
/// shared [`Script`].
///
/// `stop()` joins the poll task before returning, so the script cannot be
/// mutated by the bridge afterwards.
pub struct SessionRecorder {
    browser: Arc<BrowserManager>,
    script: Arc<Mutex<Script>>,
    session: Arc<Mutex<Option<RecordingSession>>>,
    paused: Arc<AtomicBool>,
    entry_sender: broadcast::Sender<ScriptEntry>,
    cancel_sender: broadcast::Sender<()>,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl SessionRecorder {
    pub fn new(
        browser: Arc<BrowserManager>,
        script: Arc<Mutex<Script>>,
        poll_interval: Duration,
    ) -> Self {
        let (entry_tx, _) = broadcast::channel(256);
        let (cancel_tx, _) = broadcast::channel(1);

        Self {
            browser,
            script,
            session: Arc::new(Mutex::new(None)),
            paused: Arc::new(AtomicBool::new(false)),
            entry_sender: entry_tx,
            cancel_sender: cancel_tx,
            poll_handle: Mutex::new(None),
            poll_interval,
        }
    }

    /// Start recording. Launches a browser when none is attached (requires a
    /// start URL in that case), records the starting page as a host-side
    /// `navigate` entry, arms the instrumentation, and spawns the poll loop.
    pub async fn start(
        &self,
        start_url: Option<&str>,
        headless: bool,
        viewport: Option<Viewport>,
    ) -> Result<RecordingSession> {
        let mut session_guard = self.session.lock().await;
        if session_guard.is_some() {
            return Err(anyhow!("a recording session is already active"));
        }

        if !self.browser.has_session().await {
            let url = start_url
                .ok_or_else(|| anyhow!("no session attached and no start URL provided"))?;
            self.browser.launch(url, headless, viewport).await?;
        } else if let Some(url) = start_url {
            self.browser.navigate(url).await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        let current_url = self.browser.current_url().await?;

        let mut session = RecordingSession::new(current_url.clone());
        session.start();

        // The page cannot report its own replacement, so the host records the
        // starting page itself.
        {
            let mut script = self.script.lock().await;
            script.push(
                Action::Navigate {
                    url: current_url,
                    ts: now_ms(),
                }
                .into(),
            );
        }

        // Best-effort: a page that forbids script evaluation simply yields an
        // empty queue.
        if let Err(e) = injector::install_persistent(&self.browser).await {
            tracing::warn!("Instrumentation install failed, recording blind: {}", e);
        }

        self.paused.store(false, Ordering::Relaxed);
        *self.poll_handle.lock().await = Some(self.spawn_poll_loop());
        *session_guard = Some(session.clone());

        tracing::info!("Recording started: {}", session.id);
        Ok(session)
    }

    fn spawn_poll_loop(&self) -> JoinHandle<()> {
        let browser = Arc::clone(&self.browser);
        let script = Arc::clone(&self.script);
        let paused = Arc::clone(&self.paused);
        let entry_sender = self.entry_sender.clone();
        let mut cancel_rx = self.cancel_sender.subscribe();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel_rx.recv() => {
                        tracing::debug!("Poll loop cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let batch = match injector::drain(&browser).await {
                            Ok(events) => events,
                            Err(e) => {
                                // Expected mid-navigation or after teardown;
                                // a broken drain is an empty tick, not a
                                // fatal error.
                                tracing::debug!("Drain failed, empty tick: {}", e);
                                Vec::new()
                            }
                        };

                        if batch.is_empty() {
                            continue;
                        }

                        if paused.load(Ordering::Relaxed) {
                            tracing::debug!("Discarding {} event(s) while paused", batch.len());
                            continue;
                        }

                        let mut script = script.lock().await;
                        for event in batch {
                            let entry = ScriptEntry::from_event(event);
                            let appended = append_entry(&mut script, entry);
                            let _ = entry_sender.send(appended);
                        }
                    }
                }
            }

            tracing::info!("Poll loop stopped");
        })
    }

    /// Stop recording. Signals the poll loop and joins it; once this returns
    /// the bridge no longer mutates the script.
    pub async fn stop(&self) -> Result<RecordingSession> {
        let _ = self.cancel_sender.send(());

        let handle = self
            .poll_handle
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("no active recording session"))?;
        if let Err(e) = handle.await {
            tracing::warn!("Poll loop join failed: {}", e);
        }

        let mut session_guard = self.session.lock().await;
        let mut session = session_guard
            .take()
            .ok_or_else(|| anyhow!("no active recording session"))?;

        session.entry_count = self.script.lock().await.len();
        session.complete();

        tracing::info!(
            "Recording stopped: {} ({} entries)",
            session.id,
            session.entry_count
        );
        Ok(session)
    }

    /// Cancel recording without completing the session. Recorded entries are
    /// left in the script; clearing is an explicit, separate operation.
    pub async fn cancel(&self) -> Result<()> {
        let _ = self.cancel_sender.send(());

        if let Some(handle) = self.poll_handle.lock().await.take() {
            let _ = handle.await;
        }

        let mut session_guard = self.session.lock().await;
        if let Some(ref mut session) = *session_guard {
            session.fail("recording cancelled by operator".to_string());
        }
        *session_guard = None;

        tracing::info!("Recording cancelled");
        Ok(())
    }

    /// Pause: drained events are discarded until `resume`. Instrumentation
    /// stays armed.
    pub async fn pause(&self) -> Result<()> {
        let mut session_guard = self.session.lock().await;
        let session = session_guard
            .as_mut()
            .ok_or_else(|| anyhow!("no active recording session"))?;
        session.pause();
        self.paused.store(true, Ordering::Relaxed);
        tracing::info!("Recording paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let mut session_guard = self.session.lock().await;
        let session = session_guard
            .as_mut()
            .ok_or_else(|| anyhow!("no active recording session"))?;
        session.resume();
        self.paused.store(false, Ordering::Relaxed);
        tracing::info!("Recording resumed");
        Ok(())
    }

    /// Operator insertion: a `wait` entry. Takes the same script lock as the
    /// bridge's appends.
    pub async fn insert_wait(&self, seconds: f64) -> Result<ScriptEntry> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(anyhow!("wait duration must be positive"));
        }
        let entry: ScriptEntry = Action::Wait {
            seconds,
            ts: now_ms(),
        }
        .into();
        self.script.lock().await.push(entry.clone());
        let _ = self.entry_sender.send(entry.clone());
        Ok(entry)
    }

    /// Operator insertion: a `screenshot` entry.
    pub async fn insert_screenshot(&self, path: &str) -> Result<ScriptEntry> {
        if path.trim().is_empty() {
            return Err(anyhow!("screenshot path must not be empty"));
        }
        let entry: ScriptEntry = Action::Screenshot {
            path: path.to_string(),
            ts: now_ms(),
        }
        .into();
        self.script.lock().await.push(entry.clone());
        let _ = self.entry_sender.send(entry.clone());
        Ok(entry)
    }

    /// Operator insertion: a `scroll` entry at the page's current absolute
    /// offsets.
    pub async fn insert_scroll_here(&self) -> Result<ScriptEntry> {
        let (x, y) = self.browser.scroll_offsets().await?;
        let entry: ScriptEntry = Action::Scroll { x, y, ts: now_ms() }.into();
        self.script.lock().await.push(entry.clone());
        let _ = self.entry_sender.send(entry.clone());
        Ok(entry)
    }

    pub async fn session(&self) -> Option<RecordingSession> {
        let mut session = self.session.lock().await.clone()?;
        session.entry_count = self.script.lock().await.len();
        Some(session)
    }

    pub async fn entry_count(&self) -> usize {
        self.script.lock().await.len()
    }

    pub fn subscribe_entries(&self) -> broadcast::Receiver<ScriptEntry> {
        self.entry_sender.subscribe()
    }
}

/// Append one drained entry, collapsing a `type` into a trailing `type` on
/// the same selector (an arbitrarily long typing session settles into one
/// entry holding the final value). Returns the entry as recorded.
fn append_entry(script: &mut Script, entry: ScriptEntry) -> ScriptEntry {
    if let ScriptEntry::Known(Action::Type {
        selector: ref new_selector,
        ref value,
        ts,
    }) = entry
    {
        if let Some(ScriptEntry::Known(Action::Type {
            selector: last_selector,
            value: last_value,
            ts: last_ts,
        })) = script.last_mut()
        {
            if last_selector == new_selector {
                *last_value = value.clone();
                *last_ts = ts;
                return entry;
            }
        }
    }

    script.push(entry.clone());
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn type_event(selector: &str, value: &str, ts: i64) -> serde_json::Value {
        json!({"action": "type", "selector": selector, "value": value, "ts": ts})
    }

    #[test]
    fn normalization_preserves_count_and_order() {
        let events = vec![
            json!({"action": "navigate", "url": "https://example.com", "ts": 1}),
            json!({"action": "click", "selector": "#a", "ts": 2}),
            json!({"action": "scroll", "x": 0, "y": 300, "ts": 3}),
            json!({"action": "swipe", "direction": "left", "ts": 4}),
            json!({"action": "click", "selector": "#b", "ts": 5}),
        ];

        let mut script = Script::new();
        for event in events {
            append_entry(&mut script, ScriptEntry::from_event(event));
        }

        assert_eq!(script.len(), 5);
        let kinds: Vec<&str> = script.entries().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, ["navigate", "click", "scroll", "swipe", "click"]);
    }

    #[test]
    fn consecutive_types_on_same_selector_collapse() {
        let mut script = Script::new();
        append_entry(&mut script, ScriptEntry::from_event(type_event("#q", "Pu", 1)));
        append_entry(&mut script, ScriptEntry::from_event(type_event("#q", "Pune", 2)));

        assert_eq!(script.len(), 1);
        assert_eq!(
            script.entries()[0].as_action(),
            Some(&Action::Type {
                selector: "#q".into(),
                value: "Pune".into(),
                ts: 2
            })
        );
    }

    #[test]
    fn types_on_different_selectors_do_not_collapse() {
        let mut script = Script::new();
        append_entry(&mut script, ScriptEntry::from_event(type_event("#q", "Pune", 1)));
        append_entry(&mut script, ScriptEntry::from_event(type_event("#city", "Goa", 2)));

        assert_eq!(script.len(), 2);
    }

    #[test]
    fn intervening_entry_prevents_collapse() {
        let mut script = Script::new();
        append_entry(&mut script, ScriptEntry::from_event(type_event("#q", "Pune", 1)));
        append_entry(
            &mut script,
            ScriptEntry::from_event(json!({"action": "click", "selector": "#go", "ts": 2})),
        );
        append_entry(&mut script, ScriptEntry::from_event(type_event("#q", "Pune Junction", 3)));

        assert_eq!(script.len(), 3);
    }
}
