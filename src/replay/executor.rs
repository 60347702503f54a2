use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;

use crate::browser::{BrowserManager, SessionError, Viewport};
use crate::models::{Action, ReplaySession, Script, ScriptEntry, StepResult};
use crate::recording::injector;

/// Timing knobs for playback, sourced from [`crate::config::Config`].
#[derive(Debug, Clone, Copy)]
pub struct ReplayTiming {
    /// Upper bound on a single step's dispatch; a hung automation call is
    /// cut off rather than stalling the whole replay.
    pub step_timeout: Duration,
    /// Pacing delay between steps, approximating human cadence and letting
    /// asynchronous page updates settle.
    pub pacing: Duration,
    /// Settle delay after a navigation before re-arming instrumentation.
    pub navigation_settle: Duration,
}

impl Default for ReplayTiming {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_millis(15_000),
            pacing: Duration::from_millis(400),
            navigation_settle: Duration::from_millis(1_000),
        }
    }
}

/// Replays a script's entries sequentially against the live session.
///
/// No step failure is fatal: unresolved locators are skipped, dispatch
/// failures get one fallback attempt, and the replay always runs to the end
/// of the script or an explicit `stop()`.
pub struct ScriptPlayer {
    browser: Arc<BrowserManager>,
    script: Arc<Mutex<Script>>,
    session: Arc<Mutex<Option<ReplaySession>>>,
    result_sender: broadcast::Sender<StepResult>,
    complete_sender: broadcast::Sender<ReplaySession>,
    cancel_sender: broadcast::Sender<()>,
    timing: ReplayTiming,
}

impl ScriptPlayer {
    pub fn new(
        browser: Arc<BrowserManager>,
        script: Arc<Mutex<Script>>,
        timing: ReplayTiming,
    ) -> Self {
        let (result_tx, _) = broadcast::channel(256);
        let (complete_tx, _) = broadcast::channel(8);
        let (cancel_tx, _) = broadcast::channel(1);

        Self {
            browser,
            script,
            session: Arc::new(Mutex::new(None)),
            result_sender: result_tx,
            complete_sender: complete_tx,
            cancel_sender: cancel_tx,
            timing,
        }
    }

    /// Start replaying a snapshot of the current script. Returns the pending
    /// session immediately; progress is reported through the result channel
    /// and the session state.
    pub async fn play(&self, headless: bool) -> Result<ReplaySession> {
        {
            let session_guard = self.session.lock().await;
            if matches!(&*session_guard, Some(s) if s.status == "running") {
                return Err(anyhow!("a replay is already running"));
            }
        }

        let entries = self.script.lock().await.snapshot();
        if entries.is_empty() {
            return Err(anyhow!("script is empty"));
        }

        // A session to replay against: the one already attached, or a fresh
        // launch aimed at the script's starting page.
        if !self.browser.has_session().await {
            let start_url = entries
                .first()
                .and_then(ScriptEntry::as_action)
                .and_then(|action| match action {
                    Action::Navigate { url, .. } => Some(url.clone()),
                    _ => None,
                })
                .ok_or_else(|| {
                    anyhow!("no session attached and the script has no leading navigate entry")
                })?;
            self.browser
                .launch(&start_url, headless, Some(Viewport::default()))
                .await?;
        }

        let mut session = ReplaySession::new(entries.len());
        session.start();
        *self.session.lock().await = Some(session.clone());

        self.spawn_replay(entries);

        Ok(session)
    }

    fn spawn_replay(&self, entries: Vec<ScriptEntry>) {
        let browser = Arc::clone(&self.browser);
        let session = Arc::clone(&self.session);
        let result_sender = self.result_sender.clone();
        let complete_sender = self.complete_sender.clone();
        let mut cancel_rx = self.cancel_sender.subscribe();
        let timing = self.timing;

        tokio::spawn(async move {
            tracing::info!("Replay started with {} steps", entries.len());
            let mut cancelled = false;

            for (index, entry) in entries.iter().enumerate() {
                tokio::select! {
                    biased;
                    _ = cancel_rx.recv() => {
                        tracing::info!("Replay cancelled at step {}", index);
                        cancelled = true;
                        break;
                    }
                    result = run_step(&browser, entry, index, timing) => {
                        if !result.success {
                            tracing::warn!(
                                "Step {} ({}) {}: {:?}",
                                index,
                                result.action,
                                if result.skipped { "skipped" } else { "failed" },
                                result.error
                            );
                        }

                        {
                            let mut session_guard = session.lock().await;
                            if let Some(ref mut sess) = *session_guard {
                                sess.add_result(result.clone());
                            }
                        }
                        let _ = result_sender.send(result);

                        tokio::time::sleep(timing.pacing).await;
                    }
                }
            }

            let finished = {
                let mut session_guard = session.lock().await;
                if let Some(ref mut sess) = *session_guard {
                    if cancelled {
                        sess.stopped();
                    } else {
                        sess.complete();
                    }
                    Some(sess.clone())
                } else {
                    None
                }
            };

            if let Some(finished) = finished {
                tracing::info!(
                    "Replay {}: {} completed, {} failed, {} skipped of {}",
                    finished.status,
                    finished.summary.completed,
                    finished.summary.failed,
                    finished.summary.skipped,
                    finished.summary.total
                );
                let _ = complete_sender.send(finished);
            }
        });
    }

    /// Cooperatively stop the replay; the current step is abandoned and no
    /// further steps run.
    pub async fn stop(&self) -> Result<()> {
        let _ = self.cancel_sender.send(());
        tracing::info!("Replay stop requested");
        Ok(())
    }

    pub async fn session(&self) -> Option<ReplaySession> {
        self.session.lock().await.clone()
    }

    pub fn subscribe_results(&self) -> broadcast::Receiver<StepResult> {
        self.result_sender.subscribe()
    }

    pub fn subscribe_completion(&self) -> broadcast::Receiver<ReplaySession> {
        self.complete_sender.subscribe()
    }
}

/// Execute one entry under its timeout bound and classify the outcome.
async fn run_step(
    browser: &BrowserManager,
    entry: &ScriptEntry,
    index: usize,
    timing: ReplayTiming,
) -> StepResult {
    let kind = entry.kind().to_string();

    let action = match entry.as_action() {
        Some(action) => action,
        None => {
            // Forward-compatible entries are preserved in the script but
            // cannot be dispatched by this engine.
            return StepResult::skipped(index, &kind, format!("unknown action '{}'", kind));
        }
    };

    let start = Instant::now();
    let bound = step_bound(action, timing.step_timeout);

    match timeout(bound, dispatch(browser, action, timing)).await {
        Ok(Ok(())) => StepResult::success(index, &kind, start.elapsed().as_millis() as i64),
        Ok(Err(SessionError::NotFound(locator))) => StepResult::skipped(
            index,
            &kind,
            format!("no element for locator '{}'", locator),
        ),
        Ok(Err(e)) => StepResult::failure(
            index,
            &kind,
            e.to_string(),
            start.elapsed().as_millis() as i64,
        ),
        Err(_) => StepResult::failure(
            index,
            &kind,
            format!("step timed out after {:?}", bound),
            start.elapsed().as_millis() as i64,
        ),
    }
}

/// Timeout bound for one step. `wait` entries extend the bound by their own
/// duration so a long recorded pause is not cut short.
fn step_bound(action: &Action, step_timeout: Duration) -> Duration {
    match action {
        Action::Wait { seconds, .. } if *seconds > 0.0 => {
            step_timeout + Duration::from_secs_f64(*seconds)
        }
        _ => step_timeout,
    }
}

async fn dispatch(
    browser: &BrowserManager,
    action: &Action,
    timing: ReplayTiming,
) -> Result<(), SessionError> {
    match action {
        Action::Click { selector, .. } => browser.click(selector).await,
        Action::Type {
            selector, value, ..
        } => browser.clear_and_type(selector, value).await,
        Action::Scroll { x, y, .. } => browser.set_scroll(*x, *y).await,
        Action::Drag { from, to, .. } => {
            match browser.drag(&from.selector, &to.selector).await {
                Ok(()) => Ok(()),
                Err(SessionError::NotFound(locator)) => {
                    // Endpoint gone from the page: fall back to a synthetic
                    // pointer sequence at the recorded coordinates.
                    tracing::debug!(
                        "Drag endpoint '{}' unresolved, replaying by coordinates",
                        locator
                    );
                    browser
                        .drag_by_coords((from.x, from.y), (to.x, to.y))
                        .await
                }
                Err(e) => Err(e),
            }
        }
        Action::Navigate { url, .. } => {
            browser.navigate(url).await?;
            tokio::time::sleep(timing.navigation_settle).await;
            // A new document has no memory of prior instrumentation; re-arm
            // so a replayed session stays inspectable (and recordable).
            if let Err(e) = injector::install(browser).await {
                tracing::debug!("Re-arming instrumentation after navigate failed: {}", e);
            }
            Ok(())
        }
        Action::Wait { seconds, .. } => {
            tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
            Ok(())
        }
        Action::Screenshot { path, .. } => browser.screenshot_to_file(path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_extends_its_timeout_bound() {
        let base = Duration::from_secs(15);
        let bound = step_bound(
            &Action::Wait {
                seconds: 30.0,
                ts: 0,
            },
            base,
        );
        assert_eq!(bound, Duration::from_secs(45));
    }

    #[test]
    fn other_actions_use_the_base_bound() {
        let base = Duration::from_secs(15);
        let bound = step_bound(
            &Action::Click {
                selector: "#go".into(),
                ts: 0,
            },
            base,
        );
        assert_eq!(bound, base);
    }
}
