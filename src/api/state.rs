use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::browser::BrowserManager;
use crate::config::Config;
use crate::models::{ReplaySession, Script, ScriptEntry, StepResult};
use crate::recording::SessionRecorder;
use crate::replay::ScriptPlayer;

/// WebSocket event types broadcast to clients
#[derive(Debug, Clone)]
pub enum WsEvent {
    RecordingEntry { entry: ScriptEntry },
    ReplayStep { result: StepResult },
    ReplayComplete { session: ReplaySession },
    Error { message: String },
    Pong,
}

/// Shared application state: one browser session, one script, and the
/// recorder/player pair operating on them. Recording and playback are
/// mutually exclusive phases; `control_lock` serializes their starts.
pub struct AppState {
    pub config: Config,
    pub browser: Arc<BrowserManager>,
    pub script: Arc<Mutex<Script>>,
    pub recorder: Arc<SessionRecorder>,
    pub player: Arc<ScriptPlayer>,
    pub ws_broadcast: broadcast::Sender<WsEvent>,
    pub control_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (ws_tx, _) = broadcast::channel(1024);

        let browser = Arc::new(BrowserManager::new());
        let script = Arc::new(Mutex::new(Script::new()));

        let recorder = Arc::new(SessionRecorder::new(
            Arc::clone(&browser),
            Arc::clone(&script),
            config.poll_interval(),
        ));
        let player = Arc::new(ScriptPlayer::new(
            Arc::clone(&browser),
            Arc::clone(&script),
            config.replay_timing(),
        ));

        let state = Self {
            config,
            browser,
            script,
            recorder,
            player,
            ws_broadcast: ws_tx,
            control_lock: Mutex::new(()),
        };
        state.spawn_ws_forwarders();
        state
    }

    /// Bridge the engine broadcast channels onto the WebSocket fan-out.
    fn spawn_ws_forwarders(&self) {
        let mut entry_rx = self.recorder.subscribe_entries();
        let ws = self.ws_broadcast.clone();
        tokio::spawn(async move {
            while let Ok(entry) = entry_rx.recv().await {
                let _ = ws.send(WsEvent::RecordingEntry { entry });
            }
        });

        let mut result_rx = self.player.subscribe_results();
        let ws = self.ws_broadcast.clone();
        tokio::spawn(async move {
            while let Ok(result) = result_rx.recv().await {
                let _ = ws.send(WsEvent::ReplayStep { result });
            }
        });

        let mut complete_rx = self.player.subscribe_completion();
        let ws = self.ws_broadcast.clone();
        tokio::spawn(async move {
            while let Ok(session) = complete_rx.recv().await {
                let _ = ws.send(WsEvent::ReplayComplete { session });
            }
        });
    }

    pub fn broadcast(&self, event: WsEvent) {
        // Ignore send errors (no receivers)
        let _ = self.ws_broadcast.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.ws_broadcast.subscribe()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
