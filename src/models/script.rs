use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One endpoint of a recorded drag gesture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DragEndpoint {
    pub selector: String,
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
}

/// A single replayable step, tagged by its `action` discriminant on the wire.
///
/// `selector` values are opaque here: the script model never rewrites them
/// after capture, only the playback engine interprets their structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Click {
        selector: String,
        #[serde(default)]
        ts: i64,
    },
    /// `value` is the settled text at capture time, not a keystroke log.
    Type {
        selector: String,
        value: String,
        #[serde(default)]
        ts: i64,
    },
    /// Absolute viewport scroll offsets.
    Scroll {
        #[serde(default)]
        x: i64,
        #[serde(default)]
        y: i64,
        #[serde(default)]
        ts: i64,
    },
    Drag {
        from: DragEndpoint,
        to: DragEndpoint,
        #[serde(default)]
        ts: i64,
    },
    Navigate {
        url: String,
        #[serde(default)]
        ts: i64,
    },
    /// Manually inserted, never captured.
    Wait {
        seconds: f64,
        #[serde(default)]
        ts: i64,
    },
    /// Manually inserted, never captured.
    Screenshot {
        path: String,
        #[serde(default)]
        ts: i64,
    },
}

impl Action {
    /// Wire discriminant, used for logging and step results.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
            Action::Scroll { .. } => "scroll",
            Action::Drag { .. } => "drag",
            Action::Navigate { .. } => "navigate",
            Action::Wait { .. } => "wait",
            Action::Screenshot { .. } => "screenshot",
        }
    }
}

/// A script entry: a recognized [`Action`], or a raw JSON object carried
/// through untouched. Unknown discriminants (and malformed known ones) must
/// survive a save/load round-trip so newer recordings stay loadable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScriptEntry {
    Known(Action),
    Unknown(serde_json::Value),
}

impl ScriptEntry {
    /// Normalize one drained page event. Never fails: anything that is not a
    /// well-formed known action is preserved as [`ScriptEntry::Unknown`].
    pub fn from_event(value: serde_json::Value) -> Self {
        match serde_json::from_value::<Action>(value.clone()) {
            Ok(action) => ScriptEntry::Known(action),
            Err(_) => ScriptEntry::Unknown(value),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ScriptEntry::Known(action) => action.kind(),
            ScriptEntry::Unknown(value) => value
                .get("action")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown"),
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            ScriptEntry::Known(action) => Some(action),
            ScriptEntry::Unknown(_) => None,
        }
    }
}

impl From<Action> for ScriptEntry {
    fn from(action: Action) -> Self {
        ScriptEntry::Known(action)
    }
}

/// The ordered sequence of entries produced by recording and consumed by
/// playback. Order is the sole carrier of causal meaning. The container is
/// not internally synchronized: holders share it behind one
/// `tokio::sync::Mutex` (bridge appends, manual insertions, snapshot reads).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Script {
    entries: Vec<ScriptEntry>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ScriptEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: ScriptEntry) {
        self.entries.push(entry);
    }

    /// Mutable access to the trailing entry, for the bridge's append-time
    /// collapse of consecutive `type` events on the same selector.
    pub fn last_mut(&mut self) -> Option<&mut ScriptEntry> {
        self.entries.last_mut()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copy of the entries at this moment, for playback and display reads.
    pub fn snapshot(&self) -> Vec<ScriptEntry> {
        self.entries.clone()
    }

    /// Replace the contents wholesale (load semantics).
    pub fn replace(&mut self, entries: Vec<ScriptEntry>) {
        self.entries = entries;
    }

    /// URL of the leading `navigate` entry, the starting page for playback.
    pub fn first_navigate_url(&self) -> Option<&str> {
        match self.entries.first() {
            Some(ScriptEntry::Known(Action::Navigate { url, .. })) => Some(url),
            _ => None,
        }
    }

    /// Serialize a snapshot of the script to `path` as a pretty JSON array.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.entries)
            .context("failed to serialize script")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write script to {}", path.display()))?;
        Ok(())
    }

    /// Load a script from `path`, replacing this script's contents wholesale.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script from {}", path.display()))?;
        let entries: Vec<ScriptEntry> =
            serde_json::from_str(&raw).context("failed to parse script file")?;
        self.entries = entries;
        Ok(())
    }
}

/// Epoch milliseconds, the timestamp unit of the wire format.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
