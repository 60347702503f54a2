use serde::Serialize;

use super::script::ScriptEntry;
use super::session::{ReplaySummary, StepResult};

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub session_id: String,
    pub entry_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RecordingStatusResponse {
    pub session_id: String,
    pub status: String,
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartReplayResponse {
    pub session_id: String,
    pub status: String,
    pub total_steps: usize,
}

#[derive(Debug, Serialize)]
pub struct ReplayStatusResponse {
    pub session_id: String,
    pub status: String,
    pub current_step: usize,
    pub total_steps: usize,
    pub summary: ReplaySummary,
    pub results: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScriptResponse {
    pub entry_count: usize,
    pub entries: Vec<ScriptEntry>,
}

#[derive(Debug, Serialize)]
pub struct ScriptFileResponse {
    pub path: String,
    pub entry_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ScreenshotPreviewResponse {
    pub format: String,
    pub base64: String,
}
