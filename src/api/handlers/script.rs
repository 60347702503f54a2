use axum::{extract::State, Json};
use base64::Engine;
use std::sync::Arc;

use crate::browser::SessionError;
use crate::error::{AppError, Result};
use crate::models::{
    InsertScreenshotRequest, InsertWaitRequest, LoadScriptRequest, SaveScriptRequest,
    ScreenshotPreviewResponse, ScriptFileResponse, ScriptResponse,
};

use super::super::state::AppState;

/// Snapshot of the current script for display.
pub async fn get_script(State(state): State<Arc<AppState>>) -> Result<Json<ScriptResponse>> {
    let script = state.script.lock().await;
    Ok(Json(ScriptResponse {
        entry_count: script.len(),
        entries: script.snapshot(),
    }))
}

pub async fn clear_script(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    state.script.lock().await.clear();
    Ok(Json(serde_json::json!({ "status": "cleared" })))
}

/// Save a snapshot of the script to a file.
pub async fn save_script(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SaveScriptRequest>,
) -> Result<Json<ScriptFileResponse>> {
    let script = state.script.lock().await;
    script
        .save(&request.path)
        .map_err(|e| AppError::Script(e.to_string()))?;

    Ok(Json(ScriptFileResponse {
        path: request.path,
        entry_count: script.len(),
    }))
}

/// Load a script file, replacing the in-memory script wholesale.
pub async fn load_script(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoadScriptRequest>,
) -> Result<Json<ScriptFileResponse>> {
    let mut script = state.script.lock().await;
    script
        .load(&request.path)
        .map_err(|e| AppError::Script(e.to_string()))?;

    Ok(Json(ScriptFileResponse {
        path: request.path,
        entry_count: script.len(),
    }))
}

pub async fn insert_wait(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InsertWaitRequest>,
) -> Result<Json<serde_json::Value>> {
    let entry = state
        .recorder
        .insert_wait(request.seconds)
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(Json(serde_json::to_value(entry).map_err(anyhow::Error::from)?))
}

pub async fn insert_screenshot(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InsertScreenshotRequest>,
) -> Result<Json<serde_json::Value>> {
    let entry = state
        .recorder
        .insert_screenshot(&request.path)
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok(Json(serde_json::to_value(entry).map_err(anyhow::Error::from)?))
}

/// Insert a scroll entry at the page's current absolute offsets.
pub async fn insert_scroll(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let entry = state
        .recorder
        .insert_scroll_here()
        .await
        .map_err(|e| AppError::Browser(e.to_string()))?;

    Ok(Json(serde_json::to_value(entry).map_err(anyhow::Error::from)?))
}

/// Base64 preview of the live viewport, for the operator surface.
pub async fn session_screenshot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScreenshotPreviewResponse>> {
    let bytes = state.browser.screenshot_png().await.map_err(|e| match e {
        SessionError::NoSession => AppError::Lifecycle(e.to_string()),
        other => AppError::Browser(other.to_string()),
    })?;

    Ok(Json(ScreenshotPreviewResponse {
        format: "png".to_string(),
        base64: base64::engine::general_purpose::STANDARD.encode(bytes),
    }))
}
