use axum::{extract::State, Json};
use std::sync::Arc;

use crate::browser::Viewport;
use crate::error::{AppError, Result};
use crate::models::{
    RecordingStatusResponse, StartRecordingRequest, StartRecordingResponse, StopRecordingResponse,
};

use super::super::state::AppState;

/// Start a recording session. Launches a browser when none is attached
/// (a start URL is required in that case), otherwise records against the
/// live session.
pub async fn start_recording(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRecordingRequest>,
) -> Result<Json<StartRecordingResponse>> {
    let _control_guard = state.control_lock.lock().await;

    if matches!(state.player.session().await, Some(s) if s.status == "running") {
        return Err(AppError::Lifecycle(
            "cannot record while a replay is running".to_string(),
        ));
    }

    if request.start_url.is_none() && !state.browser.has_session().await {
        return Err(AppError::Lifecycle(
            "no session attached and no start URL provided".to_string(),
        ));
    }

    let viewport = Viewport {
        width: request.viewport_width,
        height: request.viewport_height,
    };

    let session = state
        .recorder
        .start(request.start_url.as_deref(), request.headless, Some(viewport))
        .await
        .map_err(|e| AppError::Recording(e.to_string()))?;

    Ok(Json(StartRecordingResponse {
        session_id: session.id,
        status: session.status,
    }))
}

/// Stop the active recording session. The poll loop is joined before this
/// returns, so the script is stable afterwards.
pub async fn stop_recording(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StopRecordingResponse>> {
    let session = state
        .recorder
        .stop()
        .await
        .map_err(|e| AppError::Lifecycle(e.to_string()))?;

    Ok(Json(StopRecordingResponse {
        session_id: session.id,
        entry_count: session.entry_count,
    }))
}

/// Cancel the active recording session without completing it.
pub async fn cancel_recording(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    state
        .recorder
        .cancel()
        .await
        .map_err(|e| AppError::Recording(e.to_string()))?;

    Ok(Json(serde_json::json!({ "status": "cancelled" })))
}

pub async fn pause_recording(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    state
        .recorder
        .pause()
        .await
        .map_err(|e| AppError::Lifecycle(e.to_string()))?;

    Ok(Json(serde_json::json!({ "status": "paused" })))
}

pub async fn resume_recording(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>> {
    state
        .recorder
        .resume()
        .await
        .map_err(|e| AppError::Lifecycle(e.to_string()))?;

    Ok(Json(serde_json::json!({ "status": "recording" })))
}

pub async fn recording_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RecordingStatusResponse>> {
    let session = state
        .recorder
        .session()
        .await
        .ok_or_else(|| AppError::Lifecycle("no active recording session".to_string()))?;

    Ok(Json(RecordingStatusResponse {
        session_id: session.id,
        status: session.status,
        entry_count: session.entry_count,
        error: session.error,
    }))
}
