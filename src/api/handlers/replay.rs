use axum::{extract::State, Json};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{ReplayStatusResponse, StartReplayRequest, StartReplayResponse};

use super::super::state::AppState;

/// Start replaying the current script against the attached session (or a
/// fresh one aimed at the script's leading navigate entry).
pub async fn start_replay(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartReplayRequest>,
) -> Result<Json<StartReplayResponse>> {
    let _control_guard = state.control_lock.lock().await;

    if matches!(state.recorder.session().await, Some(s) if s.status == "recording" || s.status == "paused")
    {
        return Err(AppError::Lifecycle(
            "cannot replay while a recording is active".to_string(),
        ));
    }

    {
        let script = state.script.lock().await;
        if script.is_empty() {
            return Err(AppError::Validation("script is empty".to_string()));
        }
        if !state.browser.has_session().await && script.first_navigate_url().is_none() {
            return Err(AppError::Lifecycle(
                "no session attached and the script has no leading navigate entry".to_string(),
            ));
        }
    }

    if matches!(state.player.session().await, Some(s) if s.status == "running") {
        return Err(AppError::Lifecycle("a replay is already running".to_string()));
    }

    let session = state
        .player
        .play(request.headless)
        .await
        .map_err(|e| AppError::Replay(e.to_string()))?;

    Ok(Json(StartReplayResponse {
        session_id: session.id,
        status: session.status,
        total_steps: session.total_steps,
    }))
}

/// Request cooperative cancellation of the running replay.
pub async fn stop_replay(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    state
        .player
        .stop()
        .await
        .map_err(|e| AppError::Replay(e.to_string()))?;

    Ok(Json(serde_json::json!({ "status": "stopping" })))
}

pub async fn replay_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReplayStatusResponse>> {
    let session = state
        .player
        .session()
        .await
        .ok_or_else(|| AppError::Lifecycle("no replay session".to_string()))?;

    Ok(Json(ReplayStatusResponse {
        session_id: session.id,
        status: session.status,
        current_step: session.current_step,
        total_steps: session.total_steps,
        summary: session.summary,
        results: session.results,
        error: session.error,
    }))
}
