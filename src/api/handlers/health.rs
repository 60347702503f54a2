use axum::{extract::State, Json};
use std::sync::Arc;

use super::super::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "session_attached": state.browser.has_session().await,
    }))
}
