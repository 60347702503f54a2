use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::handlers::{health, recording, replay, script};
use super::state::AppState;
use super::websocket::ws_handler;

pub fn create_router(state: Arc<AppState>) -> Router {
    // The sidecar binds to loopback only; CORS stays open for whichever
    // local port the operator surface is served from.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Recording endpoints
        .route("/recording/start", post(recording::start_recording))
        .route("/recording/stop", post(recording::stop_recording))
        .route("/recording/cancel", post(recording::cancel_recording))
        .route("/recording/pause", post(recording::pause_recording))
        .route("/recording/resume", post(recording::resume_recording))
        .route("/recording/status", get(recording::recording_status))
        // Replay endpoints
        .route("/replay/start", post(replay::start_replay))
        .route("/replay/stop", post(replay::stop_replay))
        .route("/replay/status", get(replay::replay_status))
        // Script endpoints
        .route("/script", get(script::get_script))
        .route("/script/clear", post(script::clear_script))
        .route("/script/save", post(script::save_script))
        .route("/script/load", post(script::load_script))
        .route("/script/wait", post(script::insert_wait))
        .route("/script/screenshot", post(script::insert_screenshot))
        .route("/script/scroll", post(script::insert_scroll))
        // Session
        .route("/session/screenshot", get(script::session_screenshot))
        // WebSocket
        .route("/ws/:client_id", get(ws_handler))
        .layer(cors)
        .with_state(state)
}
