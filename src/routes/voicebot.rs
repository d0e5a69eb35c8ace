//! Voicebot WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::voicebot::voicebot_ws_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the voicebot WebSocket router
///
/// # Endpoints
///
/// - `GET /was` - media stream for telephony providers
/// - `GET /voicebot/ws` - same handler under a descriptive path
///
/// # Query parameters
///
/// `call_sid` (or `callLogId`), `from`, `to`, `sample-rate`. The sample rate
/// is always 16000; other values are overridden with a warning. Without a
/// call id the connection waits for the first `start` frame to name the call.
pub fn create_voicebot_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/was", get(voicebot_ws_handler))
        .route("/voicebot/ws", get(voicebot_ws_handler))
        .layer(TraceLayer::new_for_http())
}
