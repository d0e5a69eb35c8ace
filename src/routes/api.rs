use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::init;
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Note: Authentication middleware is applied by [`super::create_app`]
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Providers call this before opening the media stream
        .route(
            "/voicebot/init",
            get(init::voicebot_init).post(init::voicebot_init),
        )
        .layer(TraceLayer::new_for_http())
}
