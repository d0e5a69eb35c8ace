//! Router assembly

pub mod api;
pub mod voicebot;

use std::sync::Arc;

use axum::{Router, middleware, routing::get};

use crate::handlers::api::health_check;
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Combine the public, API and WebSocket routes into one application.
///
/// Layer order (outer to inner): auth -> handler. CORS and security headers
/// are added by the binary.
pub fn create_app(app_state: Arc<AppState>) -> Router {
    // Public health check route (no auth)
    let public_routes = Router::new().route("/", get(health_check));

    let protected_routes = api::create_api_router().layer(middleware::from_fn_with_state(
        app_state.clone(),
        auth_middleware,
    ));

    let voicebot_routes = voicebot::create_voicebot_router().layer(
        middleware::from_fn_with_state(app_state.clone(), auth_middleware),
    );

    public_routes
        .merge(protected_routes)
        .merge(voicebot_routes)
        .with_state(app_state)
}
