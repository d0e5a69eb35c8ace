//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `init` - Issues the media-stream URL for a call
//! - `voicebot` - Telephony voicebot WebSocket

pub mod api;
pub mod init;
pub mod voicebot;

// Re-export commonly used handlers for convenient access
pub use init::voicebot_init;
pub use voicebot::voicebot_ws_handler;
