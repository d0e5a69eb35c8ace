//! Telephony voicebot WebSocket
//!
//! A telephony provider streams one call per connection as JSON text frames.
//!
//! ## Provider → Server
//!
//! - **start**: call metadata and `custom_parameters` (persona, voice, greeting)
//! - **media**: base64 caller audio (PCM16 at 16 kHz, or 8 kHz μ-law)
//! - **clear**: barge-in; stop playback and drop buffered audio
//! - **stop**: the call is ending
//!
//! ## Server → Provider
//!
//! - **media**: base64 PCM16 frames of 640 bytes (20 ms), last one may be short
//! - **mark**: `greeting_done` or `response_done` after each playback
//! - **response**: reply text, sent when speech synthesis fails

mod handler;
pub mod router;

pub use handler::{VoicebotQuery, negotiate_sample_rate, voicebot_ws_handler};
