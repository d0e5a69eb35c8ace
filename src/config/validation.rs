//! Configuration validation logic

use std::collections::HashSet;

use url::Url;

use super::{AuthApiSecret, ServerConfig, VoiceConfig};
use crate::core::audio::PROTOCOL_SAMPLE_RATE;

type ValidationResult = Result<(), Box<dyn std::error::Error>>;

pub(super) fn validate(config: &ServerConfig) -> ValidationResult {
    validate_auth_api_secrets(&config.auth_api_secrets)?;
    validate_auth_required(config.auth_required, &config.auth_api_secrets)?;
    validate_voice_config(&config.voice)?;
    validate_url("PUBLIC_URL", config.public_url.as_deref(), &["ws", "wss", "http", "https"])?;
    validate_url("OPENAI_BASE_URL", Some(&config.openai_base_url), &["http", "https"])?;
    validate_url(
        "STT_FALLBACK_BASE_URL",
        config.stt_fallback_base_url.as_deref(),
        &["http", "https"],
    )?;
    validate_url("CALL_STORE_URL", config.call_store_url.as_deref(), &["http", "https"])?;
    if !(0.0..=2.0).contains(&config.llm_temperature) {
        return Err(format!(
            "LLM temperature must be between 0.0 and 2.0, got {}",
            config.llm_temperature
        )
        .into());
    }
    Ok(())
}

pub(super) fn validate_auth_api_secrets(secrets: &[AuthApiSecret]) -> ValidationResult {
    let mut seen = HashSet::new();
    for entry in secrets {
        if entry.id.trim().is_empty() {
            return Err("Auth API secret entries require a non-empty id".into());
        }
        if entry.secret.is_empty() {
            return Err(format!("Auth API secret '{}' has an empty secret", entry.id).into());
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(format!("Duplicate auth API secret id '{}'", entry.id).into());
        }
    }
    Ok(())
}

pub(super) fn validate_auth_required(
    auth_required: bool,
    secrets: &[AuthApiSecret],
) -> ValidationResult {
    if auth_required && secrets.is_empty() {
        return Err(
            "AUTH_REQUIRED is true but no API secrets are configured \
             (set AUTH_API_SECRETS_JSON or AUTH_API_SECRET)"
                .into(),
        );
    }
    Ok(())
}

pub(super) fn validate_voice_config(voice: &VoiceConfig) -> ValidationResult {
    if voice.sample_rate != PROTOCOL_SAMPLE_RATE {
        return Err(format!(
            "Voice sample rate must be {PROTOCOL_SAMPLE_RATE} Hz, got {}",
            voice.sample_rate
        )
        .into());
    }
    if voice.frame_bytes == 0 || voice.frame_bytes % 2 != 0 {
        return Err(format!(
            "Frame size must be a positive even number of bytes, got {}",
            voice.frame_bytes
        )
        .into());
    }
    if voice.buffer_window_ms == 0 || voice.silence_threshold_ms == 0 {
        return Err("Buffer window and silence threshold must be greater than zero".into());
    }
    let timeouts = [
        ("stt_timeout_ms", voice.stt_timeout_ms),
        ("llm_timeout_ms", voice.llm_timeout_ms),
        ("tts_timeout_ms", voice.tts_timeout_ms),
        ("persist_timeout_ms", voice.persist_timeout_ms),
    ];
    if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
        return Err(format!("{name} must be greater than zero").into());
    }
    if voice.ping_interval_secs == 0 || voice.ping_interval_secs >= voice.pong_wait_secs {
        return Err(format!(
            "Keepalive ping interval ({}s) must be non-zero and shorter than the pong wait ({}s)",
            voice.ping_interval_secs, voice.pong_wait_secs
        )
        .into());
    }
    if voice.max_message_bytes < voice.frame_bytes {
        return Err("max_message_bytes must be at least one frame".into());
    }
    Ok(())
}

fn validate_url(name: &str, value: Option<&str>, schemes: &[&str]) -> ValidationResult {
    let Some(value) = value else {
        return Ok(());
    };
    let url = Url::parse(value).map_err(|e| format!("Invalid {name} '{value}': {e}"))?;
    if !schemes.contains(&url.scheme()) {
        return Err(format!(
            "Invalid {name} '{value}': scheme must be one of {}",
            schemes.join(", ")
        )
        .into());
    }
    Ok(())
}
