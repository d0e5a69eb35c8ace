//! Environment variable loading

use std::path::PathBuf;
use std::str::FromStr;

use super::{AuthApiSecret, ServerConfig, TlsConfig, parse_auth_api_secrets_json};

/// Non-empty, trimmed value of `key`
pub(super) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) fn env_parse<T>(key: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {key} ('{raw}'): {e}").into()),
        None => Ok(None),
    }
}

pub(super) fn env_bool(key: &str) -> Result<Option<bool>, Box<dyn std::error::Error>> {
    match env_string(key) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid boolean for {key}: '{raw}'").into()),
        },
        None => Ok(None),
    }
}

fn load_auth_secrets() -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    if let Some(json) = env_string("AUTH_API_SECRETS_JSON") {
        return parse_auth_api_secrets_json(&json);
    }
    // Legacy single-secret form
    Ok(env_string("AUTH_API_SECRET")
        .map(|secret| {
            vec![AuthApiSecret {
                id: env_string("AUTH_API_SECRET_ID").unwrap_or_else(|| "default".to_string()),
                secret,
            }]
        })
        .unwrap_or_default())
}

/// Build a configuration from defaults overlaid with environment variables
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse("PORT")? {
        config.port = port;
    }
    config.tls = match (env_string("TLS_CERT_PATH"), env_string("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    };
    config.public_url = env_string("PUBLIC_URL");

    // Voice session settings
    let voice = &mut config.voice;
    if let Some(codec) = env_parse("AUDIO_CODEC")? {
        voice.audio_codec = codec;
    }
    if let Some(rate) = env_parse("VOICE_SAMPLE_RATE")? {
        voice.sample_rate = rate;
    }
    if let Some(bytes) = env_parse("FRAME_BYTES")? {
        voice.frame_bytes = bytes;
    }
    if let Some(ms) = env_parse("BUFFER_WINDOW_MS")? {
        voice.buffer_window_ms = ms;
    }
    if let Some(ms) = env_parse("SILENCE_THRESHOLD_MS")? {
        voice.silence_threshold_ms = ms;
    }
    if let Some(ms) = env_parse("STT_TIMEOUT_MS")? {
        voice.stt_timeout_ms = ms;
    }
    if let Some(ms) = env_parse("LLM_TIMEOUT_MS")? {
        voice.llm_timeout_ms = ms;
    }
    if let Some(ms) = env_parse("TTS_TIMEOUT_MS")? {
        voice.tts_timeout_ms = ms;
    }
    if let Some(ms) = env_parse("PERSIST_TIMEOUT_MS")? {
        voice.persist_timeout_ms = ms;
    }
    if let Some(secs) = env_parse("PING_INTERVAL_SECS")? {
        voice.ping_interval_secs = secs;
    }
    if let Some(secs) = env_parse("PONG_WAIT_SECS")? {
        voice.pong_wait_secs = secs;
    }
    if let Some(bytes) = env_parse("MAX_MESSAGE_BYTES")? {
        voice.max_message_bytes = bytes;
    }
    if let Some(wrap) = env_bool("STT_WRAP_WAV")? {
        voice.stt_wrap_wav = wrap;
    }
    voice.stt_language = env_string("STT_LANGUAGE");
    voice.default_greeting = env_string("DEFAULT_GREETING");

    // Providers
    config.openai_api_key = env_string("OPENAI_API_KEY");
    if let Some(url) = env_string("OPENAI_BASE_URL") {
        config.openai_base_url = url;
    }
    if let Some(model) = env_string("STT_MODEL") {
        config.stt_model = model;
    }
    config.stt_fallback_base_url = env_string("STT_FALLBACK_BASE_URL");
    config.stt_fallback_api_key = env_string("STT_FALLBACK_API_KEY");
    config.stt_fallback_model = env_string("STT_FALLBACK_MODEL");
    if let Some(model) = env_string("LLM_MODEL") {
        config.llm_model = model;
    }
    if let Some(temperature) = env_parse("LLM_TEMPERATURE")? {
        config.llm_temperature = temperature;
    }
    if let Some(max_tokens) = env_parse("LLM_MAX_TOKENS")? {
        config.llm_max_tokens = max_tokens;
    }
    if let Some(model) = env_string("TTS_MODEL") {
        config.tts_model = model;
    }
    if let Some(voice) = env_string("TTS_VOICE") {
        config.tts_voice = voice;
    }
    if let Some(format) = env_parse("TTS_FORMAT")? {
        config.tts_format = format;
    }

    // Call tracking
    config.call_store_url = env_string("CALL_STORE_URL");
    config.call_store_token = env_string("CALL_STORE_TOKEN");

    // Auth + security
    config.auth_api_secrets = load_auth_secrets()?;
    if let Some(required) = env_bool("AUTH_REQUIRED")? {
        config.auth_required = required;
    }
    config.cors_allowed_origins = env_string("CORS_ALLOWED_ORIGINS");

    Ok(config)
}
