use serde::Deserialize;
use std::path::PathBuf;

use crate::core::audio::AudioCodec;
use crate::core::tts::SpeechFormat;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration; anything left out
/// keeps its environment (or default) value.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   public_url: "wss://bot.example.com"
///   tls:
///     cert_path: "/etc/tls/cert.pem"
///     key_path: "/etc/tls/key.pem"
///
/// voice:
///   audio_codec: "pcm"          # or "mulaw"
///   buffer_window_ms: 1000
///   silence_threshold_ms: 1500
///   stt_timeout_ms: 10000
///   ping_interval_secs: 30
///   pong_wait_secs: 60
///   stt_language: "en"
///   default_greeting: "Hello! How can I help you today?"
///
/// providers:
///   openai_api_key: "sk-..."
///   llm_model: "gpt-4o-mini"
///   tts_voice: "alloy"
///   tts_format: "pcm"           # or "wav"
///   stt_fallback_base_url: "https://api.groq.com/openai/v1"
///   stt_fallback_api_key: "gsk-..."
///   stt_fallback_model: "whisper-large-v3"
///
/// call_store:
///   url: "https://calls.example.com/api"
///   token: "service-token"
///
/// auth:
///   required: true
///   api_secrets:
///     - id: "carrier"
///       secret: "your-api-secret"
///
/// security:
///   cors_allowed_origins: "https://dashboard.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub voice: Option<VoiceYaml>,
    pub providers: Option<ProvidersYaml>,
    pub call_store: Option<CallStoreYaml>,
    pub auth: Option<AuthYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Voice session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VoiceYaml {
    pub audio_codec: Option<AudioCodec>,
    pub sample_rate: Option<u32>,
    pub frame_bytes: Option<usize>,
    pub buffer_window_ms: Option<u64>,
    pub silence_threshold_ms: Option<u64>,
    pub stt_timeout_ms: Option<u64>,
    pub llm_timeout_ms: Option<u64>,
    pub tts_timeout_ms: Option<u64>,
    pub persist_timeout_ms: Option<u64>,
    pub ping_interval_secs: Option<u64>,
    pub pong_wait_secs: Option<u64>,
    pub max_message_bytes: Option<usize>,
    pub stt_wrap_wav: Option<bool>,
    pub stt_language: Option<String>,
    pub default_greeting: Option<String>,
}

/// Provider settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub stt_model: Option<String>,
    pub stt_fallback_base_url: Option<String>,
    pub stt_fallback_api_key: Option<String>,
    pub stt_fallback_model: Option<String>,
    pub llm_model: Option<String>,
    pub llm_temperature: Option<f32>,
    pub llm_max_tokens: Option<u32>,
    pub tts_model: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_format: Option<SpeechFormat>,
}

/// Call-tracking service from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CallStoreYaml {
    pub url: Option<String>,
    pub token: Option<String>,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    /// Preferred multi-secret form. If non-empty, it takes precedence over api_secret.
    #[serde(default)]
    pub api_secrets: Vec<AuthApiSecretYaml>,
    /// Legacy single-secret alias. Ignored when api_secrets is non-empty.
    pub api_secret: Option<String>,
}

/// API secret authentication entry in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AuthApiSecretYaml {
    pub id: String,
    pub secret: String,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
