//! Configuration module for the voicebot gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voicebot_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::audio::{AudioCodec, DEFAULT_FRAME_BYTES, PROTOCOL_SAMPLE_RATE};
use crate::core::openai_api::DEFAULT_OPENAI_BASE_URL;
use crate::core::pipeline::PipelineSettings;
use crate::core::session::BufferSettings;
use crate::core::tts::SpeechFormat;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// Audio and timing knobs for voice sessions
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Inbound media encoding
    pub audio_codec: AudioCodec,
    /// Session PCM rate. The protocol requires 16000.
    pub sample_rate: u32,
    /// Outbound media frame size in bytes (640 = 20 ms at 16 kHz)
    pub frame_bytes: usize,
    /// Audio window that makes the utterance buffer ready by size
    pub buffer_window_ms: u64,
    /// Time since last drain that makes the utterance buffer ready
    pub silence_threshold_ms: u64,
    pub stt_timeout_ms: u64,
    pub llm_timeout_ms: u64,
    pub tts_timeout_ms: u64,
    /// Deadline for call-store requests (context lookup, summary, finalization)
    pub persist_timeout_ms: u64,
    /// Keepalive ping period; must be shorter than `pong_wait_secs`
    pub ping_interval_secs: u64,
    /// Read deadline, extended whenever a pong arrives
    pub pong_wait_secs: u64,
    /// Maximum inbound WebSocket message size
    pub max_message_bytes: usize,
    /// Wrap utterances in WAV before transcription
    pub stt_wrap_wav: bool,
    /// ISO-639-1 transcription hint
    pub stt_language: Option<String>,
    /// Greeting used when the call supplies neither a greeting nor a persona
    pub default_greeting: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            audio_codec: AudioCodec::Pcm,
            sample_rate: PROTOCOL_SAMPLE_RATE,
            frame_bytes: DEFAULT_FRAME_BYTES,
            buffer_window_ms: 1000,
            silence_threshold_ms: 1500,
            stt_timeout_ms: 10_000,
            llm_timeout_ms: 15_000,
            tts_timeout_ms: 15_000,
            persist_timeout_ms: 5_000,
            ping_interval_secs: 30,
            pong_wait_secs: 60,
            max_message_bytes: 1024 * 1024,
            stt_wrap_wav: true,
            stt_language: None,
            default_greeting: None,
        }
    }
}

impl VoiceConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn buffer_settings(&self) -> BufferSettings {
        BufferSettings {
            window: Duration::from_millis(self.buffer_window_ms),
            silence_threshold: Duration::from_millis(self.silence_threshold_ms),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            sample_rate: self.sample_rate,
            frame_bytes: self.frame_bytes,
            stt_timeout: Duration::from_millis(self.stt_timeout_ms),
            llm_timeout: Duration::from_millis(self.llm_timeout_ms),
            tts_timeout: Duration::from_millis(self.tts_timeout_ms),
            persist_timeout: Duration::from_millis(self.persist_timeout_ms),
            wrap_wav: self.stt_wrap_wav,
            language: self.stt_language.clone(),
            default_greeting: self.default_greeting.clone(),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the voicebot gateway, including:
/// - Server settings (host, port, TLS, public URL)
/// - Voice session settings (codec, buffering, timeouts, keepalive)
/// - STT / LLM / TTS provider settings
/// - Call-tracking service endpoint
/// - Authentication and CORS settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Externally reachable base URL (e.g. `wss://bot.example.com`) used by the
    /// init endpoint. Defaults to `ws://{host}:{port}`.
    pub public_url: Option<String>,

    pub voice: VoiceConfig,

    // Provider settings (OpenAI-compatible endpoints)
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub stt_model: String,
    /// Secondary transcription endpoint tried when the primary fails
    pub stt_fallback_base_url: Option<String>,
    pub stt_fallback_api_key: Option<String>,
    pub stt_fallback_model: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_format: SpeechFormat,

    // Call-tracking service
    pub call_store_url: Option<String>,
    pub call_store_token: Option<String>,

    // Authentication configuration
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub auth_required: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            public_url: None,
            voice: VoiceConfig::default(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            stt_model: "whisper-1".to_string(),
            stt_fallback_base_url: None,
            stt_fallback_api_key: None,
            stt_fallback_model: None,
            llm_model: "gpt-4o-mini".to_string(),
            llm_temperature: 0.7,
            llm_max_tokens: 256,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_format: SpeechFormat::Pcm,
            call_store_url: None,
            call_store_token: None,
            auth_api_secrets: Vec::new(),
            auth_required: false,
            cors_allowed_origins: None,
        }
    }
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.stt_fallback_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.call_store_token {
            token.zeroize();
        }
        for secret in &mut self.auth_api_secrets {
            secret.secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The .env file is loaded in main.rs; actual environment variables override it.
    ///
    /// # Returns
    /// * `Result<Self, Box<dyn std::error::Error>>` - The loaded configuration or an error
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string ("host:port")
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Base URL advertised to telephony providers
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let scheme = if self.is_tls_enabled() { "wss" } else { "ws" };
                format!("{scheme}://{}:{}", self.host, self.port)
            }
        }
    }

    /// Check if API secret authentication is configured
    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// Find the API secret identifier that matches a bearer token
    ///
    /// Comparison is constant-time per entry.
    pub fn find_api_secret_id(&self, token: &str) -> Option<&str> {
        crate::auth::match_api_secret_id(token, &self.auth_api_secrets)
    }
}

pub(crate) fn parse_auth_api_secrets_json(
    json_str: &str,
) -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid AUTH_API_SECRETS_JSON format: {e}"))?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_KEYS: &[&str] = &[
        "HOST",
        "PORT",
        "PUBLIC_URL",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "AUDIO_CODEC",
        "VOICE_SAMPLE_RATE",
        "FRAME_BYTES",
        "BUFFER_WINDOW_MS",
        "SILENCE_THRESHOLD_MS",
        "STT_TIMEOUT_MS",
        "LLM_TIMEOUT_MS",
        "TTS_TIMEOUT_MS",
        "PERSIST_TIMEOUT_MS",
        "PING_INTERVAL_SECS",
        "PONG_WAIT_SECS",
        "MAX_MESSAGE_BYTES",
        "STT_WRAP_WAV",
        "STT_LANGUAGE",
        "DEFAULT_GREETING",
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "STT_MODEL",
        "STT_FALLBACK_BASE_URL",
        "STT_FALLBACK_API_KEY",
        "STT_FALLBACK_MODEL",
        "LLM_MODEL",
        "LLM_TEMPERATURE",
        "LLM_MAX_TOKENS",
        "TTS_MODEL",
        "TTS_VOICE",
        "TTS_FORMAT",
        "CALL_STORE_URL",
        "CALL_STORE_TOKEN",
        "AUTH_REQUIRED",
        "AUTH_API_SECRETS_JSON",
        "AUTH_API_SECRET",
        "AUTH_API_SECRET_ID",
        "CORS_ALLOWED_ORIGINS",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for key in ENV_KEYS {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_address_and_public_url() {
        let mut config = ServerConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 8080;
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.public_base_url(), "ws://127.0.0.1:8080");

        config.public_url = Some("wss://bot.example.com/".to_string());
        assert_eq!(config.public_base_url(), "wss://bot.example.com");
    }

    #[test]
    fn test_find_api_secret_id() {
        let mut config = ServerConfig::default();
        config.auth_api_secrets = vec![
            AuthApiSecret {
                id: "client-a".to_string(),
                secret: "secret-a".to_string(),
            },
            AuthApiSecret {
                id: "client-b".to_string(),
                secret: "secret-b".to_string(),
            },
        ];

        assert!(config.has_api_secret_auth());
        assert_eq!(config.find_api_secret_id("secret-b"), Some("client-b"));
        assert_eq!(config.find_api_secret_id("secret-c"), None);
        assert_eq!(config.find_api_secret_id(""), None);
    }

    #[test]
    fn test_voice_settings_conversion() {
        let voice = VoiceConfig::default();
        let buffer = voice.buffer_settings();
        assert_eq!(buffer.window, Duration::from_millis(1000));
        assert_eq!(buffer.silence_threshold, Duration::from_millis(1500));

        let pipeline = voice.pipeline_settings();
        assert_eq!(pipeline.sample_rate, 16000);
        assert_eq!(pipeline.frame_bytes, 640);
        assert_eq!(pipeline.stt_timeout, Duration::from_secs(10));
        assert!(pipeline.wrap_wav);
        assert!(voice.ping_interval() < voice.pong_wait());
    }

    #[test]
    fn test_parse_auth_api_secrets_json() {
        let secrets =
            parse_auth_api_secrets_json(r#"[{"id":"a","secret":"s1"},{"id":"b","secret":"s2"}]"#)
                .unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets[1].id, "b");
        assert!(parse_auth_api_secrets_json("{not json").is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.voice, VoiceConfig::default());
        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert!(!config.auth_required);
        assert!(config.call_store_url.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "9100");
            env::set_var("AUDIO_CODEC", "mulaw");
            env::set_var("SILENCE_THRESHOLD_MS", "900");
            env::set_var("STT_WRAP_WAV", "false");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("TTS_FORMAT", "wav");
            env::set_var("CALL_STORE_URL", "http://calls.internal:8081");
            env::set_var("AUTH_REQUIRED", "true");
            env::set_var("AUTH_API_SECRET", "shh");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.voice.audio_codec, AudioCodec::Mulaw);
        assert_eq!(config.voice.silence_threshold_ms, 900);
        assert!(!config.voice.stt_wrap_wav);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.tts_format, SpeechFormat::Wav);
        assert_eq!(config.call_store_url.as_deref(), Some("http://calls.internal:8081"));
        assert!(config.auth_required);
        assert_eq!(config.find_api_secret_id("shh"), Some("default"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_number() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }
        let err = ServerConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PORT"));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_auth_required_without_secrets() {
        cleanup_env_vars();
        unsafe {
            env::set_var("AUTH_REQUIRED", "true");
        }
        assert!(ServerConfig::from_env().is_err());
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080
  public_url: "wss://bot.example.com"

voice:
  audio_codec: "mulaw"
  buffer_window_ms: 800
  stt_language: "hi"
  default_greeting: "Namaste!"

providers:
  openai_api_key: "yaml-key"
  llm_model: "gpt-4o"
  tts_voice: "nova"

call_store:
  url: "https://calls.example.com"
  token: "call-token"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.public_base_url(), "wss://bot.example.com");
        assert_eq!(config.voice.audio_codec, AudioCodec::Mulaw);
        assert_eq!(config.voice.buffer_window_ms, 800);
        assert_eq!(config.voice.stt_language.as_deref(), Some("hi"));
        assert_eq!(config.voice.default_greeting.as_deref(), Some("Namaste!"));
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-key"));
        assert_eq!(config.llm_model, "gpt-4o");
        assert_eq!(config.tts_voice, "nova");
        assert_eq!(config.call_store_token.as_deref(), Some("call-token"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  host: "127.0.0.1"
providers:
  openai_api_key: "yaml-key"
"#,
        )
        .unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("PORT", "9000");
            env::set_var("OPENAI_API_KEY", "env-key");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-key"));
        // ENV value survives where YAML is silent
        assert_eq!(config.port, 9000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_voice_settings() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
voice:
  ping_interval_secs: 90
  pong_wait_secs: 60
"#,
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("ping"));
    }

    #[test]
    #[serial]
    fn test_from_file_with_auth() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
auth:
  required: true
  api_secrets:
    - id: "carrier"
      secret: "carrier-secret"
security:
  cors_allowed_origins: "https://dashboard.example.com"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert!(config.auth_required);
        assert_eq!(config.find_api_secret_id("carrier-secret"), Some("carrier"));
        assert_eq!(
            config.cors_allowed_origins.as_deref(),
            Some("https://dashboard.example.com")
        );
    }
}
