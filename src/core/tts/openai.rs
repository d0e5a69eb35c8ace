//! OpenAI-compatible `/audio/speech` client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use super::{SpeechFormat, SynthesizedAudio, Synthesizer, TTSError, TTSResult};
use crate::core::audio::{decode_wav, samples_to_pcm_bytes};
use crate::core::openai_api::{DEFAULT_OPENAI_BASE_URL, build_http_client, describe_error, endpoint};

/// OpenAI speech output is always 24 kHz
pub const OPENAI_TTS_SAMPLE_RATE: u32 = 24000;

/// Longest input the endpoint accepts
const MAX_INPUT_CHARS: usize = 4096;

#[derive(Debug, Clone)]
pub struct OpenAISynthesizerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub voice: String,
    pub format: SpeechFormat,
}

impl Default for OpenAISynthesizerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            format: SpeechFormat::Pcm,
        }
    }
}

pub struct OpenAISynthesizer {
    client: Client,
    config: OpenAISynthesizerConfig,
}

impl OpenAISynthesizer {
    pub fn new(config: OpenAISynthesizerConfig) -> TTSResult<Self> {
        let client = build_http_client()
            .map_err(|e| TTSError::InvalidConfiguration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn request_body(&self, text: &str, voice: Option<&str>) -> serde_json::Value {
        let input: String = text.chars().take(MAX_INPUT_CHARS).collect();
        json!({
            "model": self.config.model,
            "input": input,
            "voice": voice.filter(|v| !v.is_empty()).unwrap_or(self.config.voice.as_str()),
            "response_format": self.config.format.as_str(),
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAISynthesizer {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> TTSResult<SynthesizedAudio> {
        if self.config.api_key.is_empty() {
            return Err(TTSError::AuthenticationFailed(
                "synthesizer has no API key".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(TTSError::AudioGenerationFailed("empty input text".to_string()));
        }

        debug!(chars = text.len(), model = %self.config.model, "Requesting speech synthesis");

        let response = self
            .client
            .post(endpoint(&self.config.base_url, "audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(text, voice))
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = describe_error(status, &body);
            return Err(if status.as_u16() == 401 {
                TTSError::AuthenticationFailed(message)
            } else {
                TTSError::ProviderError(message)
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Failed to read audio: {e}")))?;

        let audio = match self.config.format {
            SpeechFormat::Pcm => SynthesizedAudio {
                pcm: bytes.to_vec(),
                sample_rate: OPENAI_TTS_SAMPLE_RATE,
            },
            SpeechFormat::Wav => {
                let (samples, sample_rate) = decode_wav(&bytes)
                    .map_err(|e| TTSError::AudioGenerationFailed(e.to_string()))?;
                SynthesizedAudio {
                    pcm: samples_to_pcm_bytes(&samples),
                    sample_rate,
                }
            }
        };

        info!(
            bytes = audio.pcm.len(),
            sample_rate = audio.sample_rate,
            "Speech synthesis complete"
        );
        Ok(audio)
    }

    fn name(&self) -> &str {
        "openai-tts"
    }
}
