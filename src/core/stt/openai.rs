//! OpenAI-compatible `/audio/transcriptions` client

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use super::{AudioFormat, STTError, STTResult, Transcriber};
use crate::core::audio::to_wav;
use crate::core::openai_api::{DEFAULT_OPENAI_BASE_URL, build_http_client, describe_error, endpoint};

/// Whisper accepts uploads up to 25 MB
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct OpenAITranscriberConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Label used in logs (e.g. "openai", "fallback-whisper")
    pub label: String,
}

impl Default for OpenAITranscriberConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "whisper-1".to_string(),
            label: "openai".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Batch transcription through a Whisper-style multipart upload
pub struct OpenAITranscriber {
    client: Client,
    config: OpenAITranscriberConfig,
}

impl OpenAITranscriber {
    pub fn new(config: OpenAITranscriberConfig) -> STTResult<Self> {
        let client = build_http_client()
            .map_err(|e| STTError::ConfigurationError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn build_form(&self, wav: Vec<u8>, language: Option<&str>) -> STTResult<Form> {
        let file_part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| STTError::ConfigurationError(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("response_format", "json");

        if let Some(language) = language
            && !language.is_empty()
        {
            form = form.text("language", language.to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for OpenAITranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        format: AudioFormat,
        language: Option<&str>,
    ) -> STTResult<String> {
        if self.config.api_key.is_empty() {
            return Err(STTError::AuthenticationFailed(format!(
                "{} transcriber has no API key",
                self.config.label
            )));
        }

        // The endpoint needs a real file, so bare PCM gets a header here
        let wav = match format {
            AudioFormat::Wav => audio.to_vec(),
            AudioFormat::Pcm16 { sample_rate } => to_wav(audio, sample_rate),
        };
        if wav.len() > MAX_UPLOAD_BYTES {
            return Err(STTError::AudioProcessingError(format!(
                "Audio ({} bytes) exceeds maximum upload size ({} bytes)",
                wav.len(),
                MAX_UPLOAD_BYTES
            )));
        }

        debug!(
            provider = %self.config.label,
            bytes = wav.len(),
            "Sending utterance for transcription"
        );

        let form = self.build_form(wav, language)?;
        let response = self
            .client
            .post(endpoint(&self.config.base_url, "audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| STTError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| STTError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = describe_error(status, &body);
            return Err(if status.as_u16() == 401 {
                STTError::AuthenticationFailed(message)
            } else {
                STTError::ProviderError(message)
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| STTError::ProviderError(format!("Failed to parse response: {e}")))?;

        info!(
            provider = %self.config.label,
            "Transcription complete: {} characters",
            parsed.text.len()
        );
        Ok(parsed.text)
    }

    fn name(&self) -> &str {
        &self.config.label
    }
}
