//! Speech-to-text collaborators

mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub use openai::{OpenAITranscriber, OpenAITranscriberConfig};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum STTError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),
}

pub type STTResult<T> = Result<T, STTError>;

/// Container of the audio handed to [`Transcriber::transcribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Complete WAV file
    Wav,
    /// Headerless 16-bit mono PCM
    Pcm16 { sample_rate: u32 },
}

/// Turns one utterance into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio`. An empty string means nothing intelligible was said.
    async fn transcribe(
        &self,
        audio: &[u8],
        format: AudioFormat,
        language: Option<&str>,
    ) -> STTResult<String>;

    fn name(&self) -> &str;
}

/// Tries `primary`, then `fallback` when the primary fails outright.
pub struct FallbackTranscriber {
    primary: Arc<dyn Transcriber>,
    fallback: Arc<dyn Transcriber>,
}

impl FallbackTranscriber {
    pub fn new(primary: Arc<dyn Transcriber>, fallback: Arc<dyn Transcriber>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl Transcriber for FallbackTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        format: AudioFormat,
        language: Option<&str>,
    ) -> STTResult<String> {
        match self.primary.transcribe(audio, format, language).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    "Primary transcription failed, trying fallback: {}",
                    e
                );
                self.fallback.transcribe(audio, format, language).await
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
