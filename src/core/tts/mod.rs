//! Text-to-speech collaborators

mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::{OpenAISynthesizer, OpenAISynthesizerConfig};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TTSError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Mono 16-bit PCM produced by a synthesizer, at whatever rate it natively emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
}

/// Container requested from the synthesis endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechFormat {
    /// Headerless 24 kHz PCM
    #[default]
    Pcm,
    /// WAV; rate is read from the header
    Wav,
}

impl SpeechFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm => "pcm",
            Self::Wav => "wav",
        }
    }
}

impl std::str::FromStr for SpeechFormat {
    type Err = TTSError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pcm" => Ok(Self::Pcm),
            "wav" => Ok(Self::Wav),
            other => Err(TTSError::InvalidConfiguration(format!(
                "unsupported speech format '{other}' (expected pcm or wav)"
            ))),
        }
    }
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render `text` as speech. `voice` overrides the configured default.
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> TTSResult<SynthesizedAudio>;

    fn name(&self) -> &str;
}
