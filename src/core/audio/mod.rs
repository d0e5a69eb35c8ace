//! Audio codec library
//!
//! Stateless transforms used on both directions of a call:
//! - `mulaw`: G.711 μ-law <-> 16-bit linear PCM
//! - `resample`: linear-interpolation sample-rate conversion
//! - `framing`: fixed-size frame chunking for outbound streaming
//! - `wav`: canonical WAV container framing (and decoding of WAV replies)
//!
//! All PCM handled here is 16-bit signed little-endian, mono.

pub mod framing;
pub mod mulaw;
pub mod resample;
pub mod wav;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use framing::chunk_fixed;
pub use mulaw::{decode_mulaw, encode_mulaw};
pub use resample::{resample, resample_pcm_bytes};
pub use wav::{decode_wav, to_wav};

/// Sample rate of μ-law telephony media
pub const MULAW_SAMPLE_RATE: u32 = 8000;

/// Sample rate the voice protocol mandates for PCM media
pub const PROTOCOL_SAMPLE_RATE: u32 = 16000;

/// 20 ms of 16 kHz, 16-bit mono PCM
pub const DEFAULT_FRAME_BYTES: usize = 640;

/// Sample rates accepted by the resampler
pub const SUPPORTED_SAMPLE_RATES: [u32; 6] = [8000, 16000, 22050, 24000, 44100, 48000];

/// Codec errors. None of these are fatal to a session: the offending chunk is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("Frame size must be greater than zero")]
    InvalidFrameSize,

    #[error("Invalid WAV data: {0}")]
    InvalidWav(String),

    #[error("Unknown audio codec: {0}")]
    UnknownCodec(String),
}

/// Inbound media encoding for a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// Base64 16-bit PCM already at the session rate
    #[default]
    Pcm,
    /// Base64 8 kHz G.711 μ-law
    Mulaw,
}

impl AudioCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm => "pcm",
            Self::Mulaw => "mulaw",
        }
    }
}

impl std::str::FromStr for AudioCodec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pcm" | "linear16" | "pcm16" => Ok(Self::Pcm),
            "mulaw" | "mu-law" | "ulaw" | "pcmu" => Ok(Self::Mulaw),
            other => Err(CodecError::UnknownCodec(other.to_string())),
        }
    }
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encode raw bytes for a JSON media payload
#[inline]
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a JSON media payload
pub fn base64_decode(payload: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD
        .decode(payload.trim())
        .map_err(|e| CodecError::InvalidBase64(e.to_string()))
}

/// Convert little-endian PCM bytes to samples. A trailing odd byte is ignored.
pub fn pcm_bytes_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Convert samples to little-endian PCM bytes
pub fn samples_to_pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Decode an inbound `media` payload into PCM at `target_rate`.
///
/// PCM payloads are passed through untouched; μ-law payloads are expanded and
/// resampled from 8 kHz.
pub fn decode_media_payload(
    payload: &str,
    codec: AudioCodec,
    target_rate: u32,
) -> Result<Vec<u8>, CodecError> {
    let raw = base64_decode(payload)?;
    match codec {
        AudioCodec::Pcm => Ok(raw),
        AudioCodec::Mulaw => {
            let samples = decode_mulaw(&raw);
            let resampled = resample(&samples, MULAW_SAMPLE_RATE, target_rate)?;
            Ok(samples_to_pcm_bytes(&resampled))
        }
    }
}
