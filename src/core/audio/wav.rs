//! WAV container helpers
//!
//! Outbound (to transcription): raw PCM is framed with the canonical 44-byte
//! RIFF header. Inbound (from synthesis): WAV replies are parsed with `hound`
//! and down-mixed to mono.

use std::io::Cursor;

use super::CodecError;

pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;

/// Wrap 16-bit mono PCM in a WAV container.
///
/// # Arguments
/// * `pcm` - Little-endian 16-bit mono samples
/// * `sample_rate` - Sample rate written into the `fmt ` chunk
///
/// # Returns
/// `44 + pcm.len()` bytes: the header followed by the unchanged PCM payload
pub fn to_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * block_align as u32;

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

/// Parse a 16-bit integer WAV file into mono samples and its sample rate.
pub fn decode_wav(data: &[u8]) -> Result<(Vec<i16>, u32), CodecError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(data)).map_err(|e| CodecError::InvalidWav(e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(CodecError::InvalidWav(format!(
            "expected 16-bit integer PCM, got {} bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let interleaved = reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CodecError::InvalidWav(e.to_string()))?;

    let channels = spec.channels.max(1) as usize;
    if channels == 1 {
        return Ok((interleaved, spec.sample_rate));
    }

    let mono = interleaved
        .chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|s| *s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect();
    Ok((mono, spec.sample_rate))
}
