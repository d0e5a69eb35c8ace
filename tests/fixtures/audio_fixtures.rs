//! Audio Test Fixtures
//!
//! Generated caller and synthesizer audio, so tests never depend on files.
//!
//! - Caller audio: PCM16 mono at 16 kHz, or μ-law at 8 kHz
//! - Synthesizer audio: PCM16 mono at 24 kHz (OpenAI `pcm` format)

use std::f32::consts::PI;

/// Session PCM rate
pub const SAMPLE_RATE: u32 = 16000;

/// Rate of OpenAI `pcm` speech output
pub const TTS_SAMPLE_RATE: u32 = 24000;

/// One second of caller audio in bytes (16 kHz, 16-bit)
pub const SECOND_BYTES: usize = 32000;

/// Bytes per outbound media frame
pub const FRAME_BYTES: usize = 640;

/// Sine tone at `rate`
pub fn sine_wave(duration_samples: usize, frequency: f32, rate: u32) -> Vec<i16> {
    let angular_freq = 2.0 * PI * frequency / rate as f32;
    (0..duration_samples)
        .map(|i| ((angular_freq * i as f32).sin() * i16::MAX as f32 * 0.5) as i16)
        .collect()
}

/// Voiced-speech stand-in: a 150 Hz fundamental with two harmonics under a
/// syllable-rate envelope
pub fn speech_pattern(duration_samples: usize) -> Vec<i16> {
    let base_freq = 150.0;
    (0..duration_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let envelope = 0.5 + 0.5 * (2.0 * PI * 4.0 * t).sin();
            let waveform = (2.0 * PI * base_freq * t).sin()
                + (2.0 * PI * base_freq * 2.0 * t).sin() * 0.5
                + (2.0 * PI * base_freq * 3.0 * t).sin() * 0.25;
            (waveform / 1.75 * envelope * i16::MAX as f32 * 0.6) as i16
        })
        .collect()
}

pub fn speech_pattern_bytes(duration_samples: usize) -> Vec<u8> {
    samples_to_bytes(&speech_pattern(duration_samples))
}

/// Little-endian PCM16 bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// WAV file written with `hound`, as a provider would return it
pub fn wav_file(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for sample in samples {
            writer.write_sample(*sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
