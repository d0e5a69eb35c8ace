//! Linear-interpolation resampling for 16-bit mono PCM

use super::{CodecError, SUPPORTED_SAMPLE_RATES, pcm_bytes_to_samples, samples_to_pcm_bytes};

fn check_rate(rate: u32) -> Result<(), CodecError> {
    if SUPPORTED_SAMPLE_RATES.contains(&rate) {
        Ok(())
    } else {
        Err(CodecError::UnsupportedSampleRate(rate))
    }
}

/// Resample `samples` from `src_rate` to `dst_rate`.
///
/// Three shapes are handled explicitly:
/// - exact doubling (8 kHz -> 16 kHz): every sample is followed by the
///   average of itself and its successor; the last sample is repeated.
///   Output length is `2 * N`.
/// - exact halving (16 kHz -> 8 kHz): every other sample is kept, starting
///   at index 0. Output length is `ceil(N / 2)`.
/// - any other ratio (e.g. 24 kHz -> 16 kHz): output sample `i` is linearly
///   interpolated at source position `i * src / dst`. Output length is
///   `floor(N * dst / src)`.
///
/// # Arguments
/// * `samples` - Input PCM samples
/// * `src_rate` - Sample rate of `samples`
/// * `dst_rate` - Requested output sample rate
///
/// # Returns
/// * `Result<Vec<i16>, CodecError>` - Resampled audio, or an error for rates
///   outside `SUPPORTED_SAMPLE_RATES`
pub fn resample(samples: &[i16], src_rate: u32, dst_rate: u32) -> Result<Vec<i16>, CodecError> {
    check_rate(src_rate)?;
    check_rate(dst_rate)?;

    if src_rate == dst_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    if dst_rate == src_rate * 2 {
        return Ok(upsample_double(samples));
    }

    if src_rate == dst_rate * 2 {
        return Ok(samples.iter().step_by(2).copied().collect());
    }

    Ok(interpolate(samples, src_rate, dst_rate))
}

/// Byte-oriented wrapper around [`resample`]
pub fn resample_pcm_bytes(pcm: &[u8], src_rate: u32, dst_rate: u32) -> Result<Vec<u8>, CodecError> {
    if src_rate == dst_rate {
        check_rate(src_rate)?;
        return Ok(pcm.to_vec());
    }
    let samples = pcm_bytes_to_samples(pcm);
    let resampled = resample(&samples, src_rate, dst_rate)?;
    Ok(samples_to_pcm_bytes(&resampled))
}

fn upsample_double(samples: &[i16]) -> Vec<i16> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for (i, &current) in samples.iter().enumerate() {
        let next = samples.get(i + 1).copied().unwrap_or(current);
        out.push(current);
        out.push(((current as i32 + next as i32) / 2) as i16);
    }
    out
}

fn interpolate(samples: &[i16], src_rate: u32, dst_rate: u32) -> Vec<i16> {
    let out_len = (samples.len() as u64 * dst_rate as u64 / src_rate as u64) as usize;
    let step = src_rate as f64 / dst_rate as f64;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * step;
            let index = position.floor() as usize;
            if index >= last {
                return samples[last];
            }
            let fraction = position - index as f64;
            let a = samples[index] as f64;
            let b = samples[index + 1] as f64;
            (a + (b - a) * fraction)
                .round()
                .clamp(i16::MIN as f64, i16::MAX as f64) as i16
        })
        .collect()
}
