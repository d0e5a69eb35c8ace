//! G.711 μ-law companding

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

/// Expand a single μ-law byte to a 16-bit linear sample.
#[inline]
pub fn mulaw_to_linear(byte: u8) -> i16 {
    let inverted = !byte;
    let sign = inverted & 0x80;
    let exponent = (inverted >> 4) & 0x07;
    let mantissa = inverted & 0x0F;

    let magnitude = ((((mantissa as i32) << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Compress a 16-bit linear sample to μ-law.
#[inline]
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut value = sample as i32;
    let sign: u8 = if value < 0 {
        value = -value;
        0x80
    } else {
        0x00
    };
    value = value.min(CLIP) + BIAS;

    let mut exponent: u8 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && (value & mask) == 0 {
        exponent -= 1;
        mask >>= 1;
    }
    let mantissa = ((value >> (exponent as i32 + 3)) & 0x0F) as u8;

    !(sign | (exponent << 4) | mantissa)
}

/// Decode a μ-law byte stream. Output has exactly one sample per input byte.
pub fn decode_mulaw(data: &[u8]) -> Vec<i16> {
    data.iter().map(|b| mulaw_to_linear(*b)).collect()
}

/// Encode PCM samples as μ-law
pub fn encode_mulaw(samples: &[i16]) -> Vec<u8> {
    samples.iter().map(|s| linear_to_mulaw(*s)).collect()
}
