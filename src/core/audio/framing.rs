use super::CodecError;

/// Split `pcm` into consecutive frames of `frame_bytes`; the final frame may be shorter.
///
/// Frame sizes should be even so 16-bit samples are never split across frames.
pub fn chunk_fixed(pcm: &[u8], frame_bytes: usize) -> Result<Vec<&[u8]>, CodecError> {
    if frame_bytes == 0 {
        return Err(CodecError::InvalidFrameSize);
    }
    Ok(pcm.chunks(frame_bytes).collect())
}
