//! Per-session utterance accumulator

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default silence window that makes a non-full buffer ready
pub const DEFAULT_SILENCE_THRESHOLD: Duration = Duration::from_millis(1500);

#[derive(Debug)]
struct BufferState {
    chunks: Vec<Vec<u8>>,
    total_len: usize,
    last_drain: Instant,
}

/// Accumulates inbound PCM until an utterance is ready for transcription.
///
/// The buffer is ready when either
/// - its total size reaches `max_bytes`, or
/// - at least `silence_threshold` has elapsed since it was last drained
///   (regardless of whether anything was appended in between).
///
/// All operations take the internal lock, so `append` and `drain_and_clear`
/// are safe to call from the read loop and a pipeline task concurrently.
#[derive(Debug)]
pub struct AudioUtteranceBuffer {
    state: Mutex<BufferState>,
    max_bytes: usize,
    silence_threshold: Duration,
}

impl AudioUtteranceBuffer {
    pub fn new(max_bytes: usize, silence_threshold: Duration) -> Self {
        Self {
            state: Mutex::new(BufferState {
                chunks: Vec::new(),
                total_len: 0,
                last_drain: Instant::now(),
            }),
            max_bytes,
            silence_threshold,
        }
    }

    /// Buffer sized for `window` of 16-bit mono audio at `sample_rate`
    pub fn for_window(sample_rate: u32, window: Duration, silence_threshold: Duration) -> Self {
        let bytes_per_second = sample_rate as u128 * 2;
        let max_bytes = (bytes_per_second * window.as_millis() / 1000) as usize;
        Self::new(max_bytes.max(2), silence_threshold)
    }

    /// Append a chunk. Empty chunks are ignored.
    pub fn append(&self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        state.total_len += chunk.len();
        state.chunks.push(chunk);
    }

    pub fn is_ready(&self) -> bool {
        let state = self.state.lock();
        state.total_len >= self.max_bytes || state.last_drain.elapsed() >= self.silence_threshold
    }

    /// Return the concatenated contents and reset, stamping the drain time.
    pub fn drain_and_clear(&self) -> Vec<u8> {
        let mut state = self.state.lock();
        let chunks = std::mem::take(&mut state.chunks);
        let total_len = std::mem::replace(&mut state.total_len, 0);
        state.last_drain = Instant::now();
        drop(state);

        let mut audio = Vec::with_capacity(total_len);
        for chunk in chunks {
            audio.extend_from_slice(&chunk);
        }
        audio
    }

    /// Discard buffered audio (barge-in). Also restarts the silence window.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.chunks.clear();
        state.total_len = 0;
        state.last_drain = Instant::now();
    }

    pub fn len(&self) -> usize {
        self.state.lock().total_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> AudioUtteranceBuffer {
        AudioUtteranceBuffer::new(1000, Duration::from_secs(60))
    }

    #[test]
    fn test_for_window_sizing() {
        let buffer = AudioUtteranceBuffer::for_window(
            16000,
            Duration::from_millis(1000),
            DEFAULT_SILENCE_THRESHOLD,
        );
        assert_eq!(buffer.max_bytes(), 32000);
    }

    #[test]
    fn test_ready_on_size() {
        let buffer = buffer();
        buffer.append(vec![0; 600]);
        assert!(!buffer.is_ready());
        buffer.append(vec![0; 400]);
        assert!(buffer.is_ready());
    }

    #[test]
    fn test_ready_on_silence_without_appends() {
        let buffer = AudioUtteranceBuffer::new(1000, Duration::from_millis(20));
        assert!(!buffer.is_ready());
        std::thread::sleep(Duration::from_millis(40));
        assert!(buffer.is_ready());
    }

    #[test]
    fn test_drain_concatenates_in_order_and_resets() {
        let buffer = buffer();
        buffer.append(vec![1, 2]);
        buffer.append(vec![]);
        buffer.append(vec![3]);
        assert_eq!(buffer.len(), 3);

        assert_eq!(buffer.drain_and_clear(), vec![1, 2, 3]);
        assert!(buffer.is_empty());
        assert!(buffer.drain_and_clear().is_empty());
    }

    #[test]
    fn test_drain_restarts_silence_window() {
        let buffer = AudioUtteranceBuffer::new(1000, Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(40));
        assert!(buffer.is_ready());
        buffer.drain_and_clear();
        assert!(!buffer.is_ready());
    }

    #[test]
    fn test_clear_discards() {
        let buffer = buffer();
        buffer.append(vec![9; 1200]);
        assert!(buffer.is_ready());
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.is_ready());
    }

    #[test]
    fn test_concurrent_append_and_drain() {
        use std::sync::Arc;

        let buffer = Arc::new(AudioUtteranceBuffer::new(usize::MAX, Duration::from_secs(60)));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        buffer.append(vec![1; 4]);
                    }
                })
            })
            .collect();

        let mut drained = 0;
        for _ in 0..50 {
            drained += buffer.drain_and_clear().len();
        }
        for writer in writers {
            writer.join().unwrap();
        }
        drained += buffer.drain_and_clear().len();
        assert_eq!(drained, 4 * 250 * 4);
    }
}
