//! In-memory collaborator doubles
//!
//! Each double counts its calls and records what it was given, so tests can
//! assert on pipeline behavior without any network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use voicebot_gateway::core::call_store::{CallContext, CallStore, CallStoreResult};
use voicebot_gateway::core::llm::{LLMError, LLMResult, ResponseGenerator, ResponseRequest};
use voicebot_gateway::core::pipeline::Collaborators;
use voicebot_gateway::core::session::ConversationTurn;
use voicebot_gateway::core::stt::{AudioFormat, STTError, STTResult, Transcriber};
use voicebot_gateway::core::tts::{SynthesizedAudio, Synthesizer, TTSError, TTSResult};

use super::audio_fixtures::{TTS_SAMPLE_RATE, samples_to_bytes, sine_wave};

/// Returns the same transcript every time, optionally after a delay
pub struct ScriptedTranscriber {
    reply: STTResult<String>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    payload_sizes: Mutex<Vec<usize>>,
}

impl ScriptedTranscriber {
    pub fn new(text: &str) -> Self {
        Self::with_reply(Ok(text.to_string()), Duration::ZERO)
    }

    pub fn failing() -> Self {
        Self::with_reply(
            Err(STTError::ProviderError("transcription backend down".into())),
            Duration::ZERO,
        )
    }

    pub fn with_reply(reply: STTResult<String>, delay: Duration) -> Self {
        Self {
            reply,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            payload_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `transcribe` calls seen
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn payload_sizes(&self) -> Vec<usize> {
        self.payload_sizes.lock().clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        _format: AudioFormat,
        _language: Option<&str>,
    ) -> STTResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payload_sizes.lock().push(audio.len());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.reply.clone()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Replies with a fixed prefix plus the caller's words; records every request
#[derive(Default)]
pub struct EchoGenerator {
    fail: bool,
    requests: Mutex<Vec<ResponseRequest>>,
}

impl EchoGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<ResponseRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(&self, request: &ResponseRequest) -> LLMResult<String> {
        self.requests.lock().push(request.clone());
        if self.fail {
            return Err(LLMError::ProviderError("model overloaded".into()));
        }
        Ok(format!("You said {}.", request.user_text))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Synthesizes a 440 Hz tone at 24 kHz
pub struct ToneSynthesizer {
    samples: usize,
    delay: Duration,
    fail: bool,
    texts: Mutex<Vec<(String, Option<String>)>>,
}

impl ToneSynthesizer {
    /// 1500 samples at 24 kHz -> 2000 bytes at 16 kHz -> 4 frames (3 full + 80-byte tail)
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            samples: 1500,
            delay,
            fail: false,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// `(text, voice)` pairs in request order
    pub fn texts(&self) -> Vec<(String, Option<String>)> {
        self.texts.lock().clone()
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> TTSResult<SynthesizedAudio> {
        self.texts
            .lock()
            .push((text.to_string(), voice.map(str::to_string)));
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(TTSError::ProviderError("voice unavailable".into()));
        }
        Ok(SynthesizedAudio {
            pcm: samples_to_bytes(&sine_wave(self.samples, 440.0, TTS_SAMPLE_RATE)),
            sample_rate: TTS_SAMPLE_RATE,
        })
    }

    fn name(&self) -> &str {
        "tone"
    }
}

/// Records persistence calls and serves a fixed context
#[derive(Default)]
pub struct RecordingCallStore {
    pub context: CallContext,
    finalized: Mutex<Vec<String>>,
    summaries: Mutex<Vec<(String, Vec<ConversationTurn>)>>,
}

impl RecordingCallStore {
    pub fn with_context(context: CallContext) -> Self {
        Self {
            context,
            ..Default::default()
        }
    }

    pub fn finalized(&self) -> Vec<String> {
        self.finalized.lock().clone()
    }

    pub fn summaries(&self) -> Vec<(String, Vec<ConversationTurn>)> {
        self.summaries.lock().clone()
    }
}

#[async_trait]
impl CallStore for RecordingCallStore {
    async fn persist_call_finalization(&self, call_id: &str) -> CallStoreResult<()> {
        self.finalized.lock().push(call_id.to_string());
        Ok(())
    }

    async fn persist_conversation_summary(
        &self,
        call_id: &str,
        history: &[ConversationTurn],
    ) -> CallStoreResult<()> {
        self.summaries
            .lock()
            .push((call_id.to_string(), history.to_vec()));
        Ok(())
    }

    async fn lookup_call_context(&self, _call_id: &str) -> CallStoreResult<CallContext> {
        Ok(self.context.clone())
    }
}

/// Handles to every double so tests can inspect them after the call
#[derive(Clone)]
pub struct Doubles {
    pub transcriber: Arc<ScriptedTranscriber>,
    pub generator: Arc<EchoGenerator>,
    pub synthesizer: Arc<ToneSynthesizer>,
    pub call_store: Arc<RecordingCallStore>,
}

impl Doubles {
    pub fn new(
        transcriber: ScriptedTranscriber,
        generator: EchoGenerator,
        synthesizer: ToneSynthesizer,
    ) -> Self {
        Self {
            transcriber: Arc::new(transcriber),
            generator: Arc::new(generator),
            synthesizer: Arc::new(synthesizer),
            call_store: Arc::new(RecordingCallStore::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            transcriber: self.transcriber.clone(),
            generator: self.generator.clone(),
            synthesizer: self.synthesizer.clone(),
            call_store: self.call_store.clone(),
        }
    }
}

impl Default for Doubles {
    fn default() -> Self {
        Self::new(
            ScriptedTranscriber::new("what are your opening hours"),
            EchoGenerator::default(),
            ToneSynthesizer::new(),
        )
    }
}
