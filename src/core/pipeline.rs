//! Utterance pipeline: STT -> LLM -> TTS -> framed audio
//!
//! One pipeline run per ready utterance, at most one in flight per session.
//! Every external call is bounded by its own deadline and by the session's
//! cancel token; a barge-in (`clear`) cancels the token and any output the
//! run has not yet handed to the socket is discarded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::audio::{CodecError, base64_encode, chunk_fixed, resample_pcm_bytes, to_wav};
use super::call_store::{CallContext, CallStore, CallStoreError};
use super::llm::{LLMError, ResponseGenerator, ResponseRequest};
use super::prompt;
use super::protocol::{MarkPhase, OutgoingEvent};
use super::session::{ConnectionClosed, ConversationTurn, VoiceSession};
use super::stt::{AudioFormat, STTError, Transcriber};
use super::tts::{Synthesizer, TTSError};

/// External services the pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub call_store: Arc<dyn CallStore>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Rate of inbound PCM and of every outbound frame
    pub sample_rate: u32,
    pub frame_bytes: usize,
    pub stt_timeout: Duration,
    pub llm_timeout: Duration,
    pub tts_timeout: Duration,
    pub persist_timeout: Duration,
    /// Send WAV (rather than bare PCM) to the transcriber
    pub wrap_wav: bool,
    pub language: Option<String>,
    pub default_greeting: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frame_bytes: 640,
            stt_timeout: Duration::from_secs(10),
            llm_timeout: Duration::from_secs(15),
            tts_timeout: Duration::from_secs(15),
            persist_timeout: Duration::from_secs(5),
            wrap_wav: true,
            language: None,
            default_greeting: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    ContextLookup,
    Generation,
    Synthesis,
    Persistence,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transcription => "transcription",
            Self::ContextLookup => "context lookup",
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
            Self::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline cancelled")]
    Cancelled,

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("transcription failed: {0}")]
    Transcription(#[from] STTError),

    #[error("generation failed: {0}")]
    Generation(#[from] LLMError),

    #[error("synthesis failed: {0}")]
    Synthesis(#[from] TTSError),

    #[error("call store failed: {0}")]
    CallStore(#[from] CallStoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] ConnectionClosed),
}

/// How a run ended; returned for logging and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Another run held the single-flight guard
    Busy,
    EmptyBuffer,
    NoTranscript,
    Responded { fallback: bool, delivery: Delivery },
    Cancelled,
    /// The connection went away mid-response
    Disconnected,
}

/// How spoken output reached the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Audio { frames: usize },
    /// Synthesis failed; the text went out as a `response` frame
    TextOnly,
}

async fn bounded<T, E, F>(
    stage: Stage,
    cancel: &CancellationToken,
    limit: Duration,
    fut: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<PipelineError>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(inner) => inner.map_err(Into::into),
            Err(_) => Err(PipelineError::Timeout { stage, after: limit }),
        },
    }
}

pub struct PipelineOrchestrator {
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Start a pipeline run in the background unless one is already in flight.
    ///
    /// Returns `false` when the session is busy; the buffered audio stays put
    /// and is picked up by the next readiness check.
    ///
    /// The buffer is drained before the task is spawned: audio appended after
    /// a later barge-in belongs to the next run.
    pub fn try_spawn_utterance(self: &Arc<Self>, session: &Arc<VoiceSession>) -> bool {
        let Some(guard) = session.try_begin_pipeline() else {
            debug!(call_id = %session.call_id(), "Pipeline already running, skipping trigger");
            return false;
        };
        let cancel = session.cancel_token();
        let audio = session.buffer().drain_and_clear();
        if audio.is_empty() {
            return false;
        }

        let this = Arc::clone(self);
        let session = Arc::clone(session);
        tokio::spawn(async move {
            let _guard = guard;
            let outcome = this.process_utterance(&session, audio, &cancel).await;
            debug!(call_id = %session.call_id(), ?outcome, "Pipeline run finished");
        });
        true
    }

    /// Drain the buffer and run one utterance cycle. Callers must hold the
    /// session's pipeline guard.
    pub async fn run_utterance(
        &self,
        session: &VoiceSession,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let audio = session.buffer().drain_and_clear();
        self.process_utterance(session, audio, cancel).await
    }

    /// Run one utterance cycle over already-drained audio.
    pub async fn process_utterance(
        &self,
        session: &VoiceSession,
        audio: Vec<u8>,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        if audio.is_empty() {
            return PipelineOutcome::EmptyBuffer;
        }
        if cancel.is_cancelled() {
            return PipelineOutcome::Cancelled;
        }
        let call_id = session.call_id();
        let collaborators = &self.collaborators;

        // 1. Transcribe
        let sample_rate = session.sample_rate();
        let (payload, format) = if self.settings.wrap_wav {
            (to_wav(&audio, sample_rate), AudioFormat::Wav)
        } else {
            (audio, AudioFormat::Pcm16 { sample_rate })
        };
        let language = session
            .custom_parameter("stt_language")
            .or_else(|| self.settings.language.clone());

        let transcript = match bounded(
            Stage::Transcription,
            cancel,
            self.settings.stt_timeout,
            collaborators
                .transcriber
                .transcribe(&payload, format, language.as_deref()),
        )
        .await
        {
            Ok(text) => text.trim().to_string(),
            Err(PipelineError::Cancelled) => return PipelineOutcome::Cancelled,
            Err(e) => {
                warn!(%call_id, "Transcription failed, waiting for next utterance: {}", e);
                return PipelineOutcome::NoTranscript;
            }
        };
        if transcript.is_empty() {
            debug!(%call_id, "Empty transcript");
            return PipelineOutcome::NoTranscript;
        }
        info!(%call_id, transcript = %transcript, "User said");

        let prior_history = session.history();
        session.push_turn(ConversationTurn::user(transcript.clone()));

        // 2. Context + preamble
        let context = match bounded(
            Stage::ContextLookup,
            cancel,
            self.settings.persist_timeout,
            collaborators.call_store.lookup_call_context(&call_id),
        )
        .await
        {
            Ok(context) => context,
            Err(PipelineError::Cancelled) => return PipelineOutcome::Cancelled,
            Err(e) => {
                warn!(%call_id, "Call context lookup failed, continuing without it: {}", e);
                CallContext::default()
            }
        };
        let request = ResponseRequest {
            instructions: prompt::build_instruction_preamble(&session.custom_parameters(), &context),
            user_text: transcript.clone(),
            history: prior_history,
            context,
        };

        // 3. Generate
        let (reply, fallback) = match bounded(
            Stage::Generation,
            cancel,
            self.settings.llm_timeout,
            collaborators.generator.generate(&request),
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => (text.trim().to_string(), false),
            Ok(_) => {
                warn!(%call_id, "Generator returned an empty reply, using fallback");
                (prompt::fallback_response(&transcript), true)
            }
            Err(PipelineError::Cancelled) => return PipelineOutcome::Cancelled,
            Err(e) => {
                warn!(%call_id, "Generation failed, using fallback: {}", e);
                (prompt::fallback_response(&transcript), true)
            }
        };

        if cancel.is_cancelled() {
            return PipelineOutcome::Cancelled;
        }
        info!(%call_id, reply = %reply, fallback, "Assistant reply");
        session.push_turn(ConversationTurn::assistant(reply.clone()));

        // 4. Speak
        match self.speak(session, &reply, MarkPhase::ResponseDone, cancel).await {
            Ok(delivery) => PipelineOutcome::Responded { fallback, delivery },
            Err(PipelineError::Cancelled) => PipelineOutcome::Cancelled,
            Err(e) => {
                warn!(%call_id, "Failed to deliver reply: {}", e);
                PipelineOutcome::Disconnected
            }
        }
    }

    /// Speak the opening greeting in the background. Not recorded in history.
    ///
    /// Holds the session's pipeline guard until the greeting mark is queued.
    /// Audio buffered meanwhile is picked up right after.
    pub fn spawn_greeting(self: &Arc<Self>, session: &Arc<VoiceSession>) {
        let this = Arc::clone(self);
        let session = Arc::clone(session);
        let guard = session.try_begin_pipeline();
        tokio::spawn(async move {
            let guard = match guard {
                Some(guard) => guard,
                None => session.begin_pipeline().await,
            };
            let cancel = session.cancel_token();
            match this.run_greeting(&session, &cancel).await {
                Ok(delivery) => debug!(call_id = %session.call_id(), ?delivery, "Greeting delivered"),
                Err(PipelineError::Cancelled) => {
                    debug!(call_id = %session.call_id(), "Greeting interrupted")
                }
                Err(e) => warn!(call_id = %session.call_id(), "Greeting failed: {}", e),
            }
            drop(guard);

            if session.is_active() && session.buffer().is_ready() {
                this.try_spawn_utterance(&session);
            }
        });
    }

    pub async fn run_greeting(
        &self,
        session: &VoiceSession,
        cancel: &CancellationToken,
    ) -> Result<Delivery, PipelineError> {
        let text = prompt::greeting_text(
            &session.custom_parameters(),
            self.settings.default_greeting.as_deref(),
        );
        info!(call_id = %session.call_id(), greeting = %text, "Sending greeting");
        self.speak(session, &text, MarkPhase::GreetingDone, cancel).await
    }

    /// Synthesize `text` and stream it, falling back to a text frame when synthesis fails.
    async fn speak(
        &self,
        session: &VoiceSession,
        text: &str,
        phase: MarkPhase,
        cancel: &CancellationToken,
    ) -> Result<Delivery, PipelineError> {
        let voice = session
            .custom_parameter("voice")
            .or_else(|| session.custom_parameter("persona_voice"));

        let synthesized = bounded(
            Stage::Synthesis,
            cancel,
            self.settings.tts_timeout,
            self.collaborators.synthesizer.synthesize(text, voice.as_deref()),
        )
        .await
        .and_then(|audio| {
            resample_pcm_bytes(&audio.pcm, audio.sample_rate, self.settings.sample_rate)
                .map_err(PipelineError::from)
        });

        match synthesized {
            Ok(pcm) => {
                let frames = self.stream_audio(session, &pcm, phase, cancel).await?;
                Ok(Delivery::Audio { frames })
            }
            Err(PipelineError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => {
                warn!(call_id = %session.call_id(), "Synthesis failed, sending text instead: {}", e);
                session
                    .connection()
                    .send(OutgoingEvent::response(session.stream_id(), text))
                    .await?;
                Ok(Delivery::TextOnly)
            }
        }
    }

    /// Queue `pcm` as back-to-back media frames followed by a mark.
    ///
    /// Frames are tagged with `cancel`, so the sender drops whatever is still
    /// queued once the response is interrupted.
    async fn stream_audio(
        &self,
        session: &VoiceSession,
        pcm: &[u8],
        phase: MarkPhase,
        cancel: &CancellationToken,
    ) -> Result<usize, PipelineError> {
        let connection = session.connection();
        let frames = chunk_fixed(pcm, self.settings.frame_bytes)?;

        for frame in &frames {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            connection
                .send_audio(OutgoingEvent::media(base64_encode(frame)), cancel)
                .await?;
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        connection
            .send_audio(OutgoingEvent::mark(session.stream_id(), phase), cancel)
            .await?;

        debug!(call_id = %session.call_id(), frames = frames.len(), mark = phase.as_str(), "Audio queued");
        Ok(frames.len())
    }

    /// Persist the conversation summary in the background (on `stop`).
    pub fn spawn_summary(self: &Arc<Self>, session: &Arc<VoiceSession>) {
        let history = session.history();
        if history.is_empty() {
            return;
        }
        let call_id = session.call_id();
        let store = Arc::clone(&self.collaborators.call_store);
        let limit = self.settings.persist_timeout;
        tokio::spawn(async move {
            let never = CancellationToken::new();
            let result = bounded(
                Stage::Persistence,
                &never,
                limit,
                store.persist_conversation_summary(&call_id, &history),
            )
            .await;
            match result {
                Ok(()) => info!(%call_id, turns = history.len(), "Conversation summary persisted"),
                Err(e) => warn!(%call_id, "Failed to persist conversation summary: {}", e),
            }
        });
    }

    /// Mark the call finished in the background (on disconnect).
    pub fn spawn_finalization(self: &Arc<Self>, call_id: String) {
        let store = Arc::clone(&self.collaborators.call_store);
        let limit = self.settings.persist_timeout;
        tokio::spawn(async move {
            let never = CancellationToken::new();
            match bounded(
                Stage::Persistence,
                &never,
                limit,
                store.persist_call_finalization(&call_id),
            )
            .await
            {
                Ok(()) => info!(%call_id, "Call finalized"),
                Err(e) => warn!(%call_id, "Failed to finalize call: {}", e),
            }
        });
    }
}
