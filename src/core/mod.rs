pub mod audio;
pub mod buffer;
pub mod call_store;
pub mod llm;
pub mod openai_api;
pub mod pipeline;
pub mod prompt;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod stt;
pub mod tts;

// Re-export commonly used types for convenience
pub use audio::{AudioCodec, CodecError};
pub use buffer::AudioUtteranceBuffer;
pub use call_store::{CallContext, CallStore, CallStoreError, HttpCallStore, NoopCallStore};
pub use llm::{LLMError, OpenAIChatConfig, OpenAIChatGenerator, ResponseGenerator, ResponseRequest};
pub use pipeline::{
    Collaborators, Delivery, PipelineError, PipelineOrchestrator, PipelineOutcome,
    PipelineSettings,
};
pub use protocol::{IncomingEvent, MarkPhase, OutgoingEvent};
pub use registry::SessionRegistry;
pub use session::{
    BufferSettings, ConnectionHandle, ConversationTurn, OutboundRoute, Role, SessionBinding,
    VoiceSession,
};
pub use stt::{
    AudioFormat, FallbackTranscriber, OpenAITranscriber, OpenAITranscriberConfig, STTError,
    Transcriber,
};
pub use tts::{
    OpenAISynthesizer, OpenAISynthesizerConfig, SpeechFormat, SynthesizedAudio, Synthesizer,
    TTSError,
};
