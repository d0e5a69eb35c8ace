//! Shared application state

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::{
    CallStore, Collaborators, FallbackTranscriber, HttpCallStore, NoopCallStore,
    OpenAIChatConfig, OpenAIChatGenerator, OpenAISynthesizer, OpenAISynthesizerConfig,
    OpenAITranscriber, OpenAITranscriberConfig, PipelineOrchestrator, SessionRegistry,
    Transcriber,
};
use crate::errors::app_error::AppError;

/// State shared by every handler.
///
/// The session registry is the only structure shared across connections.
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: Arc<SessionRegistry>,
    pub orchestrator: Arc<PipelineOrchestrator>,
}

impl AppState {
    /// Build state with the HTTP-backed collaborators described by `config`
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, AppError> {
        let collaborators = build_collaborators(&config)?;
        Ok(Self::with_collaborators(config, collaborators))
    }

    /// Build state around caller-supplied collaborators
    pub fn with_collaborators(config: ServerConfig, collaborators: Collaborators) -> Arc<Self> {
        let sessions = Arc::new(SessionRegistry::new(config.voice.buffer_settings()));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            collaborators,
            config.voice.pipeline_settings(),
        ));
        Arc::new(Self {
            config,
            sessions,
            orchestrator,
        })
    }
}

fn build_collaborators(config: &ServerConfig) -> Result<Collaborators, AppError> {
    let api_key = config.openai_api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; speech and language requests will fail until it is");
    }

    let primary = OpenAITranscriber::new(OpenAITranscriberConfig {
        api_key: api_key.clone(),
        base_url: config.openai_base_url.clone(),
        model: config.stt_model.clone(),
        label: "openai".to_string(),
    })
    .map_err(|e| AppError::Configuration(e.to_string()))?;

    let transcriber: Arc<dyn Transcriber> = match &config.stt_fallback_base_url {
        Some(base_url) => {
            let fallback = OpenAITranscriber::new(OpenAITranscriberConfig {
                api_key: config.stt_fallback_api_key.clone().unwrap_or_default(),
                base_url: base_url.clone(),
                model: config
                    .stt_fallback_model
                    .clone()
                    .unwrap_or_else(|| config.stt_model.clone()),
                label: "fallback".to_string(),
            })
            .map_err(|e| AppError::Configuration(e.to_string()))?;
            info!(fallback = %base_url, "Transcription fallback enabled");
            Arc::new(FallbackTranscriber::new(Arc::new(primary), Arc::new(fallback)))
        }
        None => Arc::new(primary),
    };

    let generator = OpenAIChatGenerator::new(OpenAIChatConfig {
        api_key: api_key.clone(),
        base_url: config.openai_base_url.clone(),
        model: config.llm_model.clone(),
        temperature: config.llm_temperature,
        max_tokens: config.llm_max_tokens,
    })
    .map_err(|e| AppError::Configuration(e.to_string()))?;

    let synthesizer = OpenAISynthesizer::new(OpenAISynthesizerConfig {
        api_key,
        base_url: config.openai_base_url.clone(),
        model: config.tts_model.clone(),
        voice: config.tts_voice.clone(),
        format: config.tts_format,
    })
    .map_err(|e| AppError::Configuration(e.to_string()))?;

    let call_store: Arc<dyn CallStore> = match &config.call_store_url {
        Some(url) => Arc::new(
            HttpCallStore::new(url, config.call_store_token.clone())
                .map_err(|e| AppError::Configuration(e.to_string()))?,
        ),
        None => {
            info!("CALL_STORE_URL not set; call records will not be persisted");
            Arc::new(NoopCallStore)
        }
    };

    Ok(Collaborators {
        transcriber,
        generator: Arc::new(generator),
        synthesizer: Arc::new(synthesizer),
        call_store,
    })
}
