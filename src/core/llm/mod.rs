//! Response generation collaborators

mod openai;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::call_store::CallContext;
use crate::core::session::ConversationTurn;

pub use openai::{OpenAIChatConfig, OpenAIChatGenerator};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LLMError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

pub type LLMResult<T> = Result<T, LLMError>;

/// Everything the generator needs for one assistant reply
#[derive(Debug, Clone, Default)]
pub struct ResponseRequest {
    pub user_text: String,
    /// Turns before `user_text`, oldest first
    pub history: Vec<ConversationTurn>,
    /// System preamble (persona, grounding, customer)
    pub instructions: String,
    pub context: CallContext,
}

#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: &ResponseRequest) -> LLMResult<String>;

    fn name(&self) -> &str;
}
