//! OpenAI-compatible `/chat/completions` client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LLMError, LLMResult, ResponseGenerator, ResponseRequest};
use crate::core::openai_api::{DEFAULT_OPENAI_BASE_URL, build_http_client, describe_error, endpoint};
use crate::core::session::Role;

#[derive(Debug, Clone)]
pub struct OpenAIChatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for OpenAIChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAIChatGenerator {
    client: Client,
    config: OpenAIChatConfig,
}

impl OpenAIChatGenerator {
    pub fn new(config: OpenAIChatConfig) -> LLMResult<Self> {
        let client = build_http_client()
            .map_err(|e| LLMError::ConfigurationError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn build_messages<'a>(request: &'a ResponseRequest) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        if !request.instructions.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &request.instructions,
            });
        }
        for turn in &request.history {
            messages.push(ChatMessage {
                role: match turn.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: &turn.content,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.user_text,
        });
        messages
    }
}

#[async_trait]
impl ResponseGenerator for OpenAIChatGenerator {
    async fn generate(&self, request: &ResponseRequest) -> LLMResult<String> {
        if self.config.api_key.is_empty() {
            return Err(LLMError::AuthenticationFailed(
                "chat generator has no API key".to_string(),
            ));
        }

        let body = ChatRequest {
            model: &self.config.model,
            messages: Self::build_messages(request),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(
            model = %self.config.model,
            history = request.history.len(),
            "Requesting chat completion"
        );

        let response = self
            .client
            .post(endpoint(&self.config.base_url, "chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = describe_error(status, &text);
            return Err(if status.as_u16() == 401 {
                LLMError::AuthenticationFailed(message)
            } else {
                LLMError::ProviderError(message)
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| LLMError::ProviderError(format!("Failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LLMError::ProviderError("Response contained no choices".to_string()))
    }

    fn name(&self) -> &str {
        "openai-chat"
    }
}
