//! Call-tracking persistence
//!
//! The gateway reports call completion and conversation summaries to an
//! external call-tracking service and asks it for per-call context
//! (campaign, persona, retrieved knowledge) before generating replies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::core::session::ConversationTurn;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CallStoreError {
    #[error("Invalid call store URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Call store returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Failed to decode call store response: {0}")]
    DecodeError(String),
}

pub type CallStoreResult<T> = Result<T, CallStoreError>;

/// Per-call context used to ground replies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(default, alias = "campaignId")]
    pub campaign_id: Option<String>,
    #[serde(default, alias = "personaId")]
    pub persona_id: Option<String>,
    /// Retrieved knowledge snippets to ground the reply in
    #[serde(default, alias = "ragContext")]
    pub rag_context: Option<String>,
}

impl CallContext {
    pub fn is_empty(&self) -> bool {
        self.campaign_id.is_none() && self.persona_id.is_none() && self.rag_context.is_none()
    }
}

#[async_trait]
pub trait CallStore: Send + Sync {
    /// Mark the call finished. Called once per connection teardown.
    async fn persist_call_finalization(&self, call_id: &str) -> CallStoreResult<()>;

    async fn persist_conversation_summary(
        &self,
        call_id: &str,
        history: &[ConversationTurn],
    ) -> CallStoreResult<()>;

    async fn lookup_call_context(&self, call_id: &str) -> CallStoreResult<CallContext>;
}

/// Used when no call-tracking service is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallStore;

#[async_trait]
impl CallStore for NoopCallStore {
    async fn persist_call_finalization(&self, call_id: &str) -> CallStoreResult<()> {
        debug!(call_id, "No call store configured; skipping finalization");
        Ok(())
    }

    async fn persist_conversation_summary(
        &self,
        call_id: &str,
        history: &[ConversationTurn],
    ) -> CallStoreResult<()> {
        debug!(call_id, turns = history.len(), "No call store configured; skipping summary");
        Ok(())
    }

    async fn lookup_call_context(&self, _call_id: &str) -> CallStoreResult<CallContext> {
        Ok(CallContext::default())
    }
}

/// REST client for the call-tracking service.
///
/// - `POST {base}/calls/{id}/finalize`
/// - `POST {base}/calls/{id}/summary` with `{"history": [...]}`
/// - `GET  {base}/calls/{id}/context`
pub struct HttpCallStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpCallStore {
    pub fn new(base_url: &str, token: Option<String>) -> CallStoreResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| CallStoreError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(CallStoreError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CallStoreError::NetworkError(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn call_url(&self, call_id: &str, action: &str) -> CallStoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CallStoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["calls", call_id, action]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> CallStoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CallStoreError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CallStore for HttpCallStore {
    async fn persist_call_finalization(&self, call_id: &str) -> CallStoreResult<()> {
        let url = self.call_url(call_id, "finalize")?;
        let response = self
            .authorize(self.client.post(url))
            .json(&json!({ "call_id": call_id }))
            .send()
            .await
            .map_err(|e| CallStoreError::NetworkError(e.to_string()))?;
        Self::check(response).await?;
        debug!(call_id, "Call finalized");
        Ok(())
    }

    async fn persist_conversation_summary(
        &self,
        call_id: &str,
        history: &[ConversationTurn],
    ) -> CallStoreResult<()> {
        let url = self.call_url(call_id, "summary")?;
        let response = self
            .authorize(self.client.post(url))
            .json(&json!({ "call_id": call_id, "history": history }))
            .send()
            .await
            .map_err(|e| CallStoreError::NetworkError(e.to_string()))?;
        Self::check(response).await?;
        debug!(call_id, turns = history.len(), "Conversation summary stored");
        Ok(())
    }

    async fn lookup_call_context(&self, call_id: &str) -> CallStoreResult<CallContext> {
        let url = self.call_url(call_id, "context")?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| CallStoreError::NetworkError(e.to_string()))?;
        let response = Self::check(response).await?;
        response
            .json::<CallContext>()
            .await
            .map_err(|e| CallStoreError::DecodeError(e.to_string()))
    }
}
