//! Pieces shared by the OpenAI-compatible REST clients

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Upper bound for a single HTTP exchange. Pipeline stages apply their own,
/// tighter deadlines on top of this.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIErrorDetail {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Human-readable message for a failed response body
pub fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => match parsed.error.error_type {
            Some(kind) => format!("OpenAI API error: {} ({kind})", parsed.error.message),
            None => format!("OpenAI API error: {}", parsed.error.message),
        },
        Err(_) => format!("OpenAI API error ({status}): {body}"),
    }
}

pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
}
