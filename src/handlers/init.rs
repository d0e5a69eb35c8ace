//! Call initialization endpoint
//!
//! Telephony providers call `/voicebot/init` before opening the media stream
//! and receive the WebSocket URL to connect to.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, header::CONTENT_TYPE},
};
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::core::audio::PROTOCOL_SAMPLE_RATE;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

/// Path of the media-stream endpoint handed back to providers
pub const STREAM_PATH: &str = "was";

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub websocket_url: String,
}

/// Routing details for one call
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InitParams {
    pub call_sid: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl InitParams {
    fn from_map(values: &HashMap<String, String>) -> Self {
        let pick = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| values.get(*key))
                .map(|value| value.trim())
                .find(|value| !value.is_empty())
                .map(str::to_string)
        };
        Self {
            call_sid: pick(&["call_sid", "callLogId", "CallSid"]),
            from: pick(&["from", "From"]),
            to: pick(&["to", "To"]),
        }
    }

    /// Body values win over query values
    fn merge(self, overrides: Self) -> Self {
        Self {
            call_sid: overrides.call_sid.or(self.call_sid),
            from: overrides.from.or(self.from),
            to: overrides.to.or(self.to),
        }
    }
}

/// Parse a JSON or form-encoded body into a flat string map.
fn parse_body(headers: &HeaderMap, body: &Bytes) -> AppResult<HashMap<String, String>> {
    if body.is_empty() {
        return Ok(HashMap::new());
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Ok(url::form_urlencoded::parse(body).into_owned().collect());
    }

    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;
    let serde_json::Value::Object(object) = value else {
        return Err(AppError::BadRequest("Request body must be a JSON object".to_string()));
    };
    Ok(object
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            serde_json::Value::Number(n) => Some((key, n.to_string())),
            _ => None,
        })
        .collect())
}

/// Build `{base}/was?sample-rate=16000&call_sid=..&from=..&to=..`
pub fn build_websocket_url(base: &str, params: &InitParams) -> AppResult<String> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::Configuration(format!("Invalid public URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Configuration(format!("Public URL '{base}' cannot be a base")))?
        .pop_if_empty()
        .push(STREAM_PATH);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("sample-rate", &PROTOCOL_SAMPLE_RATE.to_string());
        if let Some(call_sid) = &params.call_sid {
            query.append_pair("call_sid", call_sid);
        }
        if let Some(from) = &params.from {
            query.append_pair("from", from);
        }
        if let Some(to) = &params.to {
            query.append_pair("to", to);
        }
    }
    Ok(url.to_string())
}

/// `GET|POST /voicebot/init`
pub async fn voicebot_init(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<InitResponse>> {
    let from_body = InitParams::from_map(&parse_body(&headers, &body)?);
    let params = InitParams::from_map(&query).merge(from_body);

    if params.call_sid.is_none() {
        return Err(AppError::BadRequest("call_sid is required".to_string()));
    }

    let websocket_url = build_websocket_url(&state.config.public_base_url(), &params)?;
    info!(
        call_id = params.call_sid.as_deref().unwrap_or_default(),
        websocket_url = %websocket_url,
        "Issued voicebot stream URL"
    );
    Ok(Json(InitResponse { websocket_url }))
}
