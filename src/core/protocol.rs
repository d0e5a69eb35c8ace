//! JSON frames exchanged with the telephony provider
//!
//! Inbound frames are discriminated by `event`:
//! `start`, `media`, `clear` and `stop`. Anything else parses to
//! [`IncomingEvent::Unknown`] and is ignored by the router.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Frames received from the provider
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum IncomingEvent {
    Start(StartEvent),
    Media(MediaEvent),
    Clear(ControlEvent),
    Stop(ControlEvent),
    #[serde(other)]
    Unknown,
}

impl IncomingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Media(_) => "media",
            Self::Clear(_) => "clear",
            Self::Stop(_) => "stop",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StartEvent {
    #[serde(default, alias = "streamSid")]
    pub stream_sid: Option<String>,

    /// Call identifier, when the provider reports it on `start` rather than the upgrade URL
    #[serde(default, alias = "callSid")]
    pub call_sid: Option<String>,

    #[serde(default, alias = "customParameters", deserialize_with = "lenient_parameters")]
    pub custom_parameters: HashMap<String, String>,

    #[serde(default)]
    pub from: Option<String>,

    #[serde(default)]
    pub to: Option<String>,
}

impl StartEvent {
    /// Real call id carried by the frame, if any
    pub fn call_id(&self) -> Option<&str> {
        self.call_sid
            .as_deref()
            .or_else(|| self.custom_parameters.get("call_sid").map(String::as_str))
            .or_else(|| self.custom_parameters.get("callLogId").map(String::as_str))
            .or_else(|| self.custom_parameters.get("call_id").map(String::as_str))
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaEvent {
    #[serde(default, alias = "streamSid")]
    pub stream_sid: Option<String>,
    pub media: MediaPayload,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaPayload {
    pub payload: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ControlEvent {
    #[serde(default, alias = "streamSid")]
    pub stream_sid: Option<String>,
}

/// Providers are inconsistent about parameter value types; keep everything as strings.
fn lenient_parameters<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

/// Frames sent to the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutgoingEvent {
    Media { media: OutboundMedia },
    Mark { stream_sid: String, mark: MarkLabel },
    Response { stream_sid: String, text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMedia {
    pub payload: String,
    pub track: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkLabel {
    pub name: String,
}

impl OutgoingEvent {
    pub fn media(payload: String) -> Self {
        Self::Media {
            media: OutboundMedia {
                payload,
                track: "outbound".to_string(),
            },
        }
    }

    pub fn mark(stream_sid: impl Into<String>, phase: MarkPhase) -> Self {
        Self::Mark {
            stream_sid: stream_sid.into(),
            mark: MarkLabel {
                name: phase.as_str().to_string(),
            },
        }
    }

    pub fn response(stream_sid: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Response {
            stream_sid: stream_sid.into(),
            text: text.into(),
        }
    }
}

/// Which playback a `mark` closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPhase {
    GreetingDone,
    ResponseDone,
}

impl MarkPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreetingDone => "greeting_done",
            Self::ResponseDone => "response_done",
        }
    }
}
