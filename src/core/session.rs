//! Per-call session state

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::buffer::AudioUtteranceBuffer;
use super::protocol::OutgoingEvent;

/// Messages queued for a connection's sender task
#[derive(Debug)]
pub enum OutboundRoute {
    /// Control and text frames; always delivered
    Event(OutgoingEvent),
    /// Audio that belongs to one response; dropped once `cancel` fires
    Audio {
        event: OutgoingEvent,
        cancel: CancellationToken,
    },
    Ping,
    Close,
}

/// The connection's outbound channel was closed
#[derive(Debug, Clone, thiserror::Error)]
#[error("connection {0} is closed")]
pub struct ConnectionClosed(pub String);

/// Write side of one WebSocket connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: String,
    tx: mpsc::Sender<OutboundRoute>,
}

impl ConnectionHandle {
    pub fn new(id: impl Into<String>, tx: mpsc::Sender<OutboundRoute>) -> Self {
        Self { id: id.into(), tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn send(&self, event: OutgoingEvent) -> Result<(), ConnectionClosed> {
        self.route(OutboundRoute::Event(event)).await
    }

    pub async fn send_audio(
        &self,
        event: OutgoingEvent,
        cancel: &CancellationToken,
    ) -> Result<(), ConnectionClosed> {
        self.route(OutboundRoute::Audio {
            event,
            cancel: cancel.clone(),
        })
        .await
    }

    pub async fn route(&self, route: OutboundRoute) -> Result<(), ConnectionClosed> {
        self.tx
            .send(route)
            .await
            .map_err(|_| ConnectionClosed(self.id.clone()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Values supplied when a session is created or refreshed by a (re)connection
#[derive(Debug, Clone)]
pub struct SessionBinding {
    pub call_id: String,
    pub stream_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub sample_rate: u32,
    pub connection: ConnectionHandle,
}

/// Buffer sizing for new sessions
#[derive(Debug, Clone, Copy)]
pub struct BufferSettings {
    pub window: Duration,
    pub silence_threshold: Duration,
}

#[derive(Debug)]
struct SessionState {
    call_id: String,
    stream_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    sample_rate: u32,
    connection: ConnectionHandle,
    custom_parameters: Option<HashMap<String, String>>,
    history: Vec<ConversationTurn>,
    greeting_sent: bool,
    started: bool,
    active: bool,
    cancel: CancellationToken,
}

/// State for one phone call.
///
/// Mutable fields live behind a single `RwLock`. The utterance buffer has
/// its own lock and the pipeline single-flight guard is a separate async
/// mutex, so holding the state lock is never required across an await.
#[derive(Debug)]
pub struct VoiceSession {
    state: RwLock<SessionState>,
    buffer: AudioUtteranceBuffer,
    pipeline_lock: Arc<Mutex<()>>,
}

impl VoiceSession {
    pub fn new(binding: SessionBinding, buffer_settings: BufferSettings) -> Self {
        let buffer = AudioUtteranceBuffer::for_window(
            binding.sample_rate,
            buffer_settings.window,
            buffer_settings.silence_threshold,
        );
        Self {
            state: RwLock::new(SessionState {
                call_id: binding.call_id,
                stream_id: binding.stream_id,
                from: binding.from,
                to: binding.to,
                sample_rate: binding.sample_rate,
                connection: binding.connection,
                custom_parameters: None,
                history: Vec::new(),
                greeting_sent: false,
                started: false,
                active: true,
                cancel: CancellationToken::new(),
            }),
            buffer,
            pipeline_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Rebind to a new connection. History, parameters and greeting state survive.
    pub fn refresh(&self, binding: SessionBinding) {
        let mut state = self.state.write();
        state.call_id = binding.call_id;
        if binding.stream_id.is_some() {
            state.stream_id = binding.stream_id;
        }
        if binding.from.is_some() {
            state.from = binding.from;
        }
        if binding.to.is_some() {
            state.to = binding.to;
        }
        state.sample_rate = binding.sample_rate;
        state.connection = binding.connection;
        state.active = true;
    }

    pub fn call_id(&self) -> String {
        self.state.read().call_id.clone()
    }

    pub(crate) fn set_call_id(&self, call_id: &str) {
        self.state.write().call_id = call_id.to_string();
    }

    /// Stream id, or an empty string before `start`
    pub fn stream_id(&self) -> String {
        self.state.read().stream_id.clone().unwrap_or_default()
    }

    pub fn set_stream_id(&self, stream_id: Option<String>) {
        if stream_id.is_some() {
            self.state.write().stream_id = stream_id;
        }
    }

    pub fn from(&self) -> Option<String> {
        self.state.read().from.clone()
    }

    pub fn to(&self) -> Option<String> {
        self.state.read().to.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.state.read().sample_rate
    }

    pub fn connection(&self) -> ConnectionHandle {
        self.state.read().connection.clone()
    }

    pub fn connection_id(&self) -> String {
        self.state.read().connection.id().to_string()
    }

    pub fn buffer(&self) -> &AudioUtteranceBuffer {
        &self.buffer
    }

    /// Store the `start` parameters. Only the first call has any effect.
    pub fn set_custom_parameters_once(&self, params: HashMap<String, String>) -> bool {
        let mut state = self.state.write();
        if state.custom_parameters.is_some() {
            return false;
        }
        state.custom_parameters = Some(params);
        true
    }

    pub fn custom_parameters(&self) -> HashMap<String, String> {
        self.state.read().custom_parameters.clone().unwrap_or_default()
    }

    pub fn custom_parameter(&self, key: &str) -> Option<String> {
        self.state
            .read()
            .custom_parameters
            .as_ref()
            .and_then(|p| p.get(key))
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    pub fn mark_started(&self) {
        let mut state = self.state.write();
        state.started = true;
        state.active = true;
    }

    pub fn is_started(&self) -> bool {
        self.state.read().started
    }

    /// Returns whether the session was still active.
    pub fn mark_inactive(&self) -> bool {
        std::mem::replace(&mut self.state.write().active, false)
    }

    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    /// Claim the greeting for this session. Returns `true` exactly once.
    pub fn claim_greeting(&self) -> bool {
        let mut state = self.state.write();
        if state.greeting_sent {
            return false;
        }
        state.greeting_sent = true;
        true
    }

    pub fn greeting_sent(&self) -> bool {
        self.state.read().greeting_sent
    }

    pub fn push_turn(&self, turn: ConversationTurn) {
        self.state.write().history.push(turn);
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.state.read().history.clone()
    }

    /// Token observed by the in-flight pipeline and greeting
    pub fn cancel_token(&self) -> CancellationToken {
        self.state.read().cancel.clone()
    }

    /// Cancel in-flight work, install a fresh token and discard buffered audio.
    pub fn barge_in(&self) {
        let previous = {
            let mut state = self.state.write();
            std::mem::replace(&mut state.cancel, CancellationToken::new())
        };
        previous.cancel();
        self.buffer.clear();
        debug!(call_id = %self.call_id(), "Barge-in: cancelled in-flight response");
    }

    /// Cancel everything for good (session removal)
    pub fn shutdown(&self) {
        let mut state = self.state.write();
        state.active = false;
        state.cancel.cancel();
    }

    /// Try to become the single running pipeline. The guard releases on drop.
    pub fn try_begin_pipeline(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.pipeline_lock).try_lock_owned().ok()
    }

    /// Wait for the running pipeline (if any) to finish, then take the guard.
    pub async fn begin_pipeline(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.pipeline_lock).lock_owned().await
    }
}
