//! Per-connection event routing
//!
//! Turns inbound text frames into session operations. Nothing in here can
//! end the connection: malformed or unknown frames are logged and dropped.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::audio::decode_media_payload;
use crate::core::protocol::{ControlEvent, IncomingEvent, MediaEvent, StartEvent};
use crate::core::session::{ConnectionHandle, SessionBinding, VoiceSession};
use crate::state::AppState;

/// Prefix for call ids minted before the real one is known
pub const PROVISIONAL_PREFIX: &str = "pending-";

/// Which id the connection's session is registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallIdentity {
    /// Supplied on the upgrade request or learned from `start`
    Resolved(String),
    /// Placeholder until `start` names the call
    Provisional(String),
}

impl CallIdentity {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved(id) | Self::Provisional(id) => id,
        }
    }
}

/// Connection-level facts captured at upgrade time
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    identity: CallIdentity,
    from: Option<String>,
    to: Option<String>,
    sample_rate: u32,
    connection: ConnectionHandle,
}

impl ConnectionContext {
    pub fn from_upgrade(
        call_id: Option<String>,
        from: Option<String>,
        to: Option<String>,
        sample_rate: u32,
        connection: ConnectionHandle,
    ) -> Self {
        let identity = match call_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => CallIdentity::Resolved(id),
            None => CallIdentity::Provisional(format!("{PROVISIONAL_PREFIX}{}", Uuid::new_v4())),
        };
        Self {
            identity,
            from,
            to,
            sample_rate,
            connection,
        }
    }

    pub fn call_id(&self) -> &str {
        self.identity.as_str()
    }

    pub fn identity(&self) -> &CallIdentity {
        &self.identity
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self.identity, CallIdentity::Provisional(_))
    }

    pub fn connection_id(&self) -> &str {
        self.connection.id()
    }

    fn binding(&self, stream_id: Option<String>) -> SessionBinding {
        SessionBinding {
            call_id: self.call_id().to_string(),
            stream_id,
            from: self.from.clone(),
            to: self.to.clone(),
            sample_rate: self.sample_rate,
            connection: self.connection.clone(),
        }
    }
}

/// What a frame did; used for logging and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Started { created: bool, greeting: bool },
    Buffered { pipeline_started: bool },
    Cleared,
    Stopped,
    /// The frame needs a session this connection cannot resolve yet
    NoSession,
    /// Malformed, undecodable or unrecognized; dropped
    Dropped,
}

pub struct EventRouter {
    app_state: Arc<AppState>,
    context: ConnectionContext,
}

impl EventRouter {
    pub fn new(app_state: Arc<AppState>, context: ConnectionContext) -> Self {
        Self { app_state, context }
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Register (or rebind) the session for this connection.
    pub fn attach(&self) -> Arc<VoiceSession> {
        let (session, created) = self.app_state.sessions.get_or_create(self.context.binding(None));
        debug!(
            call_id = %self.context.call_id(),
            connection_id = %self.context.connection_id(),
            created,
            "Connection attached to session"
        );
        session
    }

    pub fn handle_text(&mut self, text: &str) -> Dispatch {
        match serde_json::from_str::<IncomingEvent>(text) {
            Ok(event) => self.handle_event(event),
            Err(e) => {
                warn!(
                    call_id = %self.context.call_id(),
                    "Dropping malformed frame ({} bytes): {}",
                    text.len(),
                    e
                );
                Dispatch::Dropped
            }
        }
    }

    pub fn handle_event(&mut self, event: IncomingEvent) -> Dispatch {
        match event {
            IncomingEvent::Start(start) => self.on_start(start),
            IncomingEvent::Media(media) => self.on_media(media),
            IncomingEvent::Clear(control) => self.on_clear(control),
            IncomingEvent::Stop(control) => self.on_stop(control),
            IncomingEvent::Unknown => {
                debug!(call_id = %self.context.call_id(), "Ignoring unrecognized event");
                Dispatch::Dropped
            }
        }
    }

    fn on_start(&mut self, start: StartEvent) -> Dispatch {
        let registry = &self.app_state.sessions;

        if let Some(real_id) = start.call_id() {
            let provisional = match &self.context.identity {
                CallIdentity::Provisional(provisional) => Some(provisional.clone()),
                CallIdentity::Resolved(current) => {
                    if current != real_id {
                        debug!(
                            call_id = %current,
                            start_call_id = real_id,
                            "start names a different call id; keeping the upgrade id"
                        );
                    }
                    None
                }
            };
            if let Some(provisional) = provisional {
                registry.promote(&provisional, real_id);
                self.context.identity = CallIdentity::Resolved(real_id.to_string());
            }
        }

        if start.from.is_some() {
            self.context.from = start.from.clone();
        }
        if start.to.is_some() {
            self.context.to = start.to.clone();
        }

        let (session, created) = registry.get_or_create(self.context.binding(start.stream_sid.clone()));
        session.mark_started();
        if session.set_custom_parameters_once(start.custom_parameters) {
            debug!(call_id = %session.call_id(), "Captured custom parameters");
        }

        let greeting = session.claim_greeting();
        if greeting {
            self.app_state.orchestrator.spawn_greeting(&session);
        }

        info!(
            call_id = %session.call_id(),
            stream_sid = %session.stream_id(),
            provisional = self.context.is_provisional(),
            created,
            greeting,
            "Call started"
        );
        Dispatch::Started { created, greeting }
    }

    /// Session this connection may act on, if any.
    ///
    /// Before `start`, a provisional connection has nothing the provider
    /// would recognize, so its frames are ignored.
    fn resolve_session(&self) -> Option<Arc<VoiceSession>> {
        let session = self.app_state.sessions.get(self.context.call_id())?;
        if self.context.is_provisional() && !session.is_started() {
            return None;
        }
        if session.connection_id() != self.context.connection_id() {
            debug!(
                call_id = %self.context.call_id(),
                connection_id = %self.context.connection_id(),
                "Session has moved to another connection"
            );
            return None;
        }
        Some(session)
    }

    fn on_media(&mut self, media: MediaEvent) -> Dispatch {
        let Some(session) = self.resolve_session() else {
            return Dispatch::NoSession;
        };
        if !session.is_active() {
            debug!(call_id = %session.call_id(), "Media after stop ignored");
            return Dispatch::Dropped;
        }

        let voice = &self.app_state.config.voice;
        let pcm = match decode_media_payload(&media.media.payload, voice.audio_codec, session.sample_rate()) {
            Ok(pcm) => pcm,
            Err(e) => {
                warn!(call_id = %session.call_id(), codec = %voice.audio_codec, "Dropping media chunk: {}", e);
                return Dispatch::Dropped;
            }
        };

        session.buffer().append(pcm);
        let pipeline_started =
            session.buffer().is_ready() && self.app_state.orchestrator.try_spawn_utterance(&session);
        Dispatch::Buffered { pipeline_started }
    }

    fn on_clear(&mut self, control: ControlEvent) -> Dispatch {
        let Some(session) = self.resolve_session() else {
            return Dispatch::NoSession;
        };
        info!(
            call_id = %session.call_id(),
            stream_sid = control.stream_sid.as_deref().unwrap_or_default(),
            "Barge-in"
        );
        session.barge_in();
        Dispatch::Cleared
    }

    fn on_stop(&mut self, control: ControlEvent) -> Dispatch {
        let Some(session) = self.resolve_session() else {
            return Dispatch::NoSession;
        };
        info!(
            call_id = %session.call_id(),
            stream_sid = control.stream_sid.as_deref().unwrap_or_default(),
            turns = session.history().len(),
            "Call stopped"
        );
        if session.mark_inactive() {
            self.app_state.orchestrator.spawn_summary(&session);
        } else {
            debug!(call_id = %session.call_id(), "Duplicate stop ignored");
        }
        Dispatch::Stopped
    }
}
