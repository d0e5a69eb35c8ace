//! Voicebot WebSocket transport loop

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::Auth;
use crate::core::audio::PROTOCOL_SAMPLE_RATE;
use crate::core::protocol::OutgoingEvent;
use crate::core::session::{ConnectionHandle, OutboundRoute};
use crate::state::AppState;

use super::router::{ConnectionContext, EventRouter};

/// Outbound queue depth; a 10 s reply is ~500 frames
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Time allowed for the close frame to go out during teardown
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Upgrade query parameters
#[derive(Debug, Default, Deserialize)]
pub struct VoicebotQuery {
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default, rename = "callLogId")]
    pub call_log_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// Kept as text so a bad value is overridden instead of rejecting the upgrade
    #[serde(default, rename = "sample-rate")]
    pub sample_rate: Option<String>,
}

impl VoicebotQuery {
    pub fn call_id(&self) -> Option<String> {
        self.call_sid
            .as_deref()
            .or(self.call_log_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// The protocol only runs at 16 kHz; anything else is overridden.
pub fn negotiate_sample_rate(requested: Option<&str>) -> u32 {
    match requested.map(str::trim) {
        None | Some("") => PROTOCOL_SAMPLE_RATE,
        Some(raw) => match raw.parse::<u32>() {
            Ok(PROTOCOL_SAMPLE_RATE) => PROTOCOL_SAMPLE_RATE,
            _ => {
                warn!(
                    requested = raw,
                    "Unsupported sample rate, using {PROTOCOL_SAMPLE_RATE} Hz"
                );
                PROTOCOL_SAMPLE_RATE
            }
        },
    }
}

/// Voicebot WebSocket handler
///
/// Upgrades the connection and runs the call until the provider hangs up,
/// the socket errors, or no pong arrives within the configured wait.
pub async fn voicebot_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<VoicebotQuery>,
    Extension(auth): Extension<Auth>,
) -> Response {
    let sample_rate = negotiate_sample_rate(query.sample_rate.as_deref());
    info!(
        auth_id = ?auth.id,
        call_id = ?query.call_id(),
        sample_rate,
        "Voicebot WebSocket upgrade requested"
    );

    let max_message_size = state.config.voice.max_message_bytes;
    ws.max_message_size(max_message_size)
        .max_frame_size(max_message_size)
        .on_upgrade(move |socket| handle_voicebot_socket(socket, state, query, sample_rate))
}

async fn handle_voicebot_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    query: VoicebotQuery,
    sample_rate: u32,
) {
    let connection_id = Uuid::new_v4().to_string();
    let (sender, mut receiver) = socket.split();
    let (route_tx, route_rx) = mpsc::channel::<OutboundRoute>(CHANNEL_BUFFER_SIZE);
    let connection = ConnectionHandle::new(connection_id.clone(), route_tx);

    let context = ConnectionContext::from_upgrade(
        query.call_id(),
        query.from.clone(),
        query.to.clone(),
        sample_rate,
        connection.clone(),
    );
    let mut router = EventRouter::new(Arc::clone(&app_state), context);
    router.attach();

    info!(
        call_id = %router.context().call_id(),
        %connection_id,
        provisional = router.context().is_provisional(),
        "Voicebot WebSocket connection established"
    );

    let mut sender_task = tokio::spawn(run_sender(sender, route_rx));

    let done = CancellationToken::new();
    let keepalive_task = tokio::spawn(run_keepalive(
        connection.clone(),
        app_state.config.voice.ping_interval(),
        done.clone(),
    ));

    let pong_wait = app_state.config.voice.pong_wait();
    let mut read_deadline = Instant::now() + pong_wait;

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let dispatch = router.handle_text(text.as_str());
                    debug!(call_id = %router.context().call_id(), ?dispatch, "Frame routed");
                }
                Some(Ok(Message::Pong(_))) => {
                    read_deadline = Instant::now() + pong_wait;
                }
                Some(Ok(Message::Ping(_))) => {
                    // axum answers pings itself
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(call_id = %router.context().call_id(), bytes = data.len(), "Ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) => {
                    info!(call_id = %router.context().call_id(), "Close frame received");
                    break;
                }
                Some(Err(e)) => {
                    warn!(call_id = %router.context().call_id(), "WebSocket read error: {}", e);
                    break;
                }
                None => {
                    info!(call_id = %router.context().call_id(), "WebSocket connection closed by peer");
                    break;
                }
            },
            _ = tokio::time::sleep_until(read_deadline) => {
                warn!(
                    call_id = %router.context().call_id(),
                    "No pong for {}s, closing connection",
                    pong_wait.as_secs()
                );
                break;
            }
        }
    }

    // Cleanup
    done.cancel();
    keepalive_task.abort();

    let call_id = router.context().call_id().to_string();
    let provisional = router.context().is_provisional();
    if let Some(session) = app_state.sessions.remove_if_bound(&call_id, &connection_id) {
        if provisional {
            debug!(%call_id, "Call never identified itself; skipping finalization");
        } else {
            app_state.orchestrator.spawn_finalization(session.call_id());
        }
    }

    let _ = tokio::time::timeout(CLOSE_GRACE, connection.route(OutboundRoute::Close)).await;
    if tokio::time::timeout(CLOSE_GRACE, &mut sender_task).await.is_err() {
        sender_task.abort();
    }

    info!(%call_id, %connection_id, "Voicebot WebSocket connection terminated");
}

/// Owns the socket's write half; everything outbound goes through here.
async fn run_sender(
    mut sender: SplitSink<WebSocket, Message>,
    mut route_rx: mpsc::Receiver<OutboundRoute>,
) {
    while let Some(route) = route_rx.recv().await {
        let result = match route {
            OutboundRoute::Event(event) => send_event(&mut sender, &event).await,
            OutboundRoute::Audio { event, cancel } => {
                if cancel.is_cancelled() {
                    continue;
                }
                send_event(&mut sender, &event).await
            }
            OutboundRoute::Ping => sender.send(Message::Ping(Bytes::new())).await,
            OutboundRoute::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(e) = result {
            warn!("Failed to send WebSocket message: {}", e);
            break;
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &OutgoingEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            error!("Failed to serialize outgoing event: {}", e);
            Ok(())
        }
    }
}

async fn run_keepalive(connection: ConnectionHandle, interval: Duration, done: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = done.cancelled() => break,
            _ = ticker.tick() => {
                if connection.route(OutboundRoute::Ping).await.is_err() {
                    break;
                }
            }
        }
    }
}
