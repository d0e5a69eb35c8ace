//! Server harness and WebSocket client helpers

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use voicebot_gateway::core::audio::base64_encode;
use voicebot_gateway::{AppState, ServerConfig, create_app};

use super::collaborators::Doubles;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Loopback configuration with the default voice settings
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 0;
    config
}

/// Serve the full application on a random port
pub async fn spawn_server(config: ServerConfig, doubles: &Doubles) -> (SocketAddr, Arc<AppState>) {
    let state = AppState::with_collaborators(config, doubles.collaborators());
    let app = create_app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

pub async fn connect(addr: SocketAddr, query: &str) -> WsClient {
    let url = format!("ws://{addr}/was?{query}");
    let (ws, _response) = connect_async(url).await.unwrap();
    ws
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

pub async fn send_start(ws: &mut WsClient, stream_sid: &str, params: Value) {
    send_json(
        ws,
        json!({"event": "start", "stream_sid": stream_sid, "custom_parameters": params}),
    )
    .await;
}

pub async fn send_media(ws: &mut WsClient, stream_sid: &str, audio: &[u8]) {
    send_json(
        ws,
        json!({"event": "media", "stream_sid": stream_sid, "media": {"payload": base64_encode(audio)}}),
    )
    .await;
}

/// Next JSON frame from the server, or `None` on timeout or close.
///
/// Control frames are skipped.
pub async fn next_event(ws: &mut WsClient, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let msg = tokio::time::timeout_at(deadline, ws.next()).await.ok()??;
        match msg.ok()? {
            Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

/// Collect frames up to and including the mark named `mark`
pub async fn collect_until_mark(ws: &mut WsClient, mark: &str, wait: Duration) -> Vec<Value> {
    let mut events = Vec::new();
    while let Some(event) = next_event(ws, wait).await {
        let done = event["event"] == "mark" && event["mark"]["name"] == mark;
        events.push(event);
        if done {
            break;
        }
    }
    events
}

/// Poll `check` until it holds or `wait` elapses
pub async fn eventually(wait: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
