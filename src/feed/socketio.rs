//! Minimal Socket.IO v4 client over WebSocket for the Brandmeister feed
//!
//! Engine.IO framing handled here:
//! - `0{...}` open (sid, pingInterval, pingTimeout)
//! - `2` ping → reply `3` pong
//! - `40` namespace connected, `41` disconnected, `44{...}` connect error
//! - `42[name, data]` event, dispatched to the registered `MessageHandler`
//!
//! The client owns reconnection (`ReconnectDelay`); callers just run it.

use super::handler::MessageHandler;
use super::reconnect::ReconnectDelay;
use crate::config::FeedConfig;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
pub enum TransportError {
    WebSocket(tokio_tungstenite::tungstenite::Error),
    Protocol(String),
    PingTimeout,
    Closed,
    ServerDisconnect,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(err)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            TransportError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            TransportError::PingTimeout => write!(f, "No ping from server within timeout"),
            TransportError::Closed => write!(f, "Connection closed"),
            TransportError::ServerDisconnect => write!(f, "Server disconnected the namespace"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    pub ping_interval: u64,
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Connected,
    Disconnected,
    Event { name: String, data: Value },
    ConnectError(String),
    Other,
}

/// Decode one Engine.IO text frame.
pub fn parse_packet(text: &str) -> Result<Packet, TransportError> {
    let mut chars = text.chars();
    let packet = match chars.next() {
        Some('0') => {
            let info: OpenInfo = serde_json::from_str(&text[1..])
                .map_err(|e| TransportError::Protocol(format!("bad open packet: {}", e)))?;
            Packet::Open(info)
        }
        Some('1') => Packet::Close,
        Some('2') => Packet::Ping,
        Some('3') => Packet::Pong,
        Some('4') => parse_socket_packet(&text[1..])?,
        Some(_) => Packet::Other,
        None => return Err(TransportError::Protocol("empty frame".to_string())),
    };
    Ok(packet)
}

fn parse_socket_packet(text: &str) -> Result<Packet, TransportError> {
    let kind = text.chars().next();
    let body = text.get(1..).unwrap_or("");

    // Default namespace only; strip a "/ns," prefix if the server sends one.
    let body = match body.strip_prefix('/') {
        Some(rest) => rest.split_once(',').map(|(_, b)| b).unwrap_or(""),
        None => body,
    };

    match kind {
        Some('0') => Ok(Packet::Connected),
        Some('1') => Ok(Packet::Disconnected),
        Some('2') => {
            // Optional ack id precedes the JSON array.
            let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
            let args: Vec<Value> = serde_json::from_str(body)
                .map_err(|e| TransportError::Protocol(format!("bad event packet: {}", e)))?;
            let mut args = args.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => return Err(TransportError::Protocol("event without a name".to_string())),
            };
            Ok(Packet::Event {
                name,
                data: args.next().unwrap_or(Value::Null),
            })
        }
        Some('4') => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| body.to_string());
            Ok(Packet::ConnectError(message))
        }
        _ => Ok(Packet::Other),
    }
}

/// `https://host` + `/lh/socket.io` → `wss://host/lh/socket.io/?EIO=4&transport=websocket`
pub fn websocket_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    let path = path.trim_matches('/');
    format!("{}/{}/?EIO=4&transport=websocket", base, path)
}

pub struct FeedClient {
    url: String,
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            url: websocket_url(&config.url, &config.path),
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for its event name
    pub fn on(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(handler.event_name().to_string(), handler);
        self
    }

    /// Keep the feed connected until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut delay = ReconnectDelay::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            log::info!("🔌 Connecting to feed: {}", self.url);
            let result = tokio::select! {
                result = self.session(&mut delay) => result,
                _ = shutdown.changed() => break,
            };

            match result {
                Ok(()) => log::info!("Feed session ended"),
                Err(e) => log::error!("❌ Brandmeister socket error: {}", e),
            }

            let wait = delay.next_delay();
            log::warn!("⏳ Reconnect attempt {} in {}ms", delay.attempts(), wait.as_millis());
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }
        }

        log::info!("✅ Feed client stopped");
    }

    async fn session(&self, delay: &mut ReconnectDelay) -> Result<(), TransportError> {
        let (ws, _) = connect_async(self.url.as_str()).await?;
        let (mut sink, mut stream) = ws.split();

        let open = match parse_packet(&next_text(&mut stream, HANDSHAKE_TIMEOUT).await?)? {
            Packet::Open(info) => info,
            other => {
                return Err(TransportError::Protocol(format!("expected open packet, got {:?}", other)));
            }
        };
        sink.send(Message::Text("40".into())).await?;

        // Server pings every ping_interval; silence past interval + timeout means a dead link.
        let idle = Duration::from_millis(open.ping_interval + open.ping_timeout);

        loop {
            let text = next_text(&mut stream, idle).await?;
            let packet = match parse_packet(&text) {
                Ok(packet) => packet,
                Err(e) => {
                    log::warn!("⚠️  Ignoring unparsable feed frame: {}", e);
                    continue;
                }
            };

            match packet {
                Packet::Ping => sink.send(Message::Text("3".into())).await?,
                Packet::Connected => {
                    delay.reset();
                    log::info!("✅ Connected to Brandmeister network (sid {})", open.sid);
                }
                Packet::Event { name, data } => match self.handlers.get(&name) {
                    Some(handler) => {
                        handler.handle(data).await;
                    }
                    None => log::trace!("Unhandled feed event: {}", name),
                },
                Packet::ConnectError(message) => return Err(TransportError::Protocol(message)),
                Packet::Disconnected | Packet::Close => return Err(TransportError::ServerDisconnect),
                Packet::Open(_) | Packet::Pong | Packet::Other => {}
            }
        }
    }
}

async fn next_text<S>(stream: &mut S, idle: Duration) -> Result<String, TransportError>
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match tokio::time::timeout(idle, stream.next()).await {
            Err(_) => return Err(TransportError::PingTimeout),
            Ok(None) => return Err(TransportError::Closed),
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(Some(Ok(Message::Text(text)))) => return Ok(text),
            Ok(Some(Ok(Message::Close(_)))) => return Err(TransportError::Closed),
            Ok(Some(Ok(_))) => continue,
        }
    }
}
