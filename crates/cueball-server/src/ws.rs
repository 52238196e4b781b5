use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use cueball_core::net::messages::{ClientCommand, SnapshotFormat};
use cueball_core::net::protocol::{
    MAX_MESSAGE_SIZE, ProtocolError, decode_command_json, decode_command_msgpack,
};

use crate::game_loop::{EncodedSnapshot, GameBroadcast};
use crate::state::{AppState, ConnectionGuard};

/// Query string accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub format: SnapshotFormat,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let Some(guard) = ConnectionGuard::try_acquire(Arc::clone(&state.ws_connection_count), max_ws)
    else {
        tracing::warn!(max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.max_message_size(MAX_MESSAGE_SIZE * 4)
        .on_upgrade(move |socket| handle_socket(socket, state, params.format, guard))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    format: SnapshotFormat,
    _guard: ConnectionGuard,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Subscribe before reading `latest` so no tick falls between the two.
    let rx = state.broadcasts.subscribe();
    let initial = state.latest.read().await.encoded.clone();
    if let Some(msg) = snapshot_message(&initial, format)
        && ws_sender.send(msg).await.is_err()
    {
        return;
    }

    tracing::info!(?format, "Observer connected");

    let writer = spawn_writer(ws_sender, rx, format);
    read_loop(&mut ws_receiver, &state).await;
    writer.abort();

    tracing::info!(?format, "Observer disconnected");
}

/// Frame a snapshot in the connection's format. Empty payloads (failed
/// encodes) are skipped.
fn snapshot_message(encoded: &EncodedSnapshot, format: SnapshotFormat) -> Option<Message> {
    match format {
        SnapshotFormat::Json if !encoded.json.as_str().is_empty() => {
            Some(Message::Text(encoded.json.clone()))
        },
        SnapshotFormat::Msgpack if !encoded.msgpack.is_empty() => {
            Some(Message::Binary(encoded.msgpack.clone()))
        },
        _ => None,
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: broadcast::Receiver<GameBroadcast>,
    format: SnapshotFormat,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(GameBroadcast::Snapshot(encoded)) => {
                    let Some(msg) = snapshot_message(&encoded, format) else {
                        continue;
                    };
                    if ws_sender.send(msg).await.is_err() {
                        break;
                    }
                },
                Ok(GameBroadcast::GameEnded) | Err(broadcast::error::RecvError::Closed) => {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Only the newest state matters; skip ahead.
                    tracing::warn!(skipped = n, "Observer lagging, dropped snapshots");
                },
            }
        }
    })
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Decode one inbound frame. Text frames carry JSON, binary frames
/// MessagePack; control frames yield `None`.
fn decode_frame(msg: &Message) -> Option<Result<ClientCommand, ProtocolError>> {
    match msg {
        Message::Text(text) => Some(decode_command_json(text.as_str())),
        Message::Binary(data) => Some(decode_command_msgpack(data)),
        _ => None,
    }
}

fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(text) => text.as_str().len(),
        Message::Binary(data) => data.len(),
        _ => 0,
    }
}

async fn read_loop(ws_receiver: &mut futures::stream::SplitStream<WebSocket>, state: &AppState) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }

        // Drop oversized messages before parsing
        let len = frame_len(&msg);
        if len > MAX_MESSAGE_SIZE {
            tracing::debug!(len, "Dropped oversized frame");
            continue;
        }

        let Some(decoded) = decode_frame(&msg) else {
            continue;
        };

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!("Rate limited");
            continue;
        }

        let cmd = match decoded {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!(error = %e, "Dropped malformed command");
                continue;
            },
        };

        if crate::api::submit(state, cmd).is_err() {
            tracing::warn!("Game loop gone, closing connection");
            break;
        }
    }
}
