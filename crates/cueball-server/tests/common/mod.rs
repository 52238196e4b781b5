use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use cueball_core::net::messages::ClientCommand;
use cueball_core::net::protocol::{
    decode_snapshot_json, decode_snapshot_msgpack, encode_command_json, encode_command_msgpack,
};
use cueball_eightball::{EightBall, GameSnapshot};

use cueball_server::config::ServerConfig;
use cueball_server::state::AppState;
use cueball_server::{build_app, build_app_with_game};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Tick rate used by the integration suites so shots settle in well under a
/// second.
pub const TEST_TICK_RATE_HZ: u32 = 500;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

/// Defaults with a fast tick rate.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    };
    config.game.tick_rate_hz = TEST_TICK_RATE_HZ;
    config.limits.broadcast_capacity = 1024;
    config
}

impl TestServer {
    pub async fn new() -> Self {
        Self::from_config(test_config()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (app, state) = build_app(config);
        Self::serve(listener, app, state).await
    }

    /// Start a server whose loop drives a prepared game.
    pub async fn with_game(game: EightBall) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (app, state) = build_app_with_game(test_config(), game);
        Self::serve(listener, app, state).await
    }

    async fn serve(listener: tokio::net::TcpListener, app: axum::Router, state: AppState) -> Self {
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn ws_url_with_format(&self, format: &str) -> String {
        format!("ws://{}/ws?format={format}", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Read the next data frame (5s timeout).
pub async fn ws_read_frame(stream: &mut WsStream) -> Message {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => return msg,
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Decode a snapshot frame: text is JSON, binary is MessagePack.
pub fn decode_frame(msg: &Message) -> GameSnapshot {
    match msg {
        Message::Text(text) => decode_snapshot_json(text.as_str()).unwrap(),
        Message::Binary(data) => decode_snapshot_msgpack(data).unwrap(),
        other => panic!("Expected a data frame, got: {other:?}"),
    }
}

pub async fn ws_read_snapshot(stream: &mut WsStream) -> GameSnapshot {
    let msg = ws_read_frame(stream).await;
    decode_frame(&msg)
}

/// Read snapshots until one satisfies `pred`, giving up after `max_frames`.
pub async fn ws_read_until<F>(stream: &mut WsStream, max_frames: usize, pred: F) -> GameSnapshot
where
    F: Fn(&GameSnapshot) -> bool,
{
    for _ in 0..max_frames {
        let snapshot = ws_read_snapshot(stream).await;
        if pred(&snapshot) {
            return snapshot;
        }
    }
    panic!("No matching snapshot within {max_frames} frames");
}

/// After a shot: wait for the table to go live, then for it to settle.
pub async fn ws_wait_for_rest(stream: &mut WsStream) -> GameSnapshot {
    ws_read_until(stream, 2000, |s| !s.can_shoot || s.game_over).await;
    ws_read_until(stream, 20_000, |s| s.can_shoot || s.game_over).await
}

pub async fn ws_send_json(stream: &mut WsStream, cmd: &ClientCommand) {
    let text = encode_command_json(cmd).unwrap();
    stream.send(Message::Text(text.into())).await.unwrap();
}

pub async fn ws_send_msgpack(stream: &mut WsStream, cmd: &ClientCommand) {
    let data = encode_command_msgpack(cmd).unwrap();
    stream.send(Message::Binary(data.into())).await.unwrap();
}

/// Whether the socket is still open: a frame arrives before the timeout.
pub async fn ws_still_open(stream: &mut WsStream) -> bool {
    matches!(
        tokio::time::timeout(Duration::from_secs(2), stream.next()).await,
        Ok(Some(Ok(Message::Text(_) | Message::Binary(_))))
    )
}
