use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use shootout_core::net::messages::{
    ClientMessage, CreateMatchMsg, JoinMatchMsg, ServerMessage, SubmitChoiceMsg,
};
use shootout_core::net::protocol::{decode_server_message, encode_client_message};
use shootout_core::player::ParticipantId;

use shootout_server::build_app;
use shootout_server::config::{ServerConfig, TimingConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default config.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server with round timings shortened so full matches
    /// finish quickly.
    pub async fn fast() -> Self {
        let config = ServerConfig {
            timing: fast_timing(),
            rng_seed: Some(42),
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        fallback_ms: 400,
        bot_min_delay_ms: 20,
        bot_max_delay_ms: 60,
        resolve_delay_ms: 20,
        inter_round_ms: 100,
    }
}

/// Connect a WebSocket client and consume the Welcome message.
/// Returns the stream and the identity the server assigned.
pub async fn ws_connect(url: &str) -> (WsStream, ParticipantId) {
    let (mut stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    match ws_read_server_msg(&mut stream).await {
        ServerMessage::Welcome(w) => (stream, w.participant_id),
        other => panic!("Expected Welcome, got: {other:?}"),
    }
}

/// Send a ClientMessage.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Create a match and return its code. Skips lobby broadcasts.
pub async fn ws_create_match(
    stream: &mut WsStream,
    name: &str,
    is_public: bool,
    rounds_per_player: u32,
) -> String {
    let msg = ClientMessage::CreateMatch(CreateMatchMsg {
        display_name: name.to_string(),
        is_public,
        rounds_per_player,
    });
    ws_send_client_msg(stream, &msg).await;
    match ws_read_until(stream, |m| matches!(m, ServerMessage::MatchCreated(_))).await {
        ServerMessage::MatchCreated(c) => c.code,
        other => panic!("Expected MatchCreated, got: {other:?}"),
    }
}

pub async fn ws_join_match(stream: &mut WsStream, code: &str, name: &str) {
    let msg = ClientMessage::JoinMatch(JoinMatchMsg {
        code: code.to_string(),
        display_name: name.to_string(),
    });
    ws_send_client_msg(stream, &msg).await;
}

pub async fn ws_submit(stream: &mut WsStream, code: &str, zone: i64) {
    let msg = ClientMessage::SubmitChoice(SubmitChoiceMsg {
        code: code.to_string(),
        zone,
    });
    ws_send_client_msg(stream, &msg).await;
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
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

/// Try to read raw binary data, returning None on timeout.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read messages until one matches `pred`, discarding the rest
/// (lobby broadcasts arrive at any time).
pub async fn ws_read_until(
    stream: &mut WsStream,
    pred: impl Fn(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = ws_read_server_msg(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
}
