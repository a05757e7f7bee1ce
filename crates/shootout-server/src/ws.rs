use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use shootout_core::net::messages::{ServerMessage, WelcomeMsg};
use shootout_core::net::protocol::{MAX_MESSAGE_SIZE, decode_client_message, decode_message_type};
use shootout_core::player::ParticipantId;

use crate::dispatch::{disconnect, dispatch};
use crate::session::EventSink;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();

    // The transport assigns identities; clients never choose their own.
    let participant = ParticipantId::new(Uuid::new_v4().to_string());
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    state.sessions.register(participant.clone(), tx);
    spawn_writer(ws_sender, rx);

    state.sessions.send_to(
        &participant,
        &ServerMessage::Welcome(WelcomeMsg {
            participant_id: participant.clone(),
        }),
    );
    tracing::info!(participant = %participant, "Participant connected");

    read_loop(&mut ws_receiver, &state, &participant).await;

    disconnect(&state.registry, &participant);
    state.sessions.unregister(&participant);
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });
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

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    participant: &ParticipantId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(participant = %participant, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(participant = %participant, error = %e, "Undecodable message type");
                continue;
            },
        };

        if msg_type.is_server_only() {
            tracing::warn!(
                participant = %participant,
                ?msg_type,
                "Rejected server-only message from client"
            );
            continue;
        }

        match decode_client_message(&data) {
            Ok(msg) => dispatch(&state.registry, &*state.sessions, participant, msg),
            Err(e) => {
                tracing::debug!(participant = %participant, ?msg_type, error = %e, "Malformed command");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_drains_and_refills() {
        let mut limiter = RateLimiter::new(3.0, 3.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(std::time::Duration::from_millis(400)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limiter_caps_at_burst() {
        let mut limiter = RateLimiter::new(2.0, 100.0);
        tokio::time::advance(std::time::Duration::from_secs(10)).await;
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }
}
