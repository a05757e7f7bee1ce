use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use tokio::sync::mpsc;

use shootout_core::net::messages::ServerMessage;
use shootout_core::net::protocol::encode_server_message;
use shootout_core::player::ParticipantId;

/// Per-connection sender for outbound WebSocket binary messages.
/// Bounded so a slow client cannot exhaust memory; full channels drop.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// Where the engine delivers events. The engine never knows about sockets.
pub trait EventSink: Send + Sync {
    /// Deliver to one participant. Unknown identities (and the automated
    /// opponent) are silently skipped.
    fn send_to(&self, participant: &ParticipantId, msg: &ServerMessage);

    /// Deliver to every connected participant.
    fn broadcast(&self, msg: &ServerMessage);
}

/// Maps transport identities to their outbound channels.
#[derive(Default)]
pub struct Sessions {
    connections: RwLock<HashMap<ParticipantId, PlayerSender>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ParticipantId, sender: PlayerSender) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
    }

    pub fn unregister(&self, id: &ParticipantId) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn is_connected(&self, id: &ParticipantId) -> bool {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn encode(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(msg_type = ?msg.message_type(), error = %e, "Failed to encode");
            None
        },
    }
}

impl EventSink for Sessions {
    fn send_to(&self, participant: &ParticipantId, msg: &ServerMessage) {
        if participant.is_bot() {
            return;
        }
        let Some(sender) = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(participant)
            .cloned()
        else {
            tracing::debug!(%participant, "No connection for participant, dropping event");
            return;
        };
        let Some(data) = encode(msg) else {
            return;
        };
        if let Err(e) = sender.try_send(data) {
            tracing::debug!(%participant, error = %e, "Skipping send to slow client");
        }
    }

    fn broadcast(&self, msg: &ServerMessage) {
        let Some(data) = encode(msg) else {
            return;
        };
        let connections = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (id, sender) in connections.iter() {
            if let Err(e) = sender.try_send(data.clone()) {
                tracing::debug!(participant = %id, error = %e, "Skipping broadcast to slow client");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shootout_core::net::messages::{OpponentLeftMsg, PublicMatchListMsg};
    use shootout_core::net::protocol::decode_server_message;

    fn make_sender() -> (PlayerSender, mpsc::Receiver<Bytes>) {
        mpsc::channel(4)
    }

    #[test]
    fn send_to_reaches_only_target() {
        let sessions = Sessions::new();
        let (tx_a, mut rx_a) = make_sender();
        let (tx_b, mut rx_b) = make_sender();
        sessions.register(ParticipantId::new("a"), tx_a);
        sessions.register(ParticipantId::new("b"), tx_b);

        sessions.send_to(
            &ParticipantId::new("a"),
            &ServerMessage::OpponentLeft(OpponentLeftMsg {}),
        );

        let data = rx_a.try_recv().unwrap();
        assert!(matches!(
            decode_server_message(&data).unwrap(),
            ServerMessage::OpponentLeft(_)
        ));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let sessions = Sessions::new();
        let (tx_a, mut rx_a) = make_sender();
        let (tx_b, mut rx_b) = make_sender();
        sessions.register(ParticipantId::new("a"), tx_a);
        sessions.register(ParticipantId::new("b"), tx_b);

        sessions.broadcast(&ServerMessage::PublicMatchList(PublicMatchListMsg {
            matches: vec![],
        }));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn unregister_stops_delivery() {
        let sessions = Sessions::new();
        let (tx, mut rx) = make_sender();
        let id = ParticipantId::new("a");
        sessions.register(id.clone(), tx);
        assert!(sessions.is_connected(&id));
        sessions.unregister(&id);
        assert!(sessions.is_empty());

        sessions.send_to(&id, &ServerMessage::OpponentLeft(OpponentLeftMsg {}));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let sessions = Sessions::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = ParticipantId::new("slow");
        sessions.register(id.clone(), tx);
        for _ in 0..5 {
            sessions.send_to(&id, &ServerMessage::OpponentLeft(OpponentLeftMsg {}));
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
