use serde::{Deserialize, Serialize};

use super::messages::{
    BotJoinedMsg, ClientMessage, CreateMatchMsg, ErrorMsg, JoinMatchMsg, ListPublicMatchesMsg,
    MatchCreatedMsg, MatchEndedMsg, MatchStartedMsg, MessageType, OpponentLeftMsg,
    PublicMatchListMsg, RequestBotOpponentMsg, RoundResultMsg, RoundStartedMsg, ServerMessage,
    SubmitChoiceMsg, WelcomeMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::CreateMatch(m) => encode_message(MessageType::CreateMatch, m),
        ClientMessage::JoinMatch(m) => encode_message(MessageType::JoinMatch, m),
        ClientMessage::RequestBotOpponent(m) => {
            encode_message(MessageType::RequestBotOpponent, m)
        },
        ClientMessage::SubmitChoice(m) => encode_message(MessageType::SubmitChoice, m),
        ClientMessage::ListPublicMatches(m) => encode_message(MessageType::ListPublicMatches, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ServerMessage::Welcome(m) => encode_message(msg_type, m),
        ServerMessage::MatchCreated(m) => encode_message(msg_type, m),
        ServerMessage::Error(m) => encode_message(msg_type, m),
        ServerMessage::BotJoined(m) => encode_message(msg_type, m),
        ServerMessage::MatchStarted(m) => encode_message(msg_type, m),
        ServerMessage::RoundStarted(m) => encode_message(msg_type, m),
        ServerMessage::RoundResult(m) => encode_message(msg_type, m),
        ServerMessage::MatchEnded(m) => encode_message(msg_type, m),
        ServerMessage::OpponentLeft(m) => encode_message(msg_type, m),
        ServerMessage::PublicMatchList(m) => encode_message(msg_type, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::CreateMatch => Ok(ClientMessage::CreateMatch(decode_payload::<
            CreateMatchMsg,
        >(data)?)),
        MessageType::JoinMatch => Ok(ClientMessage::JoinMatch(decode_payload::<JoinMatchMsg>(
            data,
        )?)),
        MessageType::RequestBotOpponent => Ok(ClientMessage::RequestBotOpponent(
            decode_payload::<RequestBotOpponentMsg>(data)?,
        )),
        MessageType::SubmitChoice => Ok(ClientMessage::SubmitChoice(decode_payload::<
            SubmitChoiceMsg,
        >(data)?)),
        MessageType::ListPublicMatches => Ok(ClientMessage::ListPublicMatches(decode_payload::<
            ListPublicMatchesMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Welcome => Ok(ServerMessage::Welcome(decode_payload::<WelcomeMsg>(data)?)),
        MessageType::MatchCreated => Ok(ServerMessage::MatchCreated(decode_payload::<
            MatchCreatedMsg,
        >(data)?)),
        MessageType::Error => Ok(ServerMessage::Error(decode_payload::<ErrorMsg>(data)?)),
        MessageType::BotJoined => Ok(ServerMessage::BotJoined(decode_payload::<BotJoinedMsg>(
            data,
        )?)),
        MessageType::MatchStarted => Ok(ServerMessage::MatchStarted(decode_payload::<
            MatchStartedMsg,
        >(data)?)),
        MessageType::RoundStarted => Ok(ServerMessage::RoundStarted(decode_payload::<
            RoundStartedMsg,
        >(data)?)),
        MessageType::RoundResult => Ok(ServerMessage::RoundResult(decode_payload::<
            RoundResultMsg,
        >(data)?)),
        MessageType::MatchEnded => Ok(ServerMessage::MatchEnded(decode_payload::<
            MatchEndedMsg,
        >(data)?)),
        MessageType::OpponentLeft => Ok(ServerMessage::OpponentLeft(decode_payload::<
            OpponentLeftMsg,
        >(data)?)),
        MessageType::PublicMatchList => Ok(ServerMessage::PublicMatchList(decode_payload::<
            PublicMatchListMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
