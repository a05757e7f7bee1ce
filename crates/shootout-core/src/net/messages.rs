use serde::{Deserialize, Serialize};

use crate::player::{ParticipantId, Role};
use crate::room::{MatchSnapshot, ScoreEntry, Standing, Winner};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateMatch = 0x01,
    JoinMatch = 0x02,
    RequestBotOpponent = 0x03,
    SubmitChoice = 0x04,
    ListPublicMatches = 0x05,

    // Server -> Client
    Welcome = 0x10,
    MatchCreated = 0x11,
    Error = 0x12,
    BotJoined = 0x13,
    MatchStarted = 0x14,
    RoundStarted = 0x15,
    RoundResult = 0x16,
    MatchEnded = 0x17,
    OpponentLeft = 0x18,
    PublicMatchList = 0x19,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::CreateMatch),
            0x02 => Some(Self::JoinMatch),
            0x03 => Some(Self::RequestBotOpponent),
            0x04 => Some(Self::SubmitChoice),
            0x05 => Some(Self::ListPublicMatches),
            0x10 => Some(Self::Welcome),
            0x11 => Some(Self::MatchCreated),
            0x12 => Some(Self::Error),
            0x13 => Some(Self::BotJoined),
            0x14 => Some(Self::MatchStarted),
            0x15 => Some(Self::RoundStarted),
            0x16 => Some(Self::RoundResult),
            0x17 => Some(Self::MatchEnded),
            0x18 => Some(Self::OpponentLeft),
            0x19 => Some(Self::PublicMatchList),
            _ => None,
        }
    }

    /// Whether only the server may send this message type.
    pub fn is_server_only(self) -> bool {
        (self as u8) >= 0x10
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMatchMsg {
    pub display_name: String,
    pub is_public: bool,
    /// Rounds each participant shoots. Zero means "server default"; values
    /// above the server's `max_rounds_per_player` are capped. The effective
    /// total comes back in `MatchCreated.game.max_rounds`.
    pub rounds_per_player: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMatchMsg {
    pub code: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBotOpponentMsg {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitChoiceMsg {
    pub code: String,
    /// Raw zone index; clamped into `0..=8` by the server.
    pub zone: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPublicMatchesMsg {}

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    CreateMatch(CreateMatchMsg),
    JoinMatch(JoinMatchMsg),
    RequestBotOpponent(RequestBotOpponentMsg),
    SubmitChoice(SubmitChoiceMsg),
    ListPublicMatches(ListPublicMatchesMsg),
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeMsg {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCreatedMsg {
    pub code: String,
    pub game: MatchSnapshot,
}

/// Error categories reported back to the originating connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    Full,
    AlreadyStarted,
    BotRequestDenied,
    AlreadyInMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotJoinedMsg {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStartedMsg {
    pub game: MatchSnapshot,
    /// The recipient's own role for round 1.
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStartedMsg {
    pub round: u32,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResultMsg {
    pub shooter_zone: u8,
    pub keeper_zone: u8,
    pub is_goal: bool,
    pub keeper_points: u8,
    pub scores: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEndedMsg {
    pub winner: Winner,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentLeftMsg {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicMatchListMsg {
    pub matches: Vec<MatchSnapshot>,
}

/// Messages the server may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Welcome(WelcomeMsg),
    MatchCreated(MatchCreatedMsg),
    Error(ErrorMsg),
    BotJoined(BotJoinedMsg),
    MatchStarted(MatchStartedMsg),
    RoundStarted(RoundStartedMsg),
    RoundResult(RoundResultMsg),
    MatchEnded(MatchEndedMsg),
    OpponentLeft(OpponentLeftMsg),
    PublicMatchList(PublicMatchListMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Welcome(_) => MessageType::Welcome,
            Self::MatchCreated(_) => MessageType::MatchCreated,
            Self::Error(_) => MessageType::Error,
            Self::BotJoined(_) => MessageType::BotJoined,
            Self::MatchStarted(_) => MessageType::MatchStarted,
            Self::RoundStarted(_) => MessageType::RoundStarted,
            Self::RoundResult(_) => MessageType::RoundResult,
            Self::MatchEnded(_) => MessageType::MatchEnded,
            Self::OpponentLeft(_) => MessageType::OpponentLeft,
            Self::PublicMatchList(_) => MessageType::PublicMatchList,
        }
    }
}
