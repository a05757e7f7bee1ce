use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::{Participant, ParticipantId, Role};

/// Characters allowed in a match code. `O` and `0` are left out so codes
/// can be read aloud without confusion.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNPQRSTUVWXYZ123456789";

/// Length of a match code.
pub const CODE_LEN: usize = 4;

/// Lifecycle phase of a match. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Waiting,
    Playing,
    Finished,
}

impl MatchPhase {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: MatchPhase) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Playing)
                | (Self::Waiting, Self::Finished)
                | (Self::Playing, Self::Finished)
        )
    }
}

/// Public view of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
    pub score: u32,
}

impl From<&Participant> for ParticipantSnapshot {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id.clone(),
            display_name: p.display_name.clone(),
            role: p.role,
            score: p.score,
        }
    }
}

/// Sanitized view of a match: gameplay fields only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub code: String,
    pub phase: MatchPhase,
    pub current_round: u32,
    pub max_rounds: u32,
    pub host_id: ParticipantId,
    pub is_public: bool,
    pub participants: Vec<ParticipantSnapshot>,
}

/// A participant's running score, keyed by identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub participant_id: ParticipantId,
    pub score: u32,
}

/// Final standing line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub display_name: String,
    pub score: u32,
}

/// Outcome of a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Participant(String),
    Tie,
}

/// Pick the winner: strictly higher score wins, equal scores tie.
pub fn decide_winner(participants: &[Participant]) -> Winner {
    match participants {
        [a, b] if a.score > b.score => Winner::Participant(a.display_name.clone()),
        [a, b] if b.score > a.score => Winner::Participant(b.display_name.clone()),
        _ => Winner::Tie,
    }
}

/// Standings sorted by descending score. Ties keep join order.
pub fn standings(participants: &[Participant]) -> Vec<Standing> {
    let mut rows: Vec<Standing> = participants
        .iter()
        .map(|p| Standing {
            display_name: p.display_name.clone(),
            score: p.score,
        })
        .collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score));
    rows
}

/// Generate a random match code. Uniqueness is the caller's concern.
pub fn generate_match_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check that a string has the shape of a match code.
pub fn is_valid_match_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
