use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved identity of the automated opponent.
pub const BOT_IDENTITY: &str = "BOT";

/// Display name used for the automated opponent.
pub const BOT_DISPLAY_NAME: &str = "Bot Rival";

/// Display name used when a participant supplies none.
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Maximum display name length in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Opaque participant identity, unique per connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn bot() -> Self {
        Self(BOT_IDENTITY.to_string())
    }

    pub fn is_bot(&self) -> bool {
        self.0 == BOT_IDENTITY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role held for one half-round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Shooter,
    Goalkeeper,
}

impl Role {
    pub fn swapped(self) -> Self {
        match self {
            Self::Shooter => Self::Goalkeeper,
            Self::Goalkeeper => Self::Shooter,
        }
    }
}

/// A participant inside a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
    pub current_choice: Option<u8>,
    pub score: u32,
}

impl Participant {
    pub fn new(id: ParticipantId, display_name: &str, role: Role) -> Self {
        Self {
            id,
            display_name: sanitize_display_name(display_name),
            role,
            current_choice: None,
            score: 0,
        }
    }

    pub fn bot(role: Role) -> Self {
        Self {
            id: ParticipantId::bot(),
            display_name: BOT_DISPLAY_NAME.to_string(),
            role,
            current_choice: None,
            score: 0,
        }
    }

    pub fn is_bot(&self) -> bool {
        self.id.is_bot()
    }

    pub fn has_chosen(&self) -> bool {
        self.current_choice.is_some()
    }
}

/// Trim, drop control characters, cap the length, and fall back to
/// [`DEFAULT_DISPLAY_NAME`] when nothing is left.
pub fn sanitize_display_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DISPLAY_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_end();
    if cleaned.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_gets_default() {
        assert_eq!(sanitize_display_name(""), DEFAULT_DISPLAY_NAME);
        assert_eq!(sanitize_display_name("   "), DEFAULT_DISPLAY_NAME);
        assert_eq!(sanitize_display_name("\n\t"), DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn name_is_trimmed_and_capped() {
        assert_eq!(sanitize_display_name("  Alice "), "Alice");
        let long = "x".repeat(100);
        assert_eq!(sanitize_display_name(&long).chars().count(), MAX_DISPLAY_NAME_LEN);
    }

    #[test]
    fn control_chars_are_stripped() {
        assert_eq!(sanitize_display_name("Bo\u{7}b"), "Bob");
    }

    #[test]
    fn role_swap_round_trips() {
        assert_eq!(Role::Shooter.swapped(), Role::Goalkeeper);
        assert_eq!(Role::Shooter.swapped().swapped(), Role::Shooter);
    }

    #[test]
    fn bot_identity_is_reserved() {
        let bot = Participant::bot(Role::Goalkeeper);
        assert!(bot.is_bot());
        assert_eq!(bot.display_name, BOT_DISPLAY_NAME);
        assert!(!ParticipantId::new("c0ffee").is_bot());
    }
}
