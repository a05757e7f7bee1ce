use shootout_core::net::messages::{ErrorKind, ErrorMsg, ServerMessage};

/// Recoverable failures of match commands. Reported to the caller only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    NotFound(String),
    Full(String),
    AlreadyStarted(String),
    BotRequestDenied(String),
    AlreadyInMatch(String),
}

impl MatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Full(_) => ErrorKind::Full,
            Self::AlreadyStarted(_) => ErrorKind::AlreadyStarted,
            Self::BotRequestDenied(_) => ErrorKind::BotRequestDenied,
            Self::AlreadyInMatch(_) => ErrorKind::AlreadyInMatch,
        }
    }

    /// The wire event sent back to the originating connection.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Error(ErrorMsg {
            kind: self.kind(),
            message: self.to_string(),
        })
    }
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(code) => write!(f, "match {code} not found"),
            Self::Full(code) => write!(f, "match {code} is full"),
            Self::AlreadyStarted(code) => write!(f, "match {code} has already started"),
            Self::BotRequestDenied(code) => write!(f, "could not add a bot to match {code}"),
            Self::AlreadyInMatch(code) => write!(f, "already playing in match {code}"),
        }
    }
}

impl std::error::Error for MatchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mapping() {
        assert_eq!(MatchError::NotFound("X".into()).kind(), ErrorKind::NotFound);
        assert_eq!(MatchError::Full("X".into()).kind(), ErrorKind::Full);
        assert_eq!(
            MatchError::AlreadyStarted("X".into()).kind(),
            ErrorKind::AlreadyStarted
        );
        assert_eq!(
            MatchError::BotRequestDenied("X".into()).kind(),
            ErrorKind::BotRequestDenied
        );
    }

    #[test]
    fn error_message_carries_code() {
        let msg = MatchError::Full("AB12".into()).to_message();
        match msg {
            ServerMessage::Error(e) => {
                assert_eq!(e.kind, ErrorKind::Full);
                assert!(e.message.contains("AB12"));
            },
            other => panic!("Expected Error, got: {other:?}"),
        }
    }
}
