use shootout_core::net::messages::{ClientMessage, PublicMatchListMsg, ServerMessage};
use shootout_core::player::ParticipantId;
use shootout_core::room::is_valid_match_code;

use crate::error::MatchError;
use crate::registry::MatchRegistry;
use crate::session::EventSink;

/// Uppercase and trim a client-supplied code. Returns `None` if it cannot be
/// a match code.
fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    is_valid_match_code(&code).then_some(code)
}

fn require_code(raw: &str) -> Result<String, MatchError> {
    normalize_code(raw).ok_or_else(|| MatchError::NotFound(raw.trim().to_string()))
}

/// Apply one client command on behalf of `from`. Failures are reported to
/// `from` only.
pub fn dispatch(
    registry: &MatchRegistry,
    sink: &dyn EventSink,
    from: &ParticipantId,
    msg: ClientMessage,
) {
    let result = match msg {
        ClientMessage::CreateMatch(create) => {
            registry.create(
                from.clone(),
                &create.display_name,
                create.is_public,
                create.rounds_per_player,
            );
            Ok(())
        },
        ClientMessage::JoinMatch(join) => require_code(&join.code)
            .and_then(|code| registry.join(&code, from.clone(), &join.display_name))
            .map(drop),
        ClientMessage::RequestBotOpponent(req) => normalize_code(&req.code)
            .ok_or_else(|| MatchError::BotRequestDenied(req.code.trim().to_string()))
            .and_then(|code| registry.request_automated_opponent(&code, from))
            .map(drop),
        ClientMessage::SubmitChoice(choice) => require_code(&choice.code)
            .and_then(|code| registry.submit_choice(&code, from, choice.zone))
            .map(drop),
        ClientMessage::ListPublicMatches(_) => {
            let matches = registry.list_open_public_matches();
            sink.send_to(
                from,
                &ServerMessage::PublicMatchList(PublicMatchListMsg { matches }),
            );
            Ok(())
        },
    };

    if let Err(e) = result {
        tracing::debug!(participant = %from, error = %e, "Command rejected");
        sink.send_to(from, &e.to_message());
    }
}

/// Transport-level disconnect for `from`.
pub fn disconnect(registry: &MatchRegistry, from: &ParticipantId) {
    tracing::info!(participant = %from, "Participant disconnected");
    registry.remove_participant(from);
}
