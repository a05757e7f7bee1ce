pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod health;
pub mod match_entity;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use scheduler::TokioScheduler;
use state::AppState;

/// Build the Axum router and application state from a config.
/// Must be called from within a tokio runtime.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
    let state = AppState::new(config, scheduler);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Background task that drops matches which have been Finished for longer
/// than the configured retention.
pub fn spawn_finished_sweeper(state: AppState) {
    let interval = Duration::from_secs(state.config.matches.sweep_interval_secs.max(1));
    let retention = Duration::from_secs(state.config.matches.finished_retention_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = state.registry.sweep_finished(retention);
            if removed > 0 {
                tracing::info!(removed, remaining = state.registry.len(), "Swept finished matches");
            }
        }
    });
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, PoisonError};

    use shootout_core::net::messages::{
        MatchEndedMsg, MatchStartedMsg, RoundResultMsg, ServerMessage,
    };
    use shootout_core::player::ParticipantId;
    use shootout_core::room::MatchSnapshot;

    use crate::session::EventSink;

    /// Sink that records everything the engine and registry emit.
    #[derive(Default)]
    pub struct RecordingSink {
        sent: Mutex<Vec<(ParticipantId, ServerMessage)>>,
        broadcasts: Mutex<Vec<ServerMessage>>,
    }

    impl EventSink for RecordingSink {
        fn send_to(&self, participant: &ParticipantId, msg: &ServerMessage) {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((participant.clone(), msg.clone()));
        }

        fn broadcast(&self, msg: &ServerMessage) {
            self.broadcasts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(msg.clone());
        }
    }

    impl RecordingSink {
        /// Messages sent directly to `id`, oldest first.
        pub fn for_participant(&self, id: &str) -> Vec<ServerMessage> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(to, _)| to.as_str() == id)
                .map(|(_, msg)| msg.clone())
                .collect()
        }

        pub fn round_results(&self, id: &str) -> Vec<RoundResultMsg> {
            self.for_participant(id)
                .into_iter()
                .filter_map(|m| match m {
                    ServerMessage::RoundResult(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        pub fn last_round_result(&self, id: &str) -> Option<RoundResultMsg> {
            self.round_results(id).pop()
        }

        pub fn count_round_started(&self, id: &str) -> usize {
            self.for_participant(id)
                .iter()
                .filter(|m| matches!(m, ServerMessage::RoundStarted(_)))
                .count()
        }

        pub fn match_started(&self, id: &str) -> Option<MatchStartedMsg> {
            self.for_participant(id).into_iter().find_map(|m| match m {
                ServerMessage::MatchStarted(s) => Some(s),
                _ => None,
            })
        }

        pub fn match_ended(&self, id: &str) -> Option<MatchEndedMsg> {
            self.for_participant(id).into_iter().find_map(|m| match m {
                ServerMessage::MatchEnded(e) => Some(e),
                _ => None,
            })
        }

        pub fn created_code(&self, id: &str) -> Option<String> {
            self.for_participant(id).into_iter().find_map(|m| match m {
                ServerMessage::MatchCreated(c) => Some(c.code),
                _ => None,
            })
        }

        pub fn broadcast_count(&self) -> usize {
            self.broadcasts.lock().unwrap().len()
        }

        /// Matches in the most recent lobby broadcast.
        pub fn last_broadcast_list(&self) -> Option<Vec<MatchSnapshot>> {
            self.broadcasts
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find_map(|m| match m {
                    ServerMessage::PublicMatchList(list) => Some(list.matches.clone()),
                    _ => None,
                })
        }
    }
}
