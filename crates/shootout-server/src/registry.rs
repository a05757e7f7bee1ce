use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use shootout_core::net::messages::{
    BotJoinedMsg, MatchCreatedMsg, MatchStartedMsg, OpponentLeftMsg, PublicMatchListMsg,
    ServerMessage,
};
use shootout_core::player::{Participant, ParticipantId, Role};
use shootout_core::room::{MatchPhase, MatchSnapshot, generate_match_code};

use crate::config::MatchesConfig;
use crate::engine::{ChoiceOutcome, Engine};
use crate::error::MatchError;
use crate::match_entity::{Match, SharedMatch, lock_match};
use crate::session::EventSink;

/// Owns every live match, keyed by code.
///
/// The map lock is only held for lookups, inserts and removals. Per-match work
/// happens under that match's own lock, taken after the map lock is released
/// (or, for inserts and removals, while it is still held).
pub struct MatchRegistry {
    matches: RwLock<HashMap<String, SharedMatch>>,
    engine: Arc<Engine>,
    sink: Arc<dyn EventSink>,
    config: MatchesConfig,
    rng: Mutex<StdRng>,
}

impl MatchRegistry {
    pub fn new(
        engine: Arc<Engine>,
        sink: Arc<dyn EventSink>,
        config: MatchesConfig,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            matches: RwLock::new(HashMap::new()),
            engine,
            sink,
            config,
            rng: Mutex::new(rng),
        }
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SharedMatch>> {
        self.matches.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SharedMatch>> {
        self.matches.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, code: &str) -> Option<SharedMatch> {
        self.read_map().get(code).cloned()
    }

    pub fn snapshot(&self, code: &str) -> Option<MatchSnapshot> {
        self.get(code).map(|m| lock_match(&m).snapshot())
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (live matches, open public matches).
    pub fn stats(&self) -> (usize, usize) {
        let all: Vec<SharedMatch> = self.read_map().values().cloned().collect();
        let open = all.iter().filter(|m| lock_match(m).is_open()).count();
        (all.len(), open)
    }

    /// Create a Waiting match with `host` as Shooter.
    pub fn create(
        &self,
        host: ParticipantId,
        display_name: &str,
        is_public: bool,
        rounds_per_player: u32,
    ) -> MatchSnapshot {
        let max_rounds = self.config.max_rounds_for(rounds_per_player);
        let participant = Participant::new(host.clone(), display_name, Role::Shooter);

        let snapshot = {
            let mut map = self.write_map();
            let (code, match_rng) = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                let code = generate_unique_match_code(&map, &mut *rng);
                (code, StdRng::from_rng(&mut *rng))
            };
            let m = Match::new(code.clone(), participant, is_public, max_rounds, match_rng);
            let snapshot = m.snapshot();
            map.insert(code, Arc::new(Mutex::new(m)));
            snapshot
        };

        tracing::info!(
            code = %snapshot.code,
            host = %host,
            is_public,
            max_rounds,
            "Match created"
        );
        self.sink.send_to(
            &host,
            &ServerMessage::MatchCreated(MatchCreatedMsg {
                code: snapshot.code.clone(),
                game: snapshot.clone(),
            }),
        );
        if is_public {
            self.broadcast_public_matches();
        }
        snapshot
    }

    /// Seat `identity` as Goalkeeper and start round 1.
    pub fn join(
        &self,
        code: &str,
        identity: ParticipantId,
        display_name: &str,
    ) -> Result<MatchSnapshot, MatchError> {
        let shared = self
            .get(code)
            .ok_or_else(|| MatchError::NotFound(code.to_string()))?;

        let (snapshot, is_public) = {
            let mut m = lock_match(&shared);
            if m.contains(&identity) {
                return Err(MatchError::AlreadyInMatch(code.to_string()));
            }
            if m.participants.len() >= 2 {
                return Err(MatchError::Full(code.to_string()));
            }
            if m.phase != MatchPhase::Waiting {
                return Err(MatchError::AlreadyStarted(code.to_string()));
            }

            m.participants
                .push(Participant::new(identity.clone(), display_name, Role::Goalkeeper));
            m.set_phase(MatchPhase::Playing);
            let snapshot = m.snapshot();
            tracing::info!(code, participant = %identity, "Participant joined, match starting");

            for p in m.participants.iter().filter(|p| !p.is_bot()) {
                self.sink.send_to(
                    &p.id,
                    &ServerMessage::MatchStarted(MatchStartedMsg {
                        game: snapshot.clone(),
                        role: p.role,
                    }),
                );
            }
            self.engine.start_round(&Arc::downgrade(&shared), &mut m);
            (snapshot, m.is_public)
        };

        if is_public {
            self.broadcast_public_matches();
        }
        Ok(snapshot)
    }

    /// Seat the automated opponent as Goalkeeper. Only the host of a public
    /// match still waiting alone may ask.
    pub fn request_automated_opponent(
        &self,
        code: &str,
        requester: &ParticipantId,
    ) -> Result<MatchSnapshot, MatchError> {
        let denied = || MatchError::BotRequestDenied(code.to_string());
        let shared = self.get(code).ok_or_else(denied)?;

        let snapshot = {
            let mut m = lock_match(&shared);
            if !m.is_open() || &m.host_id != requester {
                tracing::debug!(code, requester = %requester, "Bot request denied");
                return Err(denied());
            }

            m.participants.push(Participant::bot(Role::Goalkeeper));
            m.set_phase(MatchPhase::Playing);
            let snapshot = m.snapshot();
            tracing::info!(code, host = %requester, "Bot joined, match starting");

            self.sink
                .send_to(requester, &ServerMessage::BotJoined(BotJoinedMsg {}));
            let role = m.participant(requester).map_or(Role::Shooter, |p| p.role);
            self.sink.send_to(
                requester,
                &ServerMessage::MatchStarted(MatchStartedMsg {
                    game: snapshot.clone(),
                    role,
                }),
            );
            self.engine.start_round(&Arc::downgrade(&shared), &mut m);
            snapshot
        };

        self.broadcast_public_matches();
        Ok(snapshot)
    }

    /// Route a pick to the engine. Unknown codes are NotFound; picks for
    /// matches that are not running are ignored.
    pub fn submit_choice(
        &self,
        code: &str,
        from: &ParticipantId,
        zone: i64,
    ) -> Result<ChoiceOutcome, MatchError> {
        let shared = self
            .get(code)
            .ok_or_else(|| MatchError::NotFound(code.to_string()))?;
        let mut m = lock_match(&shared);
        Ok(self
            .engine
            .submit_choice(&Arc::downgrade(&shared), &mut m, from, zone))
    }

    /// Public matches waiting for an opponent, ordered by code.
    pub fn list_open_public_matches(&self) -> Vec<MatchSnapshot> {
        let all: Vec<SharedMatch> = self.read_map().values().cloned().collect();
        let mut open: Vec<MatchSnapshot> = all
            .iter()
            .filter_map(|m| {
                let m = lock_match(m);
                m.is_open().then(|| m.snapshot())
            })
            .collect();
        open.sort_by(|a, b| a.code.cmp(&b.code));
        open
    }

    /// Send the current lobby to every connection. Must not be called with a
    /// match lock held.
    pub fn broadcast_public_matches(&self) {
        let matches = self.list_open_public_matches();
        tracing::debug!(open = matches.len(), "Broadcasting public match list");
        self.sink
            .broadcast(&ServerMessage::PublicMatchList(PublicMatchListMsg { matches }));
    }

    /// Drop `identity` from every match it belongs to. Interrupted matches end
    /// without a result; matches left without a human are deleted.
    pub fn remove_participant(&self, identity: &ParticipantId) {
        let all: Vec<SharedMatch> = self.read_map().values().cloned().collect();
        let mut lobby_changed = false;

        for shared in all {
            let (code, was_public, now_empty) = {
                let mut m = lock_match(&shared);
                if !m.contains(identity) {
                    continue;
                }
                self.engine.abort_match(&mut m);
                m.participants.retain(|p| &p.id != identity);
                tracing::info!(code = %m.code, participant = %identity, "Participant left match");

                let now_empty = !m.has_human();
                if !now_empty {
                    for p in m.participants.iter().filter(|p| !p.is_bot()) {
                        self.sink
                            .send_to(&p.id, &ServerMessage::OpponentLeft(OpponentLeftMsg {}));
                    }
                }
                (m.code.clone(), m.is_public, now_empty)
            };

            if now_empty {
                let mut map = self.write_map();
                if map.get(&code).is_some_and(|m| Arc::ptr_eq(m, &shared)) {
                    map.remove(&code);
                    tracing::info!(code = %code, "Match removed");
                }
            }
            lobby_changed |= was_public;
        }

        if lobby_changed {
            self.broadcast_public_matches();
        }
    }

    /// Remove matches that have been Finished for at least `retention`.
    /// Returns how many were removed.
    pub fn sweep_finished(&self, retention: Duration) -> usize {
        let mut map = self.write_map();
        let before = map.len();
        map.retain(|code, shared| {
            let m = lock_match(shared);
            let expired = m.phase == MatchPhase::Finished
                && m.finished_at.is_some_and(|at| at.elapsed() >= retention);
            if expired {
                tracing::debug!(code = %code, "Sweeping finished match");
            }
            !expired
        });
        before - map.len()
    }
}

/// Generate a match code, retrying on collision with live matches.
fn generate_unique_match_code<R: Rng + ?Sized>(
    existing: &HashMap<String, SharedMatch>,
    rng: &mut R,
) -> String {
    loop {
        let code = generate_match_code(rng);
        if !existing.contains_key(&code) {
            return code;
        }
    }
}
