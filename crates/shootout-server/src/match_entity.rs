use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use rand::rngs::StdRng;

use shootout_core::player::{Participant, ParticipantId, Role};
use shootout_core::room::{MatchPhase, MatchSnapshot, ParticipantSnapshot, ScoreEntry};

use crate::scheduler::TimerHandle;

/// One match behind its own lock. Unrelated matches never share a lock.
pub type SharedMatch = Arc<Mutex<Match>>;

/// Lock a match, recovering the guard if a previous holder panicked.
pub fn lock_match(m: &Mutex<Match>) -> MutexGuard<'_, Match> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Named timer slots owned by a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSlot {
    /// Fills in random zones when a round stalls.
    Fallback,
    /// Automated opponent's delayed pick.
    Bot,
    /// Resolve delay after both picks, then the inter-round pause.
    Transition,
}

#[derive(Debug)]
struct ArmedTimer {
    token: u64,
    handle: TimerHandle,
}

#[derive(Debug, Default)]
struct TimerSlots {
    fallback: Option<ArmedTimer>,
    bot: Option<ArmedTimer>,
    transition: Option<ArmedTimer>,
}

impl TimerSlots {
    fn slot_mut(&mut self, slot: TimerSlot) -> &mut Option<ArmedTimer> {
        match slot {
            TimerSlot::Fallback => &mut self.fallback,
            TimerSlot::Bot => &mut self.bot,
            TimerSlot::Transition => &mut self.transition,
        }
    }

    fn slot(&self, slot: TimerSlot) -> &Option<ArmedTimer> {
        match slot {
            TimerSlot::Fallback => &self.fallback,
            TimerSlot::Bot => &self.bot,
            TimerSlot::Transition => &self.transition,
        }
    }
}

/// State container for one duel.
#[derive(Debug)]
pub struct Match {
    pub code: String,
    /// Join order is fixed: index 0 is the creator.
    pub participants: Vec<Participant>,
    pub phase: MatchPhase,
    pub current_round: u32,
    pub max_rounds: u32,
    pub is_public: bool,
    pub host_id: ParticipantId,
    /// Set once a resolution is scheduled for the current round.
    pub(crate) resolving: bool,
    pub(crate) rng: StdRng,
    pub(crate) finished_at: Option<Instant>,
    timers: TimerSlots,
    next_token: u64,
}

impl Match {
    pub fn new(code: String, host: Participant, is_public: bool, max_rounds: u32, rng: StdRng) -> Self {
        Self {
            code,
            host_id: host.id.clone(),
            participants: vec![host],
            phase: MatchPhase::Waiting,
            current_round: 1,
            max_rounds,
            is_public,
            resolving: false,
            rng,
            finished_at: None,
            timers: TimerSlots::default(),
            next_token: 0,
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            code: self.code.clone(),
            phase: self.phase,
            current_round: self.current_round,
            max_rounds: self.max_rounds,
            host_id: self.host_id.clone(),
            is_public: self.is_public,
            participants: self.participants.iter().map(ParticipantSnapshot::from).collect(),
        }
    }

    /// Listed in the lobby: public, waiting, and exactly one participant.
    pub fn is_open(&self) -> bool {
        self.is_public && self.phase == MatchPhase::Waiting && self.participants.len() == 1
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.iter().any(|p| &p.id == id)
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn participant_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.id == id)
    }

    pub fn opponent_of(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id != id)
    }

    pub fn bot(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_bot())
    }

    pub fn has_human(&self) -> bool {
        self.participants.iter().any(|p| !p.is_bot())
    }

    /// Both seats filled and both picks in.
    pub fn both_chosen(&self) -> bool {
        self.participants.len() == 2 && self.participants.iter().all(Participant::has_chosen)
    }

    /// Indices of (shooter, goalkeeper) for the current round.
    pub fn shooter_keeper(&self) -> Option<(usize, usize)> {
        let shooter = self.participants.iter().position(|p| p.role == Role::Shooter)?;
        let keeper = self
            .participants
            .iter()
            .position(|p| p.role == Role::Goalkeeper)?;
        Some((shooter, keeper))
    }

    pub fn swap_roles(&mut self) {
        for p in &mut self.participants {
            p.role = p.role.swapped();
        }
    }

    pub fn clear_choices(&mut self) {
        for p in &mut self.participants {
            p.current_choice = None;
        }
    }

    pub fn scores(&self) -> Vec<ScoreEntry> {
        self.participants
            .iter()
            .map(|p| ScoreEntry {
                participant_id: p.id.clone(),
                score: p.score,
            })
            .collect()
    }

    /// Move to `next` if the transition is allowed. Invalid transitions are
    /// logged and rejected.
    pub fn set_phase(&mut self, next: MatchPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(
                code = %self.code,
                from = ?self.phase,
                to = ?next,
                "Invalid match phase transition"
            );
            return false;
        }
        self.phase = next;
        if next == MatchPhase::Finished {
            self.finished_at = Some(Instant::now());
        }
        true
    }

    /// Reserve a token for a timer about to be armed.
    pub(crate) fn next_timer_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Put a timer in `slot`, cancelling whatever was there.
    pub(crate) fn arm(&mut self, slot: TimerSlot, token: u64, handle: TimerHandle) {
        if let Some(old) = self.timers.slot_mut(slot).replace(ArmedTimer { token, handle }) {
            old.handle.cancel();
        }
    }

    pub(crate) fn cancel(&mut self, slot: TimerSlot) {
        if let Some(old) = self.timers.slot_mut(slot).take() {
            old.handle.cancel();
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        self.cancel(TimerSlot::Fallback);
        self.cancel(TimerSlot::Bot);
        self.cancel(TimerSlot::Transition);
    }

    /// Called by a firing timer with the match locked. Returns true and
    /// vacates the slot only if the slot still holds this timer.
    pub(crate) fn claim_fired(&mut self, slot: TimerSlot, token: u64) -> bool {
        let current = self.timers.slot_mut(slot);
        if current.as_ref().is_some_and(|t| t.token == token) {
            *current = None;
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self, slot: TimerSlot) -> bool {
        self.timers.slot(slot).is_some()
    }
}
