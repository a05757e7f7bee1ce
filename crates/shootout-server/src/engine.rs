//! Round scheduling and resolution.
//!
//! Every entry point takes the match already locked. Three triggers race to
//! resolve a round: a participant's pick, the fallback timer, and the bot
//! timer. They all go through [`Engine::check_round_completion`] or the
//! fallback path with the match lock held, and timers re-check their slot
//! token under that same lock before acting, so a cancelled timer can never
//! resolve a stale round.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use rand::Rng;

use shootout_core::net::messages::{
    MatchEndedMsg, RoundResultMsg, RoundStartedMsg, ServerMessage,
};
use shootout_core::player::{ParticipantId, Role};
use shootout_core::room::{MatchPhase, decide_winner, standings};
use shootout_core::zone::{clamp_zone, is_goal, keeper_points, random_zone};

use crate::config::TimingConfig;
use crate::match_entity::{Match, TimerSlot, lock_match};
use crate::scheduler::Scheduler;
use crate::session::EventSink;

/// Weak reference held by timers so a pending timer never keeps a removed
/// match alive.
pub type MatchRef = Weak<Mutex<Match>>;

type TimerCallback = fn(&Arc<Engine>, &MatchRef, &mut Match);

/// Outcome of a pick submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceOutcome {
    Accepted,
    /// Already picked this round, not a participant, or no round running.
    Ignored,
}

pub struct Engine {
    scheduler: Arc<dyn Scheduler>,
    sink: Arc<dyn EventSink>,
    timing: TimingConfig,
}

impl Engine {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        sink: Arc<dyn EventSink>,
        timing: TimingConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            sink,
            timing,
        })
    }

    /// Schedule `on_fire` in `slot`, replacing whatever the slot held.
    fn arm(
        self: &Arc<Self>,
        this: &MatchRef,
        m: &mut Match,
        slot: TimerSlot,
        delay: Duration,
        on_fire: TimerCallback,
    ) {
        let token = m.next_timer_token();
        let engine = Arc::clone(self);
        let weak = this.clone();
        let handle = self.scheduler.schedule(
            delay,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let mut m = lock_match(&shared);
                if !m.claim_fired(slot, token) {
                    tracing::debug!(code = %m.code, ?slot, "Superseded timer fired, ignoring");
                    return;
                }
                on_fire(&engine, &weak, &mut *m);
            }),
        );
        m.arm(slot, token, handle);
    }

    fn arm_bot(self: &Arc<Self>, this: &MatchRef, m: &mut Match) {
        let min = self.timing.bot_min_delay_ms;
        let max = self.timing.bot_max_delay_ms.max(min);
        let delay = Duration::from_millis(m.rng.random_range(min..=max));
        self.arm(this, m, TimerSlot::Bot, delay, |e, w, m| e.on_bot_timer(w, m));
    }

    /// Begin the current round: clear picks, tell each human their role, and
    /// arm the fallback (and bot) timers.
    pub fn start_round(self: &Arc<Self>, this: &MatchRef, m: &mut Match) {
        if m.phase != MatchPhase::Playing {
            tracing::debug!(code = %m.code, phase = ?m.phase, "Not starting round outside Playing");
            return;
        }

        m.cancel_all();
        m.resolving = false;
        m.clear_choices();

        for p in m.participants.iter().filter(|p| !p.is_bot()) {
            self.sink.send_to(
                &p.id,
                &ServerMessage::RoundStarted(RoundStartedMsg {
                    round: m.current_round,
                    role: p.role,
                }),
            );
        }
        tracing::info!(code = %m.code, round = m.current_round, max_rounds = m.max_rounds, "Round started");

        self.arm(this, m, TimerSlot::Fallback, self.timing.fallback(), |e, w, m| {
            e.on_fallback(w, m)
        });

        if m.bot().is_some_and(|b| b.role == Role::Shooter) {
            self.arm_bot(this, m);
        }
    }

    /// Record a participant's pick. Out-of-range zones are clamped.
    pub fn submit_choice(
        self: &Arc<Self>,
        this: &MatchRef,
        m: &mut Match,
        from: &ParticipantId,
        zone: i64,
    ) -> ChoiceOutcome {
        if m.phase != MatchPhase::Playing || m.resolving {
            tracing::debug!(code = %m.code, participant = %from, "Pick outside an open round, ignoring");
            return ChoiceOutcome::Ignored;
        }
        let zone = clamp_zone(zone);

        match m.participant(from) {
            None => {
                tracing::debug!(code = %m.code, participant = %from, "Pick from non-participant, ignoring");
                return ChoiceOutcome::Ignored;
            },
            Some(p) if p.is_bot() || p.has_chosen() => return ChoiceOutcome::Ignored,
            Some(_) => {},
        }
        if let Some(p) = m.participant_mut(from) {
            p.current_choice = Some(zone);
        }
        tracing::debug!(code = %m.code, participant = %from, zone, "Pick recorded");

        let bot_waiting = m.opponent_of(from).is_some_and(|o| o.is_bot() && !o.has_chosen());
        if bot_waiting {
            self.arm_bot(this, m);
        }

        self.check_round_completion(this, m);
        ChoiceOutcome::Accepted
    }

    /// If both picks are in, cancel the round timers and schedule the
    /// resolution after the display delay. Runs at most once per round.
    pub fn check_round_completion(self: &Arc<Self>, this: &MatchRef, m: &mut Match) {
        if m.phase != MatchPhase::Playing || m.resolving || !m.both_chosen() {
            return;
        }
        m.cancel(TimerSlot::Fallback);
        m.cancel(TimerSlot::Bot);
        m.resolving = true;
        self.arm(
            this,
            m,
            TimerSlot::Transition,
            self.timing.resolve_delay(),
            |e, w, m| e.resolve_round(w, m),
        );
    }

    fn on_bot_timer(self: &Arc<Self>, this: &MatchRef, m: &mut Match) {
        if m.phase != MatchPhase::Playing || m.resolving {
            return;
        }
        let zone = random_zone(&mut m.rng);
        let Some(bot) = m.participants.iter_mut().find(|p| p.is_bot()) else {
            return;
        };
        if bot.current_choice.is_some() {
            return;
        }
        bot.current_choice = Some(zone);
        tracing::debug!(code = %m.code, zone, "Bot picked");
        self.check_round_completion(this, m);
    }

    /// Round timed out: fill every missing pick with a random zone and
    /// resolve immediately. Existing picks are never overwritten.
    fn on_fallback(self: &Arc<Self>, this: &MatchRef, m: &mut Match) {
        if m.phase != MatchPhase::Playing || m.resolving {
            return;
        }
        let rng = &mut m.rng;
        let mut filled = 0;
        for p in m.participants.iter_mut().filter(|p| !p.has_chosen()) {
            p.current_choice = Some(random_zone(rng));
            filled += 1;
        }
        tracing::info!(code = %m.code, round = m.current_round, filled, "Round timed out, filled missing picks");

        m.cancel(TimerSlot::Bot);
        m.resolving = true;
        self.resolve_round(this, m);
    }

    /// Score the round, report it, swap roles, then either finish the match
    /// or schedule the next round.
    pub fn resolve_round(self: &Arc<Self>, this: &MatchRef, m: &mut Match) {
        if m.phase != MatchPhase::Playing {
            tracing::debug!(code = %m.code, "Resolution on a match that is not playing, ignoring");
            return;
        }
        let Some((s, k)) = m.shooter_keeper() else {
            tracing::warn!(code = %m.code, "Cannot resolve without both roles");
            return;
        };
        let (Some(shooter_zone), Some(keeper_zone)) = (
            m.participants[s].current_choice,
            m.participants[k].current_choice,
        ) else {
            tracing::warn!(code = %m.code, "Cannot resolve with a missing pick");
            return;
        };

        m.cancel(TimerSlot::Fallback);
        m.cancel(TimerSlot::Bot);

        let points = keeper_points(shooter_zone, keeper_zone);
        m.participants[k].score += u32::from(points);
        let goal = is_goal(points);

        let result = ServerMessage::RoundResult(RoundResultMsg {
            shooter_zone,
            keeper_zone,
            is_goal: goal,
            keeper_points: points,
            scores: m.scores(),
        });
        for p in m.participants.iter().filter(|p| !p.is_bot()) {
            self.sink.send_to(&p.id, &result);
        }
        tracing::info!(
            code = %m.code,
            round = m.current_round,
            shooter_zone,
            keeper_zone,
            keeper_points = points,
            goal,
            "Round resolved"
        );

        m.swap_roles();

        if m.current_round >= m.max_rounds {
            self.finish_match(m);
        } else {
            m.current_round += 1;
            self.arm(
                this,
                m,
                TimerSlot::Transition,
                self.timing.inter_round(),
                |e, w, m| e.start_round(w, m),
            );
        }
    }

    /// Cancel all timers, mark the match Finished, and announce the result.
    pub fn finish_match(&self, m: &mut Match) {
        m.cancel_all();
        if !m.set_phase(MatchPhase::Finished) {
            return;
        }
        let winner = decide_winner(&m.participants);
        let msg = ServerMessage::MatchEnded(MatchEndedMsg {
            winner: winner.clone(),
            standings: standings(&m.participants),
        });
        for p in m.participants.iter().filter(|p| !p.is_bot()) {
            self.sink.send_to(&p.id, &msg);
        }
        tracing::info!(code = %m.code, ?winner, "Match finished");
    }

    /// Forced end after a participant left: no scoring, no result event.
    pub fn abort_match(&self, m: &mut Match) {
        m.cancel_all();
        if m.phase != MatchPhase::Finished {
            m.set_phase(MatchPhase::Finished);
        }
    }
}
