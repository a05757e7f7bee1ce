//! Cancellable deferred actions.
//!
//! The engine never sleeps or spawns directly; it asks a [`Scheduler`] to run
//! a closure after a delay and keeps the returned [`TimerHandle`] in one of the
//! match's timer slots. Production uses [`TokioScheduler`]; tests can use
//! [`ManualScheduler`] and advance a virtual clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// A closure run once when its timer fires.
pub type DeferredAction = Box<dyn FnOnce() + Send + 'static>;

/// Runs actions after a delay. Implementations must never run an action
/// inline from `schedule`.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, action: DeferredAction) -> TimerHandle;
}

/// Handle to a pending action. Cancelling is idempotent.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<AbortHandle>,
}

impl TimerHandle {
    fn new(cancelled: Arc<AtomicBool>, task: Option<AbortHandle>) -> Self {
        Self { cancelled, task }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Scheduler backed by `tokio::time::sleep` on spawned tasks.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, action: DeferredAction) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::Acquire) {
                action();
            }
        });
        TimerHandle::new(cancelled, Some(task.abort_handle()))
    }
}

struct PendingAction {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    action: DeferredAction,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingAction>,
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`]. Actions
/// due at the same instant run in scheduling order.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of actions still waiting (cancelled ones excluded).
    pub fn pending(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|p| !p.cancelled.load(Ordering::Acquire))
            .count()
    }

    /// Move the clock forward, running every action that comes due, including
    /// ones scheduled by actions run during this call.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        while let Some(next) = self.pop_due(target) {
            if !next.cancelled.load(Ordering::Acquire) {
                (next.action)();
            }
        }
        self.lock().now = target;
    }

    fn pop_due(&self, target: Duration) -> Option<PendingAction> {
        let mut clock = self.lock();
        clock
            .pending
            .retain(|p| !p.cancelled.load(Ordering::Acquire));
        let idx = clock
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= target)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        let next = clock.pending.swap_remove(idx);
        clock.now = next.due;
        Some(next)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, action: DeferredAction) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.lock();
        let seq = clock.next_seq;
        clock.next_seq += 1;
        let due = clock.now + delay;
        clock.pending.push(PendingAction {
            due,
            seq,
            cancelled: Arc::clone(&cancelled),
            action,
        });
        TimerHandle::new(cancelled, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> DeferredAction) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (hits, move || {
            let h = Arc::clone(&h);
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }) as DeferredAction
        })
    }

    #[test]
    fn manual_runs_only_due_actions() {
        let sched = ManualScheduler::new();
        let (hits, action) = counter();
        sched.schedule(Duration::from_secs(1), action());
        sched.schedule(Duration::from_secs(5), action());

        sched.advance(Duration::from_secs(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sched.pending(), 1);
        assert_eq!(sched.now(), Duration::from_secs(2));

        sched.advance(Duration::from_secs(3));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn manual_cancel_prevents_run() {
        let sched = ManualScheduler::new();
        let (hits, action) = counter();
        let handle = sched.schedule(Duration::from_millis(10), action());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());

        sched.advance(Duration::from_secs(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn manual_runs_in_due_then_schedule_order() {
        let sched = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, ms) in [("late", 30u64), ("first", 10), ("second", 10)] {
            let order = Arc::clone(&order);
            sched.schedule(
                Duration::from_millis(ms),
                Box::new(move || order.lock().unwrap().push(label)),
            );
        }
        sched.advance(Duration::from_millis(50));
        assert_eq!(*order.lock().unwrap(), ["first", "second", "late"]);
    }

    #[test]
    fn manual_chained_actions_run_within_one_advance() {
        let sched = Arc::new(ManualScheduler::new());
        let (hits, action) = counter();
        let inner = Arc::clone(&sched);
        let chained = action();
        sched.schedule(
            Duration::from_millis(100),
            Box::new(move || {
                inner.schedule(Duration::from_millis(100), chained);
            }),
        );

        sched.advance(Duration::from_millis(150));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        sched.advance(Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_fires_after_delay() {
        let sched = TokioScheduler::new(Handle::current());
        let (hits, action) = counter();
        sched.schedule(Duration::from_secs(3), action());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_cancel() {
        let sched = TokioScheduler::new(Handle::current());
        let (hits, action) = counter();
        let handle = sched.schedule(Duration::from_secs(1), action());
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
