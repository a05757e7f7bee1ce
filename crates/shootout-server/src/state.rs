use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::registry::MatchRegistry;
use crate::scheduler::Scheduler;
use crate::session::{EventSink, Sessions};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MatchRegistry>,
    pub sessions: Arc<Sessions>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let sessions = Arc::new(Sessions::new());
        let sink: Arc<dyn EventSink> = Arc::<Sessions>::clone(&sessions);
        let engine = Engine::new(scheduler, Arc::clone(&sink), config.timing.clone());
        let registry = MatchRegistry::new(engine, sink, config.matches.clone(), config.rng_seed);
        Self {
            registry: Arc::new(registry),
            sessions,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Counts a live WebSocket connection for as long as it is held.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    #[test]
    fn connection_guard_tracks_count() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = ConnectionGuard::new(Arc::clone(&counter));
        let b = ConnectionGuard::new(Arc::clone(&counter));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        drop(a);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        drop(b);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn new_state_is_empty() {
        let state = AppState::new(ServerConfig::default(), Arc::new(ManualScheduler::new()));
        assert!(state.registry.is_empty());
        assert!(state.sessions.is_empty());
        assert_eq!(state.ws_connection_count.load(Ordering::Relaxed), 0);
    }
}
