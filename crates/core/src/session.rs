//! Shared per-session state.
//!
//! One [`SessionStats`] is shared between the navigation state machine, the
//! liveness supervisor, the event listeners and the status loop. The activity
//! instant only ever advances toward "now", so last-writer-wins between the
//! heartbeat and the watchdog is acceptable.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Mutable attributes of one live session.
#[derive(Debug)]
pub struct SessionStats {
    started: Instant,
    last_activity: Mutex<Instant>,
    restarts: AtomicU32,
    cycles: AtomicU32,
    last_injected: Mutex<Option<String>>,
}

impl SessionStats {
    pub fn new() -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            started: now,
            last_activity: Mutex::new(now),
            restarts: AtomicU32::new(0),
            cycles: AtomicU32::new(0),
            last_injected: Mutex::new(None),
        })
    }

    /// Records activity now.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn idle(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Increments the restart counter and returns the new value.
    pub fn note_restart(&self) -> u32 {
        self.restarts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Increments the completed-cycle counter and returns the new value.
    pub fn note_cycle(&self) -> u32 {
        self.cycles.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn note_injection(&self, address: &str) {
        *self.last_injected.lock() = Some(address.to_string());
    }

    pub fn last_injected(&self) -> Option<String> {
        self.last_injected.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_resets_idle() {
        let stats = SessionStats::new();
        std::thread::sleep(Duration::from_millis(20));
        assert!(stats.idle() >= Duration::from_millis(20));
        stats.touch();
        assert!(stats.idle() < Duration::from_millis(20));
    }

    #[test]
    fn counters_advance_monotonically() {
        let stats = SessionStats::new();
        assert_eq!(stats.restarts(), 0);
        assert_eq!(stats.note_restart(), 1);
        assert_eq!(stats.note_restart(), 2);
        assert_eq!(stats.restarts(), 2);

        assert_eq!(stats.note_cycle(), 1);
        assert_eq!(stats.cycles(), 1);
    }

    #[test]
    fn last_injected_tracks_most_recent_address() {
        let stats = SessionStats::new();
        assert_eq!(stats.last_injected(), None);
        stats.note_injection("https://site/threads/1");
        stats.note_injection("https://site/");
        assert_eq!(stats.last_injected().as_deref(), Some("https://site/"));
    }
}
