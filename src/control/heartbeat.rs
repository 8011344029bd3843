//! Periodic liveness task and its cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between the allocator and whatever
/// drives its ticks.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Decides when the liveness announcement is due.
///
/// The driver calls the allocator's tick at a short fixed period; the
/// heartbeat only fires once `alive_interval_ms` has elapsed since the last
/// announcement. The first tick after a (re)start always fires.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    alive_interval_ms: u64,
    last_alive_at: Option<u64>,
    token: CancelToken,
}

impl Heartbeat {
    pub fn new(alive_interval_ms: u64) -> Self {
        Self {
            alive_interval_ms,
            last_alive_at: None,
            token: CancelToken::new(),
        }
    }

    /// Rearms the task; the next check fires. A cancelled token is replaced,
    /// so holders of the old one keep seeing it cancelled.
    pub fn restart(&mut self) {
        self.last_alive_at = None;
        if self.token.is_cancelled() {
            self.token = CancelToken::new();
        }
    }

    /// Returns `true` and records `now_ms` if an announcement is due.
    ///
    /// Never fires once cancelled.
    pub fn check(&mut self, now_ms: u64) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let due = self
            .last_alive_at
            .is_none_or(|last| now_ms.saturating_sub(last) > self.alive_interval_ms);
        if due {
            self.last_alive_at = Some(now_ms);
        }
        due
    }

    pub fn last_alive_at(&self) -> Option<u64> {
        self.last_alive_at
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}
