use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};

/// Time source for throttling and liveness.
///
/// `now_ms` must be monotonic; `utc_now` is only used for human-facing
/// timestamps.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;

    /// Current wall-clock time.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real time: monotonic milliseconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can hold one handle while the
/// allocator owns another.
///
/// # Examples
///
/// ```
/// use wattmgr::control::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let handle = clock.clone();
/// handle.advance_ms(1500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
    epoch: DateTime<Utc>,
}

impl ManualClock {
    /// Starts at 0 ms, with wall time anchored at the Unix epoch.
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Starts at 0 ms, with wall time anchored at `epoch`.
    pub fn starting_at(epoch: DateTime<Utc>) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(0)),
            epoch,
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs * 1000);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = i64::try_from(self.now_ms()).unwrap_or(i64::MAX);
        self.epoch + TimeDelta::milliseconds(elapsed)
    }
}
