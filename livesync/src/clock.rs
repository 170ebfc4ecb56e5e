//! Session clocks
//!
//! The coordinator never reads the system time directly. Time comes from an
//! injected [`Clock`], which in production should already be corrected
//! against the session's time server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use livesync_state::Timestamp;

/// Source of approximately synchronized session time
///
/// Readings must be monotonically non-decreasing per client.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Wall clock with an optional correction offset
///
/// The offset is whatever the host's time-sync collaborator reports as the
/// difference between local time and session time.
#[derive(Debug, Default)]
pub struct SystemClock {
    offset_ms: i64,
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset_ms: i64) -> Self {
        Self {
            offset_ms,
            last: AtomicU64::new(0),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        let corrected = wall.saturating_add_signed(self.offset_ms);

        // Never step backwards, even if the wall clock does
        let previous = self.last.fetch_max(corrected, Ordering::AcqRel);
        Timestamp::from_millis(previous.max(corrected))
    }
}

/// Manually driven clock for simulations and tests
///
/// Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start.as_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.now.fetch_add(millis, Ordering::AcqRel);
    }

    pub fn set(&self, to: Timestamp) {
        self.now.store(to.as_millis(), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now.load(Ordering::Acquire))
    }
}
