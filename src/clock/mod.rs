//! Time sources for the ledger.
//!
//! Timestamps are unix milliseconds. `ManualClock` is shared by handle, so a
//! test or simulation script can advance the time seen by a running contract.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: u64) {
        self.advance_ms(days.saturating_mul(MS_PER_DAY));
    }

    pub fn set_ms(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Whole days elapsed between two timestamps; zero if `now` precedes `since`.
pub fn whole_days_between(since_ms: u64, now_ms: u64) -> u64 {
    now_ms.saturating_sub(since_ms) / MS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_handles_share_time() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        handle.advance_days(2);
        assert_eq!(clock.now_ms(), 1_000 + 2 * MS_PER_DAY);
    }

    #[test]
    fn whole_days_floor_and_saturate() {
        assert_eq!(whole_days_between(0, MS_PER_DAY - 1), 0);
        assert_eq!(whole_days_between(0, 3 * MS_PER_DAY + 5), 3);
        assert_eq!(whole_days_between(10, 5), 0);
    }
}
