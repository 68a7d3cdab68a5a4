//! Time sources.
//!
//! The ledger never reads wall time directly; it asks an injected [`Clock`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::types::Timestamp;

pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> Timestamp;
}

/// Wall clock in UTC.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // Pre-epoch wall time clamps to 0.
        Utc::now().timestamp().max(0) as Timestamp
    }
}

/// A clock that only moves when told to.
///
/// Used by tests and by journal replay, where every operation must observe the
/// timestamp it was originally executed at.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
