//! Per-engine attempt accounting
//!
//! Four monotonic counters shared between the scheduler, the workers, and the
//! lifecycle facade. Increments are relaxed; the only compound read happens at
//! stop, where success and failed are summed for the verdict.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters for one engine
#[derive(Debug, Default)]
pub struct Counters {
    requested: AtomicU64,
    started: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one issued ticket, returning the new total
    pub fn add_requested(&self) -> u64 {
        self.requested.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Count one begun attempt
    pub fn add_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one successful attempt
    pub fn add_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed attempt
    pub fn add_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Tickets issued so far
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }

    /// Attempts begun so far
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Read all four counters
    ///
    /// The reads are not mutually atomic; a snapshot taken while workers run
    /// may be mid-update, which is fine everywhere it is used.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Tickets issued
    pub requested: u64,
    /// Attempts begun
    pub started: u64,
    /// Attempts classified successful
    pub success: u64,
    /// Attempts classified failed
    pub failed: u64,
}

impl CounterSnapshot {
    /// Attempts that ran to completion, successful or not
    pub fn completed(&self) -> u64 {
        self.success + self.failed
    }
}
