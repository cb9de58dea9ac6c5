//! Process-wide I/O counters.
//!
//! The spec models remote-memory accounting as a pair of global counters per
//! memory flavor (real, counter-mode). A handle-based design — threading a
//! `&Counters` into every memory instance — is equally valid per the design
//! notes, but this crate follows the reference model's simpler global form,
//! since every experiment in this crate runs single-threaded and
//! sequentially (see the crate-level concurrency note) and the counters are
//! reset between independent experiments via `reset_counters`.

use std::sync::atomic::{AtomicU64, Ordering};

static REAL_READS: AtomicU64 = AtomicU64::new(0);
static REAL_WRITES: AtomicU64 = AtomicU64::new(0);
static COUNTER_READS: AtomicU64 = AtomicU64::new(0);
static COUNTER_WRITES: AtomicU64 = AtomicU64::new(0);

pub(crate) fn bump_real_read() {
    REAL_READS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn bump_real_write() {
    REAL_WRITES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn bump_counter_reads(n: u64) {
    COUNTER_READS.fetch_add(n, Ordering::Relaxed);
}

pub(crate) fn bump_counter_writes(n: u64) {
    COUNTER_WRITES.fetch_add(n, Ordering::Relaxed);
}

/// A snapshot of all four process-wide I/O counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Reads against non-local real (payload-bearing) memory.
    pub real_reads: u64,
    /// Writes against non-local real memory.
    pub real_writes: u64,
    /// Reads against non-local counter (payload-free) memory.
    pub counter_reads: u64,
    /// Writes against non-local counter memory.
    pub counter_writes: u64,
}

impl Counts {
    /// The sum of all four counters.
    pub fn total(&self) -> u64 {
        self.real_reads + self.real_writes + self.counter_reads + self.counter_writes
    }

    /// The sum of real-memory reads and writes only.
    pub fn real_total(&self) -> u64 {
        self.real_reads + self.real_writes
    }

    /// The sum of counter-memory reads and writes only.
    pub fn counter_total(&self) -> u64 {
        self.counter_reads + self.counter_writes
    }
}

/// Returns the current value of all four process-wide I/O counters without
/// resetting them.
pub fn current_counts() -> Counts {
    Counts {
        real_reads: REAL_READS.load(Ordering::Relaxed),
        real_writes: REAL_WRITES.load(Ordering::Relaxed),
        counter_reads: COUNTER_READS.load(Ordering::Relaxed),
        counter_writes: COUNTER_WRITES.load(Ordering::Relaxed),
    }
}

/// Zeroes all four process-wide I/O counters. Callers should invoke this
/// between independent experiments.
pub fn reset_counters() {
    REAL_READS.store(0, Ordering::Relaxed);
    REAL_WRITES.store(0, Ordering::Relaxed);
    COUNTER_READS.store(0, Ordering::Relaxed);
    COUNTER_WRITES.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_all_four() {
        bump_real_read();
        bump_real_write();
        bump_counter_reads(3);
        bump_counter_writes(4);
        assert!(current_counts().total() > 0);
        reset_counters();
        assert_eq!(current_counts(), Counts::default());
    }
}
