//! Aggregate failure breaker.
//!
//! The breaker holds no per-source state. Each source owns its error counter
//! (reset on success, bumped on failure); on ticks where a refresh happened
//! the loop hands the current counters to [`CircuitBreaker::recompute`], which
//! sums them fresh and compares against the ceiling.

#![allow(missing_docs)]

/// Pure trip predicate: `sum >= ceiling`.
#[must_use]
pub const fn tripped_at(sum: u64, ceiling: u64) -> bool {
    sum >= ceiling
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreaker {
    ceiling: u64,
    last_sum: u64,
}

impl CircuitBreaker {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling: u64::from(ceiling),
            last_sum: 0,
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Sum computed by the last `recompute`.
    pub fn last_sum(&self) -> u64 {
        self.last_sum
    }

    pub fn set_ceiling(&mut self, ceiling: u32) {
        self.ceiling = u64::from(ceiling);
    }

    /// Fold one source's counter into the running sum.
    pub fn record_failure_delta(&mut self, count: u64) {
        self.last_sum = self.last_sum.saturating_add(count);
    }

    /// Re-sum the current per-source counters and report whether the breaker
    /// tripped.
    pub fn recompute<I>(&mut self, counters: I) -> bool
    where
        I: IntoIterator<Item = u64>,
    {
        self.last_sum = 0;
        for count in counters {
            self.record_failure_delta(count);
        }
        self.tripped()
    }

    pub fn tripped(&self) -> bool {
        tripped_at(self.last_sum, self.ceiling)
    }
}
