//! One-second tick logic: due timers, source refreshes, breaker, rotation.
//!
//! [`Scheduler::tick`] does no I/O of its own beyond the refresh calls it
//! makes on the sources; rendering and sleeping belong to the daemon loop.

#![allow(missing_docs)]

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::schedule::{CircuitBreaker, Screen, ScreenRotator, TimerSet};
use crate::sources::{RefreshOutcome, SourceSet};

/// Timers driven by the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Block metadata and fees, every `wait_meta` seconds.
    Chain,
    /// Price, every `wait_price` seconds.
    Price,
    /// Screen rotation, every `wait_scr_chg` seconds.
    Rotate,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub fired: Vec<TimerId>,
    pub refreshes: Vec<(&'static str, RefreshOutcome)>,
    pub rotated: bool,
    /// The chain refresh moved to a new tip.
    pub new_block: bool,
    /// Aggregate error count, when a refresh happened this tick.
    pub error_sum: Option<u64>,
    pub tripped: bool,
    /// Screen to render after this tick.
    pub screen: Screen,
}

impl TickReport {
    pub fn refreshed(&self) -> bool {
        !self.refreshes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    timers: TimerSet<TimerId>,
    breaker: CircuitBreaker,
    rotator: ScreenRotator,
}

impl Scheduler {
    /// Register every timer due at `now`, so the first tick refreshes and
    /// rotates.
    pub fn new(config: &Config, now: i64) -> Result<Self> {
        Self::with_rotator(config, now, ScreenRotator::new())
    }

    pub fn with_rotator(config: &Config, now: i64, rotator: ScreenRotator) -> Result<Self> {
        let mut timers = TimerSet::new();
        timers.register(TimerId::Chain, config.wait_meta, now)?;
        timers.register(TimerId::Price, config.wait_price, now)?;
        timers.register(TimerId::Rotate, config.wait_scr_chg, now)?;
        Ok(Self {
            timers,
            breaker: CircuitBreaker::new(config.api_failures),
            rotator,
        })
    }

    /// Apply reloaded intervals and ceiling without making anything due early.
    pub fn reconfigure(&mut self, config: &Config, now: i64) -> Result<()> {
        self.timers
            .reschedule(TimerId::Chain, config.wait_meta, now)?;
        self.timers
            .reschedule(TimerId::Price, config.wait_price, now)?;
        self.timers
            .reschedule(TimerId::Rotate, config.wait_scr_chg, now)?;
        self.breaker.set_ceiling(config.api_failures);
        Ok(())
    }

    /// Run one tick at epoch second `now`.
    ///
    /// Due refresh timers refresh their sources, a due rotation advances the
    /// screen, and when any refresh happened the breaker re-sums the
    /// sources' error counters. The current screen is always reported, so
    /// an invalid rotation index surfaces as an error every tick.
    pub fn tick(&mut self, now: i64, sources: &mut SourceSet) -> Result<TickReport> {
        let fired = self.timers.due(now);
        let mut refreshes = Vec::new();
        let mut new_block = false;
        let mut rotated = false;

        for id in &fired {
            match id {
                TimerId::Chain => {
                    refreshes.extend(sources.refresh_chain());
                    new_block = sources.block.snapshot().is_new_block;
                }
                TimerId::Price => refreshes.push(sources.refresh_price()),
                TimerId::Rotate => {
                    self.rotator.advance();
                    rotated = true;
                }
            }
        }

        let (error_sum, tripped) = if refreshes.is_empty() {
            (None, false)
        } else {
            let tripped = self.breaker.recompute(sources.error_counts());
            (Some(self.breaker.last_sum()), tripped)
        };

        Ok(TickReport {
            fired,
            refreshes,
            rotated,
            new_block,
            error_sum,
            tripped,
            screen: self.rotator.current()?,
        })
    }

    /// Refresh every source outside the timers (boot, forced refresh) and
    /// re-sum the breaker. Timer due times are left alone.
    pub fn refresh_all(&mut self, sources: &mut SourceSet) -> Result<TickReport> {
        let mut refreshes: Vec<(&'static str, RefreshOutcome)> =
            sources.refresh_chain().into_iter().collect();
        let new_block = sources.block.snapshot().is_new_block;
        refreshes.push(sources.refresh_price());
        let tripped = self.breaker.recompute(sources.error_counts());
        Ok(TickReport {
            fired: Vec::new(),
            refreshes,
            rotated: false,
            new_block,
            error_sum: Some(self.breaker.last_sum()),
            tripped,
            screen: self.rotator.current()?,
        })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn rotator(&self) -> &ScreenRotator {
        &self.rotator
    }

    pub fn timers(&self) -> &TimerSet<TimerId> {
        &self.timers
    }
}
