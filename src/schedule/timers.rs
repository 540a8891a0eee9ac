//! Timer set: independent repeating intervals polled once per tick.
//!
//! Each entry keeps an interval and the next epoch second it is due. A fired
//! timer is re-armed from the tick's `now`, not from its previous due time, so
//! a stalled process fires each timer once on resume instead of catching up.

#![allow(missing_docs)]

use std::fmt::Debug;

use crate::core::errors::{BtmError, Result};

/// One registered interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry<K> {
    pub id: K,
    pub interval_secs: u64,
    pub next_due: i64,
}

/// Set of timers keyed by `K`, in registration order.
#[derive(Debug, Clone, Default)]
pub struct TimerSet<K> {
    entries: Vec<TimerEntry<K>>,
}

impl<K: Copy + Eq + Debug> TimerSet<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `id`, first due at `now`. Re-registering an id replaces its
    /// interval; its due time moves to `now` only if that is later.
    pub fn register(&mut self, id: K, interval_secs: u64, now: i64) -> Result<()> {
        if interval_secs == 0 {
            return Err(BtmError::InvalidConfig {
                details: format!("timer {id:?} needs an interval > 0"),
            });
        }
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => {
                existing.interval_secs = interval_secs;
                existing.next_due = existing.next_due.max(now);
            }
            None => self.entries.push(TimerEntry {
                id,
                interval_secs,
                next_due: now,
            }),
        }
        Ok(())
    }

    /// Change the interval of `id` and re-arm it from `now`.
    ///
    /// Unlike `register`, the timer is not made due immediately. The due time
    /// never moves backwards.
    pub fn reschedule(&mut self, id: K, interval_secs: u64, now: i64) -> Result<()> {
        if interval_secs == 0 {
            return Err(BtmError::InvalidConfig {
                details: format!("timer {id:?} needs an interval > 0"),
            });
        }
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return self.register(id, interval_secs, now);
        };
        entry.interval_secs = interval_secs;
        entry.next_due = entry.next_due.max(now.saturating_add(to_i64(interval_secs)));
        Ok(())
    }

    /// Every timer with `next_due <= now`, each re-armed to `now + interval`.
    pub fn due(&mut self, now: i64) -> Vec<K> {
        let mut fired = Vec::new();
        for entry in &mut self.entries {
            if entry.next_due <= now {
                entry.next_due = now.saturating_add(to_i64(entry.interval_secs));
                fired.push(entry.id);
            }
        }
        fired
    }

    pub fn get(&self, id: K) -> Option<&TimerEntry<K>> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn to_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum T {
        A,
        B,
    }

    #[test]
    fn zero_interval_rejected() {
        let mut set = TimerSet::new();
        assert!(set.register(T::A, 0, 0).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn registered_timer_is_due_immediately() {
        let mut set = TimerSet::new();
        set.register(T::A, 5, 100).unwrap();
        assert_eq!(set.due(100), vec![T::A]);
        assert_eq!(set.get(T::A).unwrap().next_due, 105);
    }

    #[test]
    fn rearm_uses_now_not_previous_due() {
        let mut set = TimerSet::new();
        set.register(T::A, 10, 0).unwrap();
        set.due(0);
        // Process stalled for a long time.
        assert_eq!(set.due(1_000), vec![T::A]);
        assert_eq!(set.get(T::A).unwrap().next_due, 1_010);
        assert!(set.due(1_001).is_empty());
    }

    #[test]
    fn simultaneous_timers_fire_together() {
        let mut set = TimerSet::new();
        set.register(T::A, 6, 0).unwrap();
        set.register(T::B, 10, 0).unwrap();
        assert_eq!(set.due(0), vec![T::A, T::B]);
        assert_eq!(set.due(6), vec![T::A]);
        assert_eq!(set.due(10), vec![T::B]);
        assert_eq!(set.due(12), vec![T::A]);
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut set = TimerSet::new();
        set.register(T::A, 6, 0).unwrap();
        set.register(T::A, 9, 3).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(T::A).unwrap().interval_secs, 9);
    }

    #[test]
    fn re_register_never_moves_due_backwards() {
        let mut set = TimerSet::new();
        set.register(T::A, 60, 0).unwrap();
        set.due(0);
        assert_eq!(set.get(T::A).unwrap().next_due, 60);

        set.register(T::A, 5, 20).unwrap();
        assert_eq!(set.get(T::A).unwrap().next_due, 60);
        assert!(set.due(20).is_empty());

        set.register(T::A, 5, 90).unwrap();
        assert_eq!(set.get(T::A).unwrap().next_due, 90);
    }

    #[test]
    fn reschedule_does_not_fire_immediately() {
        let mut set = TimerSet::new();
        set.register(T::A, 60, 0).unwrap();
        set.due(0);
        set.reschedule(T::A, 5, 20).unwrap();
        assert!(set.due(20).is_empty());
        assert_eq!(set.get(T::A).unwrap().next_due, 60);
        set.reschedule(T::A, 100, 20).unwrap();
        assert_eq!(set.get(T::A).unwrap().next_due, 120);
    }

    proptest! {
        #[test]
        fn no_double_fire_at_same_instant(
            interval in 1u64..3_600,
            start in 0i64..1_000_000,
            offset in 0i64..10_000,
        ) {
            let mut set = TimerSet::new();
            set.register(T::A, interval, start).unwrap();
            let now = start + offset;
            prop_assert_eq!(set.due(now), vec![T::A]);
            prop_assert!(set.due(now).is_empty());
        }

        #[test]
        fn due_epochs_never_decrease(
            interval_a in 1u64..100,
            interval_b in 1u64..100,
            steps in prop::collection::vec(0i64..50, 1..60),
        ) {
            let mut set = TimerSet::new();
            set.register(T::A, interval_a, 0).unwrap();
            set.register(T::B, interval_b, 0).unwrap();
            let mut now = 0;
            let mut last = (0, 0);
            for step in steps {
                now += step;
                set.due(now);
                let a = set.get(T::A).unwrap().next_due;
                let b = set.get(T::B).unwrap().next_due;
                prop_assert!(a >= last.0 && b >= last.1);
                last = (a, b);
            }
        }

        #[test]
        fn every_due_timer_fires(
            interval_a in 1u64..100,
            interval_b in 1u64..100,
            now in 0i64..10_000,
        ) {
            let mut set = TimerSet::new();
            set.register(T::A, interval_a, 0).unwrap();
            set.register(T::B, interval_b, 0).unwrap();
            set.due(0);
            let expect_a = set.get(T::A).unwrap().next_due <= now;
            let expect_b = set.get(T::B).unwrap().next_due <= now;
            let fired = set.due(now);
            prop_assert_eq!(fired.contains(&T::A), expect_a);
            prop_assert_eq!(fired.contains(&T::B), expect_b);
        }
    }
}
