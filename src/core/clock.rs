//! Wall clock used by the tick loop and the setup flow's hold delays.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of wall-clock time and blocking delays.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    /// Block the control thread. The tick loop's one-second pacing and every
    /// message hold on the display go through here.
    fn sleep(&self, duration: Duration);

    /// Current time as whole epoch seconds.
    fn epoch(&self) -> i64 {
        self.now().timestamp()
    }
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
