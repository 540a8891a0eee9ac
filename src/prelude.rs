//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use btc_monitor::prelude::*;
//! ```

// Core
pub use crate::core::clock::{Clock, SystemClock};
pub use crate::core::config::Config;
pub use crate::core::errors::{BtmError, Result};

// Scheduling
pub use crate::daemon::{DaemonArgs, FatalReason, MonitorDaemon, Scheduler, TimerId};
pub use crate::schedule::{CircuitBreaker, Screen, ScreenRotator, TimerSet};

// Input
pub use crate::input::{Deadline, InputOutcome, KeySource, SelectOption, read_line, select};

// Display
pub use crate::display::{Display, MemoryDisplay};

// Sources and platform
pub use crate::platform::{ActionResult, SystemActions};
pub use crate::sources::{DataSource, RefreshOutcome, SourceSet};
