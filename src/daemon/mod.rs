//! Daemon subsystem: phase state machine, tick scheduler, signal handling
//! and the systemd notify channel.

pub mod loop_main;
pub mod scheduler;
pub mod signals;

pub use loop_main::{DaemonArgs, DaemonParts, FatalReason, MonitorDaemon, Phase};
pub use scheduler::{Scheduler, TickReport, TimerId};
