//! Host capabilities: networking, time, remote access and self-update.

pub mod pal;

pub use pal::{ActionResult, LinuxSystem, MockSystem, PingStats, SystemActions};
