#![forbid(unsafe_code)]

//! btc_monitor: device daemon for a 16x2 character display showing Bitcoin
//! block, fee and price data.
//!
//! Two parts carry the state:
//! 1. **Tick scheduler** ([`daemon`], [`schedule`]): a one-second cooperative
//!    loop that fires refresh and rotation timers, sums source error counters
//!    into a failure breaker, and renders the current screen.
//! 2. **Raw input engine** ([`input`]): a line editor and an option selector
//!    that read raw keystrokes under a deadline and drive the [`setup`] flow.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use btc_monitor::prelude::*;
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod display;
pub mod input;
pub mod logger;
pub mod platform;
pub mod schedule;
pub mod setup;
pub mod sources;
