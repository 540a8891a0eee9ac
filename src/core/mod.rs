//! Core types: errors, configuration, editable field list, clock.

pub mod clock;
pub mod config;
pub mod errors;
pub mod fields;
