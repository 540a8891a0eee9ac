//! Tick scheduling primitives: timer set, failure breaker, screen rotation.

pub mod breaker;
pub mod rotator;
pub mod timers;

pub use breaker::CircuitBreaker;
pub use rotator::{Screen, ScreenRotator};
pub use timers::TimerSet;
