//! Screen rotation over a fixed screen list.

#![allow(missing_docs)]

use crate::core::errors::{BtmError, Result};

/// Renderable screens in rotation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Clock, date and price.
    ClockPrice,
    /// Block height, age and fee estimates.
    BlockFees,
}

impl Screen {
    /// The rotation. Adding a screen means adding it here and giving it a
    /// render function.
    pub const ROTATION: [Self; 2] = [Self::ClockPrice, Self::BlockFees];

    pub const fn label(self) -> &'static str {
        match self {
            Self::ClockPrice => "clock/price",
            Self::BlockFees => "block/fees",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScreenRotator {
    screens: Vec<Screen>,
    index: usize,
}

impl ScreenRotator {
    pub fn new() -> Self {
        Self::with_screens(Screen::ROTATION.to_vec())
    }

    pub fn with_screens(screens: Vec<Screen>) -> Self {
        Self { screens, index: 0 }
    }

    /// Move to the next screen, wrapping after the last.
    pub fn advance(&mut self) {
        if !self.screens.is_empty() {
            self.index = (self.index + 1) % self.screens.len();
        }
    }

    /// Screen at the current index. An empty rotation or an index outside it
    /// is an invariant violation.
    pub fn current(&self) -> Result<Screen> {
        self.screens
            .get(self.index)
            .copied()
            .ok_or(BtmError::ScreenIndex {
                index: self.index,
                len: self.screens.len(),
            })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }
}

impl Default for ScreenRotator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_on_first_screen() {
        let rotator = ScreenRotator::new();
        assert_eq!(rotator.current().unwrap(), Screen::ClockPrice);
    }

    #[test]
    fn advance_wraps() {
        let mut rotator = ScreenRotator::new();
        rotator.advance();
        assert_eq!(rotator.current().unwrap(), Screen::BlockFees);
        rotator.advance();
        assert_eq!(rotator.current().unwrap(), Screen::ClockPrice);
    }

    #[test]
    fn empty_rotation_is_index_error() {
        let mut rotator = ScreenRotator::with_screens(Vec::new());
        rotator.advance();
        let err = rotator.current().unwrap_err();
        assert_eq!(err.code(), "BTM-3101");
    }

    proptest! {
        #[test]
        fn current_is_idempotent(advances in 0usize..20, reads in 1usize..10) {
            let mut rotator = ScreenRotator::new();
            for _ in 0..advances {
                rotator.advance();
            }
            let first = rotator.current().unwrap();
            for _ in 0..reads {
                prop_assert_eq!(rotator.current().unwrap(), first);
            }
        }

        #[test]
        fn full_cycle_returns_to_start(len in 1usize..8, start in 0usize..8) {
            let screens: Vec<Screen> = (0..len).map(|i| Screen::ROTATION[i % 2]).collect();
            let mut rotator = ScreenRotator::with_screens(screens);
            for _ in 0..start {
                rotator.advance();
            }
            let before = rotator.index();
            for _ in 0..len {
                rotator.advance();
            }
            prop_assert_eq!(rotator.index(), before);
            prop_assert!(rotator.index() < rotator.len());
        }
    }
}
