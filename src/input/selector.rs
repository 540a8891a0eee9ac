//! Pick one option with the arrow keys.

#![allow(missing_docs)]

use crate::core::errors::{BtmError, Result};
use crate::display::Display;
use crate::input::{
    CTRL_C, Deadline, ESCAPE, InputOutcome, KeySource, RawSession, read_escape_tail,
};

/// One choice: `key` is returned on commit, `label` and `detail` are shown on
/// the two rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption<K> {
    pub key: K,
    pub label: String,
    pub detail: String,
}

impl<K> SelectOption<K> {
    pub fn new(key: K, label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
            detail: detail.into(),
        }
    }
}

/// Cursor movement decoded from an escape sequence tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Up,
    Down,
}

/// `[A` is up, `[B` is down. Anything else, including a tail cut short by
/// the deadline, is not a move.
fn decode_arrow(tail: &[u8]) -> Option<Move> {
    match tail {
        [b'[', b'A'] => Some(Move::Up),
        [b'[', b'B'] => Some(Move::Down),
        _ => None,
    }
}

/// Cursor over `len` options that wraps at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    len: usize,
}

impl Cursor {
    /// `start` is clamped into range. `len` must be non-zero.
    pub fn new(start: usize, len: usize) -> Self {
        Self {
            index: start.min(len.saturating_sub(1)),
            len,
        }
    }

    pub const fn index(self) -> usize {
        self.index
    }

    pub fn up(&mut self) {
        self.index = if self.index == 0 {
            self.len - 1
        } else {
            self.index - 1
        };
    }

    pub fn down(&mut self) {
        self.index = (self.index + 1) % self.len;
    }
}

/// Show one option at a time; arrows move, Enter commits the shown option.
pub fn select<D, K, T>(
    display: &mut D,
    keys: &mut K,
    options: &[SelectOption<T>],
    start: usize,
    deadline: &Deadline,
) -> Result<InputOutcome<T>>
where
    D: Display + ?Sized,
    K: KeySource + ?Sized,
    T: Clone,
{
    if options.is_empty() {
        return Err(BtmError::Runtime {
            details: "selector needs at least one option".to_string(),
        });
    }
    let mut cursor = Cursor::new(start, options.len());
    let mut session = RawSession::begin(keys)?;

    loop {
        let shown = &options[cursor.index()];
        display.show_centered(&shown.label, &shown.detail)?;

        let Some(byte) = session.read_byte(deadline)? else {
            return Ok(InputOutcome::TimedOut);
        };
        match byte {
            b'\r' | b'\n' => return Ok(InputOutcome::Committed(shown.key.clone())),
            CTRL_C => return Ok(InputOutcome::Cancelled),
            ESCAPE => {
                let tail = read_escape_tail(&mut *session, deadline, 2)?;
                match decode_arrow(&tail) {
                    Some(Move::Up) => cursor.up(),
                    Some(Move::Down) => cursor.down(),
                    None => {}
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemoryDisplay;
    use crate::input::{ScriptedKey, ScriptedKeys};

    const UP: &[u8] = b"\x1b[A";
    const DOWN: &[u8] = b"\x1b[B";

    fn abc() -> Vec<SelectOption<char>> {
        vec![
            SelectOption::new('A', "alpha", ""),
            SelectOption::new('B', "bravo", ""),
            SelectOption::new('C', "charlie", ""),
        ]
    }

    fn pick(keys: &mut ScriptedKeys, start: usize) -> InputOutcome<char> {
        let mut display = MemoryDisplay::new(16);
        select(&mut display, keys, &abc(), start, &Deadline::after_secs(30)).unwrap()
    }

    #[test]
    fn down_then_enter_commits_second() {
        let mut keys = ScriptedKeys::default();
        keys.push_bytes(DOWN);
        keys.push_text("\r");
        assert_eq!(pick(&mut keys, 0), InputOutcome::Committed('B'));
    }

    #[test]
    fn up_from_first_wraps_to_last() {
        let mut keys = ScriptedKeys::default();
        keys.push_bytes(UP);
        keys.push_text("\r");
        assert_eq!(pick(&mut keys, 0), InputOutcome::Committed('C'));
    }

    #[test]
    fn down_from_last_wraps_to_first() {
        let mut keys = ScriptedKeys::default();
        keys.push_bytes(DOWN);
        keys.push_text("\n");
        assert_eq!(pick(&mut keys, 2), InputOutcome::Committed('A'));
    }

    #[test]
    fn unknown_sequences_and_letters_are_ignored() {
        let mut keys = ScriptedKeys::default();
        keys.push_bytes(b"\x1b[C\x1bOBxq");
        keys.push_bytes(DOWN);
        keys.push_text("\r");
        assert_eq!(pick(&mut keys, 0), InputOutcome::Committed('B'));
    }

    #[test]
    fn cut_short_sequence_is_not_a_move() {
        let mut keys = ScriptedKeys::new([
            ScriptedKey::Byte(ESCAPE),
            ScriptedKey::Byte(b'['),
            ScriptedKey::Stall,
            ScriptedKey::Byte(b'\r'),
        ]);
        assert_eq!(pick(&mut keys, 1), InputOutcome::Committed('B'));
    }

    #[test]
    fn timeout_and_cancel_are_distinct() {
        assert_eq!(pick(&mut ScriptedKeys::default(), 0), InputOutcome::TimedOut);
        assert_eq!(
            pick(&mut ScriptedKeys::typing("\x03"), 0),
            InputOutcome::Cancelled
        );
    }

    #[test]
    fn renders_the_option_under_the_cursor() {
        let display = MemoryDisplay::new(16);
        let mut writer = display.clone();
        let mut keys = ScriptedKeys::default();
        keys.push_bytes(DOWN);
        select(&mut writer, &mut keys, &abc(), 0, &Deadline::after_secs(30)).unwrap();
        assert!(display.ever_showed("alpha"));
        assert_eq!(display.trimmed()[0].trim(), "bravo");
        assert_eq!(keys.restores(), 1);
    }

    #[test]
    fn empty_option_list_is_an_error() {
        let mut display = MemoryDisplay::new(16);
        let options: Vec<SelectOption<u8>> = Vec::new();
        let result = select(
            &mut display,
            &mut ScriptedKeys::default(),
            &options,
            0,
            &Deadline::after_secs(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn cursor_clamps_start() {
        assert_eq!(Cursor::new(9, 3).index(), 2);
    }
}
