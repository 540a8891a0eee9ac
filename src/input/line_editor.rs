//! Single-line text entry on a two-row display.
//!
//! Row 0 carries the prompt, row 1 the rightmost `columns()` characters of
//! the buffer, so the view scrolls left as the text grows.

#![allow(missing_docs)]

use crate::core::errors::Result;
use crate::display::Display;
use crate::display::layout::trailing_window;
use crate::input::{
    BACKSPACE, CTRL_C, DELETE, Deadline, ESCAPE, InputOutcome, KeySource, RawSession,
    read_escape_tail,
};

/// Longest escape sequence the editor swallows (e.g. `ESC [ 1 5 ; 2 ~`).
const MAX_ESCAPE_TAIL: usize = 7;

/// Effect of one input byte on the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Changed,
    Unchanged,
    Commit,
    Cancel,
    /// Start of an escape sequence; the caller discards the rest of it.
    Escape,
}

/// Edit buffer with UTF-8 assembly for multi-byte input.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    text: String,
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new(initial: &str) -> Self {
        Self {
            text: initial.to_string(),
            pending: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn feed(&mut self, byte: u8) -> Edit {
        match byte {
            b'\r' | b'\n' => Edit::Commit,
            CTRL_C => Edit::Cancel,
            DELETE | BACKSPACE => {
                self.pending.clear();
                if self.text.pop().is_some() {
                    Edit::Changed
                } else {
                    Edit::Unchanged
                }
            }
            ESCAPE => {
                self.pending.clear();
                Edit::Escape
            }
            0x00..=0x1f => Edit::Unchanged,
            0x20..=0x7e => {
                self.pending.clear();
                self.text.push(char::from(byte));
                Edit::Changed
            }
            _ => self.feed_multibyte(byte),
        }
    }

    fn feed_multibyte(&mut self, byte: u8) -> Edit {
        self.pending.push(byte);
        match std::str::from_utf8(&self.pending) {
            Ok(decoded) => {
                self.text.push_str(decoded);
                self.pending.clear();
                Edit::Changed
            }
            // Invalid sequence: drop it.
            Err(e) if e.error_len().is_some() => {
                self.pending.clear();
                Edit::Unchanged
            }
            Err(_) => Edit::Unchanged,
        }
    }
}

fn render<D: Display + ?Sized>(display: &mut D, prompt: &str, text: &str) -> Result<()> {
    let cols = display.columns();
    display.show(prompt, trailing_window(text, cols))
}

/// Discard the rest of an escape sequence: a CSI/SS3 introducer and the
/// bytes up to its final byte, or a single trailing byte otherwise.
fn skip_escape<K: KeySource + ?Sized>(keys: &mut K, deadline: &Deadline) -> Result<()> {
    let introducer = read_escape_tail(keys, deadline, 1)?;
    if !matches!(introducer.first(), Some(b'[' | b'O')) {
        return Ok(());
    }
    for _ in 0..MAX_ESCAPE_TAIL {
        match read_escape_tail(keys, deadline, 1)?.first() {
            Some(0x40..=0x7e) | None => break,
            Some(_) => {}
        }
    }
    Ok(())
}

/// Edit a line starting from `initial` until Enter, Ctrl-C or `deadline`.
///
/// Renders once up front and again after every change.
pub fn read_line<D, K>(
    display: &mut D,
    keys: &mut K,
    prompt: &str,
    initial: &str,
    deadline: &Deadline,
) -> Result<InputOutcome<String>>
where
    D: Display + ?Sized,
    K: KeySource + ?Sized,
{
    let mut buffer = LineBuffer::new(initial);
    let mut session = RawSession::begin(keys)?;
    render(display, prompt, buffer.as_str())?;

    loop {
        let Some(byte) = session.read_byte(deadline)? else {
            return Ok(InputOutcome::TimedOut);
        };
        match buffer.feed(byte) {
            Edit::Commit => return Ok(InputOutcome::Committed(buffer.into_string())),
            Edit::Cancel => return Ok(InputOutcome::Cancelled),
            Edit::Changed => render(display, prompt, buffer.as_str())?,
            Edit::Escape => skip_escape(&mut *session, deadline)?,
            Edit::Unchanged => {}
        }
    }
}
