//! Raw keystroke input under a deadline: line editor and option selector.
//!
//! Every prompt returns an [`InputOutcome`]: a committed value, a timeout
//! (callers use their default) or a cancellation (Ctrl-C, which aborts only
//! the enclosing setup step). Keys come from a [`KeySource`]; while a prompt
//! runs the source is held in raw mode by a [`RawSession`], which restores the
//! original discipline when dropped on every exit path.

#![allow(missing_docs)]

pub mod line_editor;
pub mod selector;
#[cfg(unix)]
pub mod terminal;

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use crate::core::errors::Result;

pub use line_editor::read_line;
pub use selector::{SelectOption, select};
#[cfg(unix)]
pub use terminal::TtyKeys;

pub const CTRL_C: u8 = 0x03;
pub const BACKSPACE: u8 = 0x08;
pub const ESCAPE: u8 = 0x1b;
pub const DELETE: u8 = 0x7f;

/// How long the bytes after an escape may trail it. A lone ESC keypress is
/// dropped once this passes instead of stalling until the prompt deadline.
pub const ESCAPE_FOLLOW_UP: Duration = Duration::from_millis(75);

/// Result of one interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome<T> {
    Committed(T),
    /// The deadline passed before a commit. Not an error: use the default.
    TimedOut,
    /// Ctrl-C. The current step is abandoned.
    Cancelled,
}

impl<T> InputOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> InputOutcome<U> {
        match self {
            Self::Committed(value) => InputOutcome::Committed(f(value)),
            Self::TimedOut => InputOutcome::TimedOut,
            Self::Cancelled => InputOutcome::Cancelled,
        }
    }

    pub fn committed(self) -> Option<T> {
        match self {
            Self::Committed(value) => Some(value),
            Self::TimedOut | Self::Cancelled => None,
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// An absolute point in time that a prompt, or a chain of nested prompts,
/// must finish by.
///
/// Waits recompute the remaining budget from the deadline each time, so a
/// deadline handed down to a nested prompt keeps counting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn after_secs(secs: u64) -> Self {
        Self::after(Duration::from_secs(secs))
    }

    /// Time left, zero once passed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// The earlier of this deadline and `budget` from now.
    pub fn capped(&self, budget: Duration) -> Self {
        Self {
            at: self.at.min(Instant::now() + budget),
        }
    }
}

/// A byte-at-a-time keystroke stream.
pub trait KeySource {
    /// Switch to raw, unechoed, unbuffered input.
    fn enter_raw(&mut self) -> Result<()>;

    /// Put the original input discipline back and drop pending input.
    fn restore(&mut self) -> Result<()>;

    /// Next byte, or `None` once `deadline` passes without one.
    fn read_byte(&mut self, deadline: &Deadline) -> Result<Option<u8>>;
}

impl<K: KeySource + ?Sized> KeySource for &mut K {
    fn enter_raw(&mut self) -> Result<()> {
        (**self).enter_raw()
    }

    fn restore(&mut self) -> Result<()> {
        (**self).restore()
    }

    fn read_byte(&mut self, deadline: &Deadline) -> Result<Option<u8>> {
        (**self).read_byte(deadline)
    }
}

/// Raw mode for as long as the session lives.
pub struct RawSession<'k, K: KeySource + ?Sized> {
    keys: &'k mut K,
}

impl<'k, K: KeySource + ?Sized> RawSession<'k, K> {
    pub fn begin(keys: &'k mut K) -> Result<Self> {
        keys.enter_raw()?;
        Ok(Self { keys })
    }
}

impl<K: KeySource + ?Sized> Deref for RawSession<'_, K> {
    type Target = K;

    fn deref(&self) -> &K {
        self.keys
    }
}

impl<K: KeySource + ?Sized> DerefMut for RawSession<'_, K> {
    fn deref_mut(&mut self) -> &mut K {
        self.keys
    }
}

impl<K: KeySource + ?Sized> Drop for RawSession<'_, K> {
    fn drop(&mut self) {
        if let Err(err) = self.keys.restore() {
            eprintln!("[BTM-INPUT] terminal restore failed: {err}");
        }
    }
}

/// Wait for any keystroke. Used by the boot-time setup gate.
pub fn wait_for_key<K: KeySource + ?Sized>(
    keys: &mut K,
    deadline: &Deadline,
) -> Result<InputOutcome<u8>> {
    let mut session = RawSession::begin(keys)?;
    Ok(match session.read_byte(deadline)? {
        Some(CTRL_C) => InputOutcome::Cancelled,
        Some(byte) => InputOutcome::Committed(byte),
        None => InputOutcome::TimedOut,
    })
}

/// Read the bytes trailing an ESC, at most `n`, each within
/// [`ESCAPE_FOLLOW_UP`]. Fewer than `n` means the sequence was cut short.
pub(crate) fn read_escape_tail<K: KeySource + ?Sized>(
    keys: &mut K,
    deadline: &Deadline,
    n: usize,
) -> Result<Vec<u8>> {
    let mut tail = Vec::with_capacity(n);
    while tail.len() < n {
        match keys.read_byte(&deadline.capped(ESCAPE_FOLLOW_UP))? {
            Some(byte) => tail.push(byte),
            None => break,
        }
    }
    Ok(tail)
}

// ──────────────────── scripted keys ────────────────────

/// One step of a scripted key stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedKey {
    Byte(u8),
    /// One wait that ends without input, as if its deadline passed.
    Stall,
}

/// Replays a fixed key script. An exhausted script behaves like a silent
/// keyboard: every wait runs out.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    script: VecDeque<ScriptedKey>,
    raw: bool,
    raw_entries: usize,
    restores: usize,
}

impl ScriptedKeys {
    pub fn new(script: impl IntoIterator<Item = ScriptedKey>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Script that types `text` byte by byte.
    pub fn typing(text: &str) -> Self {
        Self::new(text.bytes().map(ScriptedKey::Byte))
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.script
            .extend(bytes.iter().copied().map(ScriptedKey::Byte));
    }

    pub fn push_text(&mut self, text: &str) {
        self.push_bytes(text.as_bytes());
    }

    pub fn push_stall(&mut self) {
        self.script.push_back(ScriptedKey::Stall);
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub const fn is_raw(&self) -> bool {
        self.raw
    }

    pub const fn raw_entries(&self) -> usize {
        self.raw_entries
    }

    pub const fn restores(&self) -> usize {
        self.restores
    }
}

impl KeySource for ScriptedKeys {
    fn enter_raw(&mut self) -> Result<()> {
        self.raw = true;
        self.raw_entries += 1;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        self.raw = false;
        self.restores += 1;
        Ok(())
    }

    fn read_byte(&mut self, _deadline: &Deadline) -> Result<Option<u8>> {
        Ok(match self.script.pop_front() {
            Some(ScriptedKey::Byte(byte)) => Some(byte),
            Some(ScriptedKey::Stall) | None => None,
        })
    }
}
