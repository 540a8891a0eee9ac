//! In-memory display that records every frame.

#![allow(missing_docs)]

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{BtmError, Result};
use crate::display::Display;
use crate::display::layout::fit;

#[derive(Debug, Default)]
struct Glass {
    rows: [String; 2],
    /// Both rows after every write, oldest first.
    frames: Vec<[String; 2]>,
    clears: usize,
}

/// Records what a two-row display would show.
///
/// Clones share the same glass, so a test can hand one clone to the daemon
/// and inspect the other.
#[derive(Debug, Clone)]
pub struct MemoryDisplay {
    columns: usize,
    glass: Arc<Mutex<Glass>>,
}

impl MemoryDisplay {
    pub fn new(columns: usize) -> Self {
        let glass = Glass {
            rows: [fit("", columns), fit("", columns)],
            ..Glass::default()
        };
        Self {
            columns,
            glass: Arc::new(Mutex::new(glass)),
        }
    }

    /// Current contents of both rows, right-padded.
    pub fn lines(&self) -> [String; 2] {
        self.glass.lock().rows.clone()
    }

    /// Current contents with trailing padding removed.
    pub fn trimmed(&self) -> [String; 2] {
        let rows = self.lines();
        [
            rows[0].trim_end().to_string(),
            rows[1].trim_end().to_string(),
        ]
    }

    pub fn frames(&self) -> Vec<[String; 2]> {
        self.glass.lock().frames.clone()
    }

    /// Whether any frame ever showed `needle` on either row.
    pub fn ever_showed(&self, needle: &str) -> bool {
        self.glass
            .lock()
            .frames
            .iter()
            .any(|f| f[0].contains(needle) || f[1].contains(needle))
    }

    pub fn clear_count(&self) -> usize {
        self.glass.lock().clears
    }
}

impl Display for MemoryDisplay {
    fn columns(&self) -> usize {
        self.columns
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<()> {
        let mut glass = self.glass.lock();
        let Some(slot) = glass.rows.get_mut(row) else {
            return Err(BtmError::Display {
                details: format!("row {row} out of range"),
            });
        };
        *slot = fit(text, self.columns);
        let frame = glass.rows.clone();
        glass.frames.push(frame);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut glass = self.glass.lock();
        glass.rows = [fit("", self.columns), fit("", self.columns)];
        glass.clears += 1;
        Ok(())
    }
}
