//! Terminal stand-in for the LCD, for development without hardware.
//!
//! Draws a framed two-row panel in the top-left corner of stdout with
//! `crossterm`. Only the panel area is touched; log lines on stderr scroll
//! underneath it.

#![allow(missing_docs)]

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::style::{Attribute, Color, Print, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};

use crate::core::errors::{BtmError, Result};
use crate::display::Display;
use crate::display::layout::fit;

pub struct ConsoleDisplay {
    columns: usize,
    out: io::Stdout,
}

impl ConsoleDisplay {
    pub fn new(columns: usize) -> Result<Self> {
        let mut display = Self {
            columns,
            out: io::stdout(),
        };
        execute!(display.out, Clear(ClearType::All)).map_err(display_err)?;
        display.draw_frame()?;
        display.clear()?;
        Ok(display)
    }

    fn draw_frame(&mut self) -> Result<()> {
        let border = format!("+{}+", "-".repeat(self.columns));
        queue!(
            self.out,
            SetForegroundColor(Color::DarkGrey),
            MoveTo(0, 0),
            Print(&border),
            MoveTo(0, 3),
            Print(&border),
        )
        .map_err(display_err)?;
        for row in 1..=2 {
            let width = u16::try_from(self.columns + 1).unwrap_or(u16::MAX);
            queue!(
                self.out,
                MoveTo(0, row),
                Print("|"),
                MoveTo(width, row),
                Print("|"),
            )
            .map_err(display_err)?;
        }
        queue!(self.out, SetAttribute(Attribute::Reset)).map_err(display_err)?;
        self.out.flush().map_err(display_err)
    }
}

fn display_err(e: io::Error) -> BtmError {
    BtmError::Display {
        details: format!("console: {e}"),
    }
}

impl Display for ConsoleDisplay {
    fn columns(&self) -> usize {
        self.columns
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<()> {
        if row >= self.rows() {
            return Err(BtmError::Display {
                details: format!("row {row} out of range"),
            });
        }
        let y = u16::try_from(row + 1).unwrap_or(1);
        queue!(
            self.out,
            MoveTo(1, y),
            SetForegroundColor(Color::Green),
            Print(fit(text, self.columns)),
            SetAttribute(Attribute::Reset),
            MoveTo(0, 5),
        )
        .map_err(display_err)?;
        self.out.flush().map_err(display_err)
    }

    fn clear(&mut self) -> Result<()> {
        self.show("", "")
    }
}
