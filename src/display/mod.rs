//! Two-row character display: device trait, layout helpers, screens and
//! backends (I2C LCD, terminal console, in-memory recorder).

#![allow(missing_docs)]

pub mod console;
pub mod layout;
#[cfg(feature = "lcd")]
pub mod lcd1602;
pub mod memory;
pub mod screens;

use crate::core::errors::Result;

pub use console::ConsoleDisplay;
#[cfg(feature = "lcd")]
pub use lcd1602::Lcd1602;
pub use memory::MemoryDisplay;

/// An exclusively owned character display.
///
/// Implementations pad or truncate every row to `columns()`.
pub trait Display {
    fn columns(&self) -> usize;

    fn rows(&self) -> usize {
        2
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    /// Write both rows as given.
    fn show(&mut self, line0: &str, line1: &str) -> Result<()> {
        self.write_line(0, line0)?;
        self.write_line(1, line1)
    }

    /// Write both rows centered.
    fn show_centered(&mut self, line0: &str, line1: &str) -> Result<()> {
        let cols = self.columns();
        self.show(&layout::center(line0, cols), &layout::center(line1, cols))
    }
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn columns(&self) -> usize {
        (**self).columns()
    }

    fn rows(&self) -> usize {
        (**self).rows()
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<()> {
        (**self).write_line(row, text)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}
