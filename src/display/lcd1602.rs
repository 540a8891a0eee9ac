//! 16x2 character LCD over I2C (AiP31068 controller, HD44780 command set).
//!
//! Every transfer is a two-byte write to the controller address: a control
//! byte (`0x80` command, `0x40` data) followed by the payload.

#![allow(missing_docs)]

use std::path::Path;
use std::thread;
use std::time::Duration;

use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;

use crate::core::errors::{BtmError, Result};
use crate::display::Display;
use crate::display::layout::fit;

const CONTROL_COMMAND: u8 = 0x80;
const CONTROL_DATA: u8 = 0x40;

const CLEAR_DISPLAY: u8 = 0x01;
/// Entry mode: increment, no shift.
const ENTRY_MODE: u8 = 0x06;
/// Display on, cursor off, blink off.
const DISPLAY_ON: u8 = 0x0C;
/// Function set: 4-bit bus, two lines, 5x8 font.
const FUNCTION_SET: u8 = 0x28;
const ROW0_ADDR: u8 = 0x80;
const ROW1_ADDR: u8 = 0xC0;

pub struct Lcd1602<I> {
    bus: I,
    address: u8,
    columns: usize,
}

impl Lcd1602<I2cdev> {
    /// Open the I2C character device and initialize the controller.
    pub fn open(bus_path: &Path, address: u8, columns: usize) -> Result<Self> {
        let bus = I2cdev::new(bus_path).map_err(|e| BtmError::Display {
            details: format!("open {}: {e}", bus_path.display()),
        })?;
        eprintln!(
            "[BTM-LCD] opened {} at 0x{address:02x}, {columns} columns",
            bus_path.display()
        );
        Self::new(bus, address, columns)
    }
}

impl<I: I2c> Lcd1602<I> {
    pub fn new(bus: I, address: u8, columns: usize) -> Result<Self> {
        let mut lcd = Self {
            bus,
            address,
            columns,
        };
        lcd.init()?;
        Ok(lcd)
    }

    fn init(&mut self) -> Result<()> {
        thread::sleep(Duration::from_millis(50));
        for _ in 0..3 {
            self.command(FUNCTION_SET)?;
            thread::sleep(Duration::from_millis(5));
        }
        self.command(DISPLAY_ON)?;
        self.clear()?;
        self.command(ENTRY_MODE)
    }

    fn command(&mut self, cmd: u8) -> Result<()> {
        self.transfer(CONTROL_COMMAND, cmd)
    }

    fn data(&mut self, byte: u8) -> Result<()> {
        self.transfer(CONTROL_DATA, byte)
    }

    fn transfer(&mut self, control: u8, payload: u8) -> Result<()> {
        self.bus
            .write(self.address, &[control, payload])
            .map_err(|e| BtmError::Display {
                details: format!("i2c write to 0x{:02x}: {e:?}", self.address),
            })
    }

    fn set_cursor(&mut self, col: u8, row: usize) -> Result<()> {
        let base = if row == 0 { ROW0_ADDR } else { ROW1_ADDR };
        self.command(col | base)
    }

    pub fn into_inner(self) -> I {
        self.bus
    }
}

/// Map a char to the controller's ROM; anything outside printable ASCII
/// shows as `?`.
fn rom_byte(c: char) -> u8 {
    u8::try_from(c)
        .ok()
        .filter(|b| (0x20..0x7f).contains(b))
        .unwrap_or(b'?')
}

impl<I: I2c> Display for Lcd1602<I> {
    fn columns(&self) -> usize {
        self.columns
    }

    fn write_line(&mut self, row: usize, text: &str) -> Result<()> {
        if row >= self.rows() {
            return Err(BtmError::Display {
                details: format!("row {row} out of range"),
            });
        }
        self.set_cursor(0, row)?;
        for c in fit(text, self.columns).chars() {
            self.data(rom_byte(c))?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.command(CLEAR_DISPLAY)?;
        thread::sleep(Duration::from_millis(2));
        Ok(())
    }
}
