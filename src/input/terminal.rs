//! Keystrokes from a terminal device in raw mode (termios + poll).
//!
//! The original termios settings are also parked in a process-wide slot so a
//! panic hook can put the terminal back before the panic message prints.

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::AsFd;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::termios::{self, FlushArg, SetArg, Termios};
use parking_lot::Mutex;

use crate::core::errors::{BtmError, Result};
use crate::input::{Deadline, KeySource};

/// Terminal currently in raw mode and its original settings.
static SAVED: Mutex<Option<(PathBuf, Termios)>> = Mutex::new(None);
static PANIC_HOOK: Once = Once::new();

fn install_panic_restore() {
    PANIC_HOOK.call_once(|| {
        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_saved();
            prev(info);
        }));
    });
}

fn restore_saved() {
    // try_lock: the panic may have started while the slot was held.
    let Some(mut slot) = SAVED.try_lock() else {
        return;
    };
    if let Some((path, original)) = slot.take()
        && let Ok(tty) = OpenOptions::new().read(true).write(true).open(&path)
    {
        let _ = termios::tcsetattr(&tty, SetArg::TCSADRAIN, &original);
    }
}

fn term_err(op: &'static str) -> impl Fn(Errno) -> BtmError {
    move |errno| BtmError::Terminal {
        details: format!("{op}: {errno}"),
    }
}

/// Poll timeout for `remaining`, rounded up to the next millisecond.
fn poll_millis(remaining: Duration) -> u16 {
    let mut ms = remaining.as_millis();
    if remaining.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    u16::try_from(ms).unwrap_or(u16::MAX)
}

pub struct TtyKeys {
    path: PathBuf,
    tty: File,
    original: Option<Termios>,
}

impl TtyKeys {
    pub fn open(path: &Path) -> Result<Self> {
        let tty = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| BtmError::io(path, source))?;
        Ok(Self {
            path: path.to_path_buf(),
            tty,
            original: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeySource for TtyKeys {
    fn enter_raw(&mut self) -> Result<()> {
        if self.original.is_some() {
            return Ok(());
        }
        let original = termios::tcgetattr(&self.tty).map_err(term_err("tcgetattr"))?;
        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);

        install_panic_restore();
        *SAVED.lock() = Some((self.path.clone(), original.clone()));
        termios::tcsetattr(&self.tty, SetArg::TCSADRAIN, &raw).map_err(term_err("tcsetattr"))?;
        self.original = Some(original);
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        let Some(original) = self.original.take() else {
            return Ok(());
        };
        SAVED.lock().take();
        termios::tcsetattr(&self.tty, SetArg::TCSADRAIN, &original)
            .map_err(term_err("tcsetattr"))?;
        termios::tcflush(&self.tty, FlushArg::TCIFLUSH).map_err(term_err("tcflush"))
    }

    fn read_byte(&mut self, deadline: &Deadline) -> Result<Option<u8>> {
        loop {
            let timeout = PollTimeout::from(poll_millis(deadline.remaining()));
            let mut fds = [PollFd::new(self.tty.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, timeout) {
                Ok(0) => {
                    if deadline.expired() {
                        return Ok(None);
                    }
                }
                Ok(_) => {
                    let mut byte = [0_u8; 1];
                    match (&self.tty).read(&mut byte) {
                        Ok(1) => return Ok(Some(byte[0])),
                        Ok(_) => {
                            return Err(BtmError::Terminal {
                                details: format!("{} closed", self.path.display()),
                            });
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                        Err(e) => return Err(BtmError::io(&self.path, e)),
                    }
                }
                Err(Errno::EINTR) => {}
                Err(errno) => return Err(term_err("poll")(errno)),
            }
        }
    }
}

impl Drop for TtyKeys {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            eprintln!("[BTM-INPUT] terminal restore on drop failed: {err}");
        }
    }
}
