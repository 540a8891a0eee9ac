//! Interactive setup flow, driven from a keyboard while the daemon is
//! paused at its setup gate.
//!
//! The outer loop offers a `show / edit / exit` menu and then asks whether to
//! go around again. Each menu entry runs a fixed sequence of steps; every
//! step opens with a y/N question that defaults to no. Ctrl-C abandons the
//! current step and returns to the menu.

#![allow(missing_docs)]

pub mod prompts;
pub mod steps;

use std::path::Path;

use crate::core::clock::Clock;
use crate::core::config::Config;
use crate::core::errors::Result;
use crate::display::Display;
use crate::display::screens::HEADER;
use crate::input::{InputOutcome, KeySource, SelectOption};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use crate::platform::SystemActions;

pub use steps::{EDIT_STEPS, SHOW_STEPS, Step, StepOutcome};

/// Everything a setup session drives. Borrowed from the daemon for the
/// duration of the session.
pub struct SetupSession<'a> {
    pub display: &'a mut dyn Display,
    pub keys: &'a mut dyn KeySource,
    pub system: &'a dyn SystemActions,
    pub clock: &'a dyn Clock,
    pub config: &'a mut Config,
    pub config_path: &'a Path,
    pub log: &'a mut JsonlWriter,
}

/// How a setup session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupExit {
    Finished,
    /// Self-update installed new code; the process should restart.
    RestartRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Show,
    Edit,
    Exit,
}

fn menu() -> Vec<SelectOption<MenuChoice>> {
    vec![
        SelectOption::new(MenuChoice::Show, "show setup", "up/down, enter"),
        SelectOption::new(MenuChoice::Edit, "edit setup", "up/down, enter"),
        SelectOption::new(MenuChoice::Exit, "exit setup", "up/down, enter"),
    ]
}

impl SetupSession<'_> {
    /// Run the menu loop until the operator leaves or a restart is needed.
    pub fn run(&mut self) -> Result<SetupExit> {
        self.log
            .write_entry(&LogEntry::new(EventType::SetupEntered, Severity::Info));
        eprintln!("[BTM-SETUP] entered setup");
        let exit = self.menu_loop()?;
        self.log.write_entry(
            &LogEntry::new(EventType::SetupExited, Severity::Info).details(format!("{exit:?}")),
        );
        eprintln!("[BTM-SETUP] left setup ({exit:?})");
        Ok(exit)
    }

    fn menu_loop(&mut self) -> Result<SetupExit> {
        let options = menu();
        loop {
            let steps: &[Step] = match self.choose(&options, 0)? {
                InputOutcome::Committed(MenuChoice::Show) => &SHOW_STEPS,
                InputOutcome::Committed(MenuChoice::Edit) => &EDIT_STEPS,
                InputOutcome::Committed(MenuChoice::Exit)
                | InputOutcome::TimedOut
                | InputOutcome::Cancelled => break,
            };

            match self.run_steps(steps)? {
                StepOutcome::Restart => return Ok(SetupExit::RestartRequested),
                StepOutcome::Cancelled => continue,
                StepOutcome::Done | StepOutcome::Skipped | StepOutcome::TimedOut => {}
            }

            match self.confirm("re-enter setup?")? {
                InputOutcome::Committed(true) => {}
                _ => break,
            }
        }
        self.say_centered(HEADER, "exiting setup", 1)?;
        Ok(SetupExit::Finished)
    }

    /// Run `steps` in order. Stops early on cancellation or a restart request
    /// and returns that outcome; otherwise returns the last step's outcome.
    pub fn run_steps(&mut self, steps: &[Step]) -> Result<StepOutcome> {
        let mut last = StepOutcome::Skipped;
        for step in steps {
            last = self.run_step(*step)?;
            match last {
                StepOutcome::Cancelled => {
                    eprintln!("[BTM-SETUP] {step:?} cancelled");
                    let title = step.title(self.config);
                    self.say(&title, "cancelled", 1)?;
                    return Ok(last);
                }
                StepOutcome::Restart => return Ok(last),
                StepOutcome::Done | StepOutcome::Skipped | StepOutcome::TimedOut => {}
            }
        }
        Ok(last)
    }
}
