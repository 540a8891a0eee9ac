//! Prompt and message helpers shared by the setup steps.

#![allow(missing_docs)]

use std::time::Duration;

use crate::core::errors::Result;
use crate::display::layout::scroll_frames;
use crate::input::{Deadline, InputOutcome, SelectOption, read_line, select};
use crate::logger::jsonl::{EventType, LogEntry, Severity};
use crate::platform::ActionResult;
use crate::setup::SetupSession;
use crate::setup::steps::StepOutcome;

/// Budget for each independent question.
pub const ANSWER_BUDGET: Duration = Duration::from_secs(30);
/// Prefill for yes/no questions; stripped from the answer.
pub const YES_NO: &str = "y/N: ";
/// Time each frame of a scrolling value stays up.
const SCROLL_STEP: Duration = Duration::from_millis(300);

/// `y` or `yes`, any case.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn strip_clue(answer: &str, clue: &str) -> String {
    answer
        .strip_prefix(clue)
        .unwrap_or(answer)
        .trim()
        .to_string()
}

impl SetupSession<'_> {
    /// Line prompt prefilled with `clue`. The clue is stripped from the
    /// committed answer, which is also trimmed.
    pub fn ask(
        &mut self,
        question: &str,
        clue: &str,
        deadline: &Deadline,
    ) -> Result<InputOutcome<String>> {
        let outcome = read_line(&mut *self.display, &mut *self.keys, question, clue, deadline)?;
        Ok(outcome.map(|answer| strip_clue(&answer, clue)))
    }

    /// Line prompt prefilled with `value`, which the operator edits in place.
    /// The whole committed buffer is the answer, trimmed.
    pub fn ask_prefilled(
        &mut self,
        question: &str,
        value: &str,
        deadline: &Deadline,
    ) -> Result<InputOutcome<String>> {
        let outcome = read_line(&mut *self.display, &mut *self.keys, question, value, deadline)?;
        Ok(outcome.map(|answer| answer.trim().to_string()))
    }

    /// y/N question with a fresh budget. Timing out answers no.
    pub fn confirm(&mut self, question: &str) -> Result<InputOutcome<bool>> {
        self.confirm_by(question, &Deadline::after(ANSWER_BUDGET))
    }

    /// y/N question against a caller's deadline.
    pub fn confirm_by(&mut self, question: &str, deadline: &Deadline) -> Result<InputOutcome<bool>> {
        Ok(match self.ask(question, YES_NO, deadline)? {
            InputOutcome::Committed(answer) => InputOutcome::Committed(is_yes(&answer)),
            InputOutcome::TimedOut => InputOutcome::Committed(false),
            InputOutcome::Cancelled => InputOutcome::Cancelled,
        })
    }

    /// Opening question of a step. `None` means go ahead; otherwise the
    /// step ends with the returned outcome.
    pub fn gate(&mut self, question: &str) -> Result<Option<StepOutcome>> {
        Ok(match self.confirm(question)? {
            InputOutcome::Committed(true) => None,
            InputOutcome::Committed(false) | InputOutcome::TimedOut => Some(StepOutcome::Skipped),
            InputOutcome::Cancelled => Some(StepOutcome::Cancelled),
        })
    }

    /// Selector with a fresh budget.
    pub fn choose<T: Clone>(
        &mut self,
        options: &[SelectOption<T>],
        start: usize,
    ) -> Result<InputOutcome<T>> {
        select(
            &mut *self.display,
            &mut *self.keys,
            options,
            start,
            &Deadline::after(ANSWER_BUDGET),
        )
    }

    /// Show two rows and hold them for `hold_secs`.
    pub fn say(&mut self, line0: &str, line1: &str, hold_secs: u64) -> Result<()> {
        self.display.show(line0, line1)?;
        self.hold(hold_secs);
        Ok(())
    }

    pub fn say_centered(&mut self, line0: &str, line1: &str, hold_secs: u64) -> Result<()> {
        self.display.show_centered(line0, line1)?;
        self.hold(hold_secs);
        Ok(())
    }

    /// `title` over `value`; a value wider than the row scrolls through
    /// before the hold.
    pub fn say_scrolled(&mut self, title: &str, value: &str, hold_secs: u64) -> Result<()> {
        let frames = scroll_frames(value, self.display.columns());
        let scrolling = frames.len() > 1;
        for frame in &frames {
            self.display.show(title, frame)?;
            if scrolling {
                self.clock.sleep(SCROLL_STEP);
            }
        }
        self.hold(hold_secs);
        Ok(())
    }

    fn hold(&self, secs: u64) {
        if secs > 0 {
            self.clock.sleep(Duration::from_secs(secs));
        }
    }

    /// Log a system action to stderr and the activity log.
    pub fn record_action(&mut self, action: &str, result: &ActionResult) {
        eprintln!(
            "[BTM-SETUP] {action}: {} ({})",
            result.status,
            if result.ok { "ok" } else { "failed" }
        );
        let severity = if result.ok {
            Severity::Info
        } else {
            Severity::Warning
        };
        self.log.write_entry(
            &LogEntry::new(EventType::SystemAction, severity)
                .source(action)
                .ok(result.ok)
                .details(result.status.clone()),
        );
    }
}
