//! Raw input engine through the public API: line editing, option selection,
//! escape decoding, deadlines and terminal restoration.

use std::time::Duration;

use proptest::prelude::*;

use btc_monitor::core::errors::{BtmError, Result};
use btc_monitor::display::{Display, MemoryDisplay};
use btc_monitor::input::{
    CTRL_C, DELETE, Deadline, InputOutcome, ScriptedKey, ScriptedKeys, SelectOption, read_line,
    select, wait_for_key,
};

const UP: &[u8] = b"\x1b[A";
const DOWN: &[u8] = b"\x1b[B";

fn generous() -> Deadline {
    Deadline::after_secs(30)
}

fn edit(keys: &mut ScriptedKeys, initial: &str) -> InputOutcome<String> {
    let mut display = MemoryDisplay::new(16);
    read_line(&mut display, keys, "Name?", initial, &generous()).expect("read_line")
}

fn letters() -> Vec<SelectOption<char>> {
    vec![
        SelectOption::new('A', "alpha", "first"),
        SelectOption::new('B', "bravo", "second"),
        SelectOption::new('C', "charlie", "third"),
    ]
}

fn choose(keys: &mut ScriptedKeys, start: usize) -> InputOutcome<char> {
    let mut display = MemoryDisplay::new(16);
    select(&mut display, keys, &letters(), start, &generous()).expect("select")
}

fn assert_restored(keys: &ScriptedKeys) {
    assert!(!keys.is_raw(), "terminal left in raw mode");
    assert_eq!(keys.raw_entries(), keys.restores());
}

/// Accepts the first `ok_writes` row writes, then fails every one.
struct BrokenDisplay {
    ok_writes: usize,
}

impl Display for BrokenDisplay {
    fn columns(&self) -> usize {
        16
    }

    fn write_line(&mut self, _row: usize, _text: &str) -> Result<()> {
        if self.ok_writes == 0 {
            return Err(BtmError::Runtime {
                details: "display unplugged".to_string(),
            });
        }
        self.ok_writes -= 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════
// Section 1: line editor
// ══════════════════════════════════════════════════════════════════

#[test]
fn backspace_removes_the_last_character() {
    let mut keys = ScriptedKeys::typing("abc");
    keys.push_bytes(&[DELETE]);
    keys.push_text("d\r");
    assert_eq!(edit(&mut keys, ""), InputOutcome::Committed("ad".to_string()));
    assert_restored(&keys);
}

#[test]
fn backspace_on_empty_buffer_is_harmless() {
    let mut keys = ScriptedKeys::new([ScriptedKey::Byte(DELETE), ScriptedKey::Byte(DELETE)]);
    keys.push_text("x\r");
    assert_eq!(edit(&mut keys, ""), InputOutcome::Committed("x".to_string()));
}

#[test]
fn prefilled_value_commits_unchanged_on_enter() {
    let mut keys = ScriptedKeys::typing("\r");
    assert_eq!(
        edit(&mut keys, "Europe/Berlin"),
        InputOutcome::Committed("Europe/Berlin".to_string())
    );
}

#[test]
fn expired_deadline_times_out() {
    let mut display = MemoryDisplay::new(16);
    let mut keys = ScriptedKeys::default();
    let outcome = read_line(
        &mut display,
        &mut keys,
        "Wait?",
        "60",
        &Deadline::after(Duration::ZERO),
    )
    .expect("read_line");
    assert_eq!(outcome, InputOutcome::TimedOut);
    assert_restored(&keys);
}

#[test]
fn silence_mid_edit_times_out_without_committing() {
    let mut keys = ScriptedKeys::typing("12");
    keys.push_stall();
    keys.push_text("\r");
    assert_eq!(edit(&mut keys, ""), InputOutcome::TimedOut);
}

#[test]
fn ctrl_c_cancels() {
    let mut keys = ScriptedKeys::typing("partial");
    keys.push_bytes(&[CTRL_C]);
    assert_eq!(edit(&mut keys, ""), InputOutcome::Cancelled);
    assert_restored(&keys);
}

#[test]
fn arrow_keys_do_not_leak_into_the_text() {
    let mut keys = ScriptedKeys::typing("a");
    keys.push_bytes(UP);
    keys.push_bytes(b"\x1bOB");
    keys.push_bytes(b"\x1b[1;5C");
    keys.push_text("b\r");
    assert_eq!(edit(&mut keys, ""), InputOutcome::Committed("ab".to_string()));
}

#[test]
fn truncated_escape_is_dropped() {
    let mut keys = ScriptedKeys::typing("a");
    keys.push_bytes(&[0x1b]);
    keys.push_stall();
    keys.push_text("b\r");
    assert_eq!(edit(&mut keys, ""), InputOutcome::Committed("ab".to_string()));
}

#[test]
fn long_text_shows_its_tail() {
    let mut display = MemoryDisplay::new(16);
    let mut keys = ScriptedKeys::typing("0123456789abcdefXYZ\r");
    let outcome = read_line(&mut display, &mut keys, "Pass?", "", &generous()).expect("read_line");
    assert_eq!(
        outcome,
        InputOutcome::Committed("0123456789abcdefXYZ".to_string())
    );
    let [prompt, visible] = display.trimmed();
    assert_eq!(prompt, "Pass?");
    assert_eq!(visible, "3456789abcdefXYZ");
}

#[test]
fn display_failure_still_restores_terminal() {
    let mut display = BrokenDisplay { ok_writes: 2 };
    let mut keys = ScriptedKeys::typing("abc\r");
    let err = read_line(&mut display, &mut keys, "Name?", "", &generous()).unwrap_err();
    assert!(err.to_string().contains("display unplugged"));
    assert_restored(&keys);
}

// ══════════════════════════════════════════════════════════════════
// Section 2: selector
// ══════════════════════════════════════════════════════════════════

#[test]
fn selector_down_then_enter() {
    let mut keys = ScriptedKeys::default();
    keys.push_bytes(DOWN);
    keys.push_text("\r");
    assert_eq!(choose(&mut keys, 0), InputOutcome::Committed('B'));
    assert_restored(&keys);
}

#[test]
fn selector_up_wraps_to_last() {
    let mut keys = ScriptedKeys::default();
    keys.push_bytes(UP);
    keys.push_text("\r");
    assert_eq!(choose(&mut keys, 0), InputOutcome::Committed('C'));
}

#[test]
fn selector_down_wraps_to_first() {
    let mut keys = ScriptedKeys::default();
    keys.push_bytes(DOWN);
    keys.push_text("\r");
    assert_eq!(choose(&mut keys, 2), InputOutcome::Committed('A'));
}

#[test]
fn selector_ignores_printable_and_unknown_escapes() {
    let mut keys = ScriptedKeys::typing("q ");
    keys.push_bytes(b"\x1b[Z");
    keys.push_text("\r");
    assert_eq!(choose(&mut keys, 1), InputOutcome::Committed('B'));
}

#[test]
fn selector_truncated_escape_keeps_position() {
    let mut keys = ScriptedKeys::new([ScriptedKey::Byte(0x1b), ScriptedKey::Byte(b'[')]);
    keys.push_stall();
    keys.push_text("\r");
    assert_eq!(choose(&mut keys, 0), InputOutcome::Committed('A'));
}

#[test]
fn selector_timeout_and_cancel() {
    assert_eq!(choose(&mut ScriptedKeys::default(), 0), InputOutcome::TimedOut);
    let mut keys = ScriptedKeys::new([ScriptedKey::Byte(CTRL_C)]);
    assert_eq!(choose(&mut keys, 0), InputOutcome::Cancelled);
    assert_restored(&keys);
}

#[test]
fn selector_shows_the_current_option_centered() {
    let mut display = MemoryDisplay::new(16);
    let mut keys = ScriptedKeys::default();
    keys.push_bytes(DOWN);
    keys.push_text("\r");
    select(&mut display, &mut keys, &letters(), 0, &generous()).expect("select");
    assert!(display.ever_showed("alpha"));
    let [label, detail] = display.trimmed();
    assert_eq!(label.trim_start(), "bravo");
    assert_eq!(detail.trim_start(), "second");
}

#[test]
fn selector_rejects_empty_options() {
    let mut display = MemoryDisplay::new(16);
    let mut keys = ScriptedKeys::typing("\r");
    let options: Vec<SelectOption<u8>> = Vec::new();
    assert!(select(&mut display, &mut keys, &options, 0, &generous()).is_err());
}

// ══════════════════════════════════════════════════════════════════
// Section 3: key gate
// ══════════════════════════════════════════════════════════════════

#[test]
fn any_key_opens_the_gate() {
    let mut keys = ScriptedKeys::typing("x");
    assert_eq!(
        wait_for_key(&mut keys, &Deadline::after_secs(5)).expect("wait"),
        InputOutcome::Committed(b'x')
    );
    assert_restored(&keys);
}

#[test]
fn gate_times_out_on_silence() {
    let mut keys = ScriptedKeys::default();
    assert_eq!(
        wait_for_key(&mut keys, &Deadline::after(Duration::ZERO)).expect("wait"),
        InputOutcome::TimedOut
    );
    assert_restored(&keys);
}

// ══════════════════════════════════════════════════════════════════
// Section 4: properties
// ══════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn printable_ascii_commits_verbatim(text in "[ -~]{0,40}") {
        let mut keys = ScriptedKeys::typing(&text);
        keys.push_text("\r");
        prop_assert_eq!(edit(&mut keys, ""), InputOutcome::Committed(text));
        prop_assert!(!keys.is_raw());
    }

    #[test]
    fn any_byte_stream_ends_restored(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut keys = ScriptedKeys::default();
        keys.push_bytes(&bytes);
        let mut display = MemoryDisplay::new(16);
        let outcome = read_line(&mut display, &mut keys, "?", "", &generous());
        prop_assert!(outcome.is_ok());
        prop_assert!(!keys.is_raw());
        prop_assert_eq!(keys.restores(), 1);
    }

    #[test]
    fn selector_lands_on_net_movement(
        start in 0usize..3,
        downs in 0usize..10,
        ups in 0usize..10,
    ) {
        let mut keys = ScriptedKeys::default();
        for _ in 0..downs {
            keys.push_bytes(DOWN);
        }
        for _ in 0..ups {
            keys.push_bytes(UP);
        }
        keys.push_text("\r");
        // One step up is two steps down on a ring of three.
        let expected = letters()[(start + downs + 2 * ups) % 3].key;
        prop_assert_eq!(choose(&mut keys, start), InputOutcome::Committed(expected));
    }
}
