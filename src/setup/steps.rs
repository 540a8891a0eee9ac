//! The individual setup steps.
//!
//! Show steps only read; edit steps change the device or the config. Each
//! opens with a y/N gate and reports how it ended.

#![allow(missing_docs)]

use std::time::Duration;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::core::fields::{ConfigField, FieldEdit};
use crate::input::{Deadline, InputOutcome, SelectOption};
use crate::logger::jsonl::{EventType, LogEntry, Severity};
use crate::setup::SetupSession;
use crate::setup::prompts::ANSWER_BUDGET;

/// Budget shared by every question of the Wi-Fi sub-flow.
pub const WIFI_BUDGET: Duration = Duration::from_secs(120);
/// Bound on the interactive NTP wait.
const TIME_SYNC_BUDGET: Duration = Duration::from_secs(30);
const PING_COUNT: u32 = 4;

/// Zones offered by the timezone selector after the configured one.
const COMMON_ZONES: [&str; 8] = [
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "Europe/London",
    "Europe/Berlin",
    "Asia/Tokyo",
    "UTC",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// The gate was answered no (or timed out).
    Skipped,
    /// A required answer never came.
    TimedOut,
    Cancelled,
    /// New code was installed; the process should restart.
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    ShowIp,
    Ping,
    CheckTimezone,
    ShowConfig,
    ShowVersion,
    Wifi,
    RemoteAccess,
    EditConfig,
    WriteConfig,
    SetTimezone,
    TimeSync,
    Update,
}

pub const SHOW_STEPS: [Step; 5] = [
    Step::ShowIp,
    Step::Ping,
    Step::CheckTimezone,
    Step::ShowConfig,
    Step::ShowVersion,
];

pub const EDIT_STEPS: [Step; 7] = [
    Step::Wifi,
    Step::RemoteAccess,
    Step::EditConfig,
    Step::WriteConfig,
    Step::SetTimezone,
    Step::TimeSync,
    Step::Update,
];

impl Step {
    /// Short name shown on row 0 while the step works.
    pub fn title(self, cfg: &Config) -> String {
        match self {
            Self::ShowIp => format!("{} ip", cfg.device.wifi_interface),
            Self::Ping => format!("ping {}", cfg.device.ping_host),
            Self::CheckTimezone => "check timezone".to_string(),
            Self::ShowConfig => "show config".to_string(),
            Self::ShowVersion => "show version".to_string(),
            Self::Wifi => "setup wifi".to_string(),
            Self::RemoteAccess => "toggle ssh".to_string(),
            Self::EditConfig => "edit config".to_string(),
            Self::WriteConfig => "write config".to_string(),
            Self::SetTimezone => "set os timezone".to_string(),
            Self::TimeSync => "ntp connect".to_string(),
            Self::Update => "update btc-mon".to_string(),
        }
    }

    /// The y/N gate question.
    pub fn question(self, cfg: &Config) -> String {
        match self {
            Self::ShowIp => format!("show {}?", self.title(cfg)),
            _ => format!("{}?", self.title(cfg)),
        }
    }
}

impl SetupSession<'_> {
    pub fn run_step(&mut self, step: Step) -> Result<StepOutcome> {
        let question = step.question(self.config);
        if let Some(exit) = self.gate(&question)? {
            return Ok(exit);
        }
        let title = step.title(self.config);
        match step {
            Step::ShowIp => self.show_ip(&title),
            Step::Ping => self.ping(&title),
            Step::CheckTimezone => self.check_timezone(),
            Step::ShowConfig => self.show_config(),
            Step::ShowVersion => self.show_version(),
            Step::Wifi => self.setup_wifi(&title),
            Step::RemoteAccess => self.toggle_remote_access(&title),
            Step::EditConfig => self.edit_config(),
            Step::WriteConfig => self.write_config(&title),
            Step::SetTimezone => self.set_timezone(&title),
            Step::TimeSync => self.time_sync(&title),
            Step::Update => self.update(&title),
        }
    }

    // ──────────────────── show ────────────────────

    fn show_ip(&mut self, title: &str) -> Result<StepOutcome> {
        let iface = self.config.device.wifi_interface.clone();
        match self.system.ip_address(&iface) {
            Some(ip) => self.say(title, &ip.to_string(), 5)?,
            None => self.say(title, "none set", 3)?,
        }
        Ok(StepOutcome::Done)
    }

    fn ping(&mut self, title: &str) -> Result<StepOutcome> {
        self.say(title, "pinging...", 0)?;
        let host = self.config.device.ping_host.clone();
        let stats = self.system.ping(&host, PING_COUNT);
        self.say(title, &stats.summary(), 2)?;
        Ok(StepOutcome::Done)
    }

    fn check_timezone(&mut self) -> Result<StepOutcome> {
        match self.system.os_timezone() {
            Ok(zone) => self.say_scrolled("os tz:", &zone, 3)?,
            Err(err) => {
                eprintln!("[BTM-SETUP] os timezone: {err}");
                self.say("os tz:", "(!) unknown", 3)?;
            }
        }
        let configured = self.config.timezone.clone();
        self.say_scrolled("config tz:", &configured, 3)?;
        self.say("auto tz:", "checking...", 1)?;
        match self.system.lookup_timezone() {
            Ok(zone) => self.say_scrolled("auto tz:", &zone, 3)?,
            Err(err) => {
                eprintln!("[BTM-SETUP] timezone lookup: {err}");
                self.say("auto tz:", "(!) ip-api.com", 4)?;
            }
        }
        Ok(StepOutcome::Done)
    }

    fn show_config(&mut self) -> Result<StepOutcome> {
        for field in ConfigField::ALL {
            let value = field.current(self.config);
            self.say_scrolled(field.name(), &value, 3)?;
        }
        Ok(StepOutcome::Done)
    }

    fn show_version(&mut self) -> Result<StepOutcome> {
        self.say("version", env!("CARGO_PKG_VERSION"), 2)?;
        self.say("license", env!("CARGO_PKG_LICENSE"), 2)?;
        let source = self.config.device.repo_url.clone();
        self.say_scrolled("source", &source, 2)?;
        Ok(StepOutcome::Done)
    }

    // ──────────────────── edit ────────────────────

    /// SSID, passphrase, hidden flag and country code under one deadline,
    /// then apply country and credentials.
    fn setup_wifi(&mut self, title: &str) -> Result<StepOutcome> {
        let deadline = Deadline::after(WIFI_BUDGET);

        let ssid = match self.required_answer("enter ssid:", &deadline)? {
            InputOutcome::Committed(ssid) => ssid,
            InputOutcome::TimedOut => return self.wifi_abandoned(&deadline),
            InputOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
        };
        let psk = match self.required_answer("psk:", &deadline)? {
            InputOutcome::Committed(psk) => psk,
            InputOutcome::TimedOut => return self.wifi_abandoned(&deadline),
            InputOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
        };
        let hidden = match self.confirm_by("hidden ssid?", &deadline)? {
            InputOutcome::Committed(hidden) => hidden,
            InputOutcome::TimedOut => false,
            InputOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
        };
        let country = match self.required_answer("country code?", &deadline)? {
            InputOutcome::Committed(country) => country,
            InputOutcome::TimedOut => return self.wifi_abandoned(&deadline),
            InputOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
        };
        let country = country.to_ascii_uppercase();

        self.say("country code", &format!("setting {country}..."), 0)?;
        let result = self.system.set_wifi_country(&country);
        self.record_action("set_wifi_country", &result);
        let shown = if result.ok {
            format!("set to {country}")
        } else {
            result.status.clone()
        };
        self.say("country code", &shown, 1)?;

        self.say(title, "connecting...", 0)?;
        let result = self.system.apply_wifi_credentials(&ssid, &psk, hidden);
        self.record_action("apply_wifi_credentials", &result);
        self.say(title, &result.status, 2)?;
        Ok(StepOutcome::Done)
    }

    /// Non-empty answer within `deadline`. Blank input counts as no answer.
    fn required_answer(
        &mut self,
        prompt: &str,
        deadline: &Deadline,
    ) -> Result<InputOutcome<String>> {
        Ok(match self.ask(prompt, "", deadline)? {
            InputOutcome::Committed(answer) if answer.is_empty() => InputOutcome::TimedOut,
            other => other,
        })
    }

    fn wifi_abandoned(&mut self, deadline: &Deadline) -> Result<StepOutcome> {
        let why = if deadline.expired() {
            "timed out"
        } else {
            "no input"
        };
        self.say(why, "wifi unchanged", 3)?;
        Ok(StepOutcome::TimedOut)
    }

    fn toggle_remote_access(&mut self, title: &str) -> Result<StepOutcome> {
        let options = [
            SelectOption::new(true, "ssh on", "up/down, enter"),
            SelectOption::new(false, "ssh off", "up/down, enter"),
        ];
        let enable = match self.choose(&options, 0)? {
            InputOutcome::Committed(enable) => enable,
            InputOutcome::TimedOut => return Ok(StepOutcome::TimedOut),
            InputOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
        };
        self.say(title, "setting...", 0)?;
        let result = self.system.toggle_remote_access(enable);
        self.record_action("toggle_remote_access", &result);
        self.say(title, &result.status, 2)?;
        Ok(StepOutcome::Done)
    }

    /// Walk the editable fields on a working copy. Each prompt starts from the
    /// current value; an erased or timed-out answer keeps it. Ctrl-C discards
    /// every edit of this pass.
    fn edit_config(&mut self) -> Result<StepOutcome> {
        self.say("blank answers", "keep the value", 2)?;
        let mut working = self.config.clone();
        for field in ConfigField::ALL {
            let prompt = format!("{}:", field.name());
            let current = field.current(&working);
            let deadline = Deadline::after(ANSWER_BUDGET);
            let answer = match self.ask_prefilled(&prompt, &current, &deadline)? {
                InputOutcome::Committed(answer) => answer,
                InputOutcome::TimedOut => continue,
                InputOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
            };
            match field.apply(&mut working, &answer) {
                FieldEdit::Updated { previous } => {
                    eprintln!(
                        "[BTM-SETUP] {} changed: {previous} -> {}",
                        field.name(),
                        field.current(&working)
                    );
                }
                FieldEdit::Unchanged => {}
                FieldEdit::Invalid(reason) => {
                    eprintln!("[BTM-SETUP] {}: {reason}", field.name());
                    self.say(field.name(), "invalid, kept", 2)?;
                }
            }
        }
        *self.config = working;
        Ok(StepOutcome::Done)
    }

    /// Save, then reload from disk so the running record is what the file
    /// holds.
    fn write_config(&mut self, title: &str) -> Result<StepOutcome> {
        if let Err(err) = self.config.save(self.config_path) {
            eprintln!("[BTM-SETUP] config save failed: {err}");
            self.log.write_entry(
                &LogEntry::new(EventType::ConfigSaved, Severity::Warning)
                    .ok(false)
                    .error(&err),
            );
            self.say(title, "save failed", 2)?;
            return Ok(StepOutcome::Done);
        }
        self.log.write_entry(
            &LogEntry::new(EventType::ConfigSaved, Severity::Info)
                .ok(true)
                .details(self.config_path.display().to_string()),
        );
        self.say(title, "save successful", 1)?;

        self.say(title, "reload config...", 0)?;
        match Config::load(self.config_path) {
            Ok(reloaded) => {
                *self.config = reloaded;
                self.say(title, "reloaded", 1)?;
            }
            Err(err) => {
                eprintln!("[BTM-SETUP] config reload failed: {err}");
                self.say(title, "reload failed", 2)?;
            }
        }
        Ok(StepOutcome::Done)
    }

    fn set_timezone(&mut self, title: &str) -> Result<StepOutcome> {
        let configured = self.config.timezone.clone();
        let mut zones = vec![configured.clone()];
        for zone in std::iter::once("auto").chain(COMMON_ZONES) {
            if !zones.iter().any(|z| z == zone) {
                zones.push(zone.to_string());
            }
        }
        let options: Vec<SelectOption<String>> = zones
            .into_iter()
            .enumerate()
            .map(|(i, zone)| {
                let detail = if i == 0 { "(config)" } else { "" };
                SelectOption::new(zone.clone(), zone, detail)
            })
            .collect();

        let zone = match self.choose(&options, 0)? {
            InputOutcome::Committed(zone) => zone,
            InputOutcome::TimedOut => return Ok(StepOutcome::TimedOut),
            InputOutcome::Cancelled => return Ok(StepOutcome::Cancelled),
        };
        self.say(title, "setting...", 0)?;
        let result = self.system.apply_configured_timezone(&zone);
        self.record_action("apply_timezone", &result);
        self.say_scrolled(title, &result.status, 2)?;
        Ok(StepOutcome::Done)
    }

    fn time_sync(&mut self, title: &str) -> Result<StepOutcome> {
        self.say(title, "connecting...", 0)?;
        let result = self.system.wait_time_sync(TIME_SYNC_BUDGET);
        self.record_action("wait_time_sync", &result);
        self.say(title, &result.status, 2)?;
        Ok(StepOutcome::Done)
    }

    fn update(&mut self, title: &str) -> Result<StepOutcome> {
        self.say(title, "updating...", 0)?;
        let channel = self.config.vers_loc.clone();
        let result = self.system.self_update(&channel);
        self.record_action("self_update", &result);
        self.say(title, &result.status, 2)?;
        if result.ok {
            self.say(title, "restarting...", 1)?;
            Ok(StepOutcome::Restart)
        } else {
            Ok(StepOutcome::Done)
        }
    }
}
