//! Main daemon loop: boot phases, setup gate, and the one-second tick.
//!
//! Phases run in order on the single control thread:
//! `Bootstrapping -> SetupGate -> Connecting -> Running -> Terminated`.
//! Every fatal path ends in [`Phase::Terminated`], which renders a short
//! reason, holds it on the display, and hands the reason back to the caller
//! for the process exit code.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use crate::core::clock::{Clock, SystemClock};
use crate::core::config::{Config, ConfigOrigin};
use crate::core::errors::{BtmError, Result};
use crate::daemon::scheduler::{Scheduler, TickReport};
use crate::daemon::signals::{SignalHandler, WatchdogHeartbeat, notify_ready, notify_stopping};
use crate::display::screens::{self, BOOT_SPLASH, HEADER, NEW_BLOCK_SPLASH};
use crate::display::{ConsoleDisplay, Display};
use crate::input::{Deadline, InputOutcome, KeySource, wait_for_key};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::platform::{ActionResult, LinuxSystem, SystemActions};
use crate::setup::{SetupExit, SetupSession};
use crate::sources::{RefreshOutcome, SourceSet};

// ──────────────────── timing ────────────────────

const TICK: Duration = Duration::from_secs(1);
const BOOT_HOLD: Duration = Duration::from_secs(2);
const STATUS_HOLD: Duration = Duration::from_secs(1);
const SPLASH_HOLD: Duration = Duration::from_secs(2);
const FATAL_HOLD: Duration = Duration::from_secs(2);
const PING_COUNT: u32 = 4;

/// Time left until the next whole wall-clock second, so slow ticks do not
/// push later ones off the second boundary.
fn until_next_tick(now: chrono::DateTime<chrono::Utc>) -> Duration {
    use chrono::Timelike;

    // Leap-second nanos run past one second; treat them as on the boundary.
    let into_second = Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    TICK.saturating_sub(into_second)
}

/// Exit code asking the service manager to start the new build.
pub const EXIT_RESTART: i32 = 75;

// ──────────────────── phases ────────────────────

/// Why the daemon stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// No address on the Wi-Fi interface after trying every saved network.
    NoNetwork,
    /// Address assigned but the ping host did not answer.
    Offline,
    /// Clock not synchronized within the bounded wait; carries the status.
    TimeSync(String),
    /// Aggregate source errors reached the ceiling.
    ApiFailures(u64),
    /// The rotation pointed outside the screen set.
    ScreenIndex,
    /// SIGTERM or SIGINT.
    Shutdown,
    /// Self-update installed new code.
    RestartRequested,
    /// Display, terminal or other device failure.
    Device(String),
}

impl FatalReason {
    /// The two rows shown before exit.
    pub fn lines(&self) -> [String; 2] {
        match self {
            Self::NoNetwork => [HEADER.to_string(), "no ip, plz setup".to_string()],
            Self::Offline => [HEADER.to_string(), "ping! offline?".to_string()],
            Self::TimeSync(status) => [HEADER.to_string(), status.clone()],
            Self::ApiFailures(n) => [format!("API failures: {n}"), "exiting".to_string()],
            Self::ScreenIndex => ["screen case err".to_string(), "exiting".to_string()],
            Self::Shutdown => [HEADER.to_string(), "stopped".to_string()],
            Self::RestartRequested => [HEADER.to_string(), "restarting".to_string()],
            Self::Device(_) => ["device error".to_string(), "exiting".to_string()],
        }
    }

    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Shutdown => 0,
            Self::RestartRequested => EXIT_RESTART,
            _ => 1,
        }
    }

    fn from_error(err: &BtmError) -> Self {
        match err {
            BtmError::ScreenIndex { .. } => Self::ScreenIndex,
            other => Self::Device(other.to_string()),
        }
    }
}

impl fmt::Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoNetwork => write!(f, "no network"),
            Self::Offline => write!(f, "network offline"),
            Self::TimeSync(status) => write!(f, "time sync failed ({status})"),
            Self::ApiFailures(n) => write!(f, "{n} API failures"),
            Self::ScreenIndex => write!(f, "screen index out of range"),
            Self::Shutdown => write!(f, "shutdown requested"),
            Self::RestartRequested => write!(f, "restart requested"),
            Self::Device(details) => write!(f, "device failure: {details}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Bootstrapping,
    SetupGate,
    Connecting,
    Running,
    Terminated(FatalReason),
}

impl Phase {
    const fn name(&self) -> &'static str {
        match self {
            Self::Bootstrapping => "bootstrapping",
            Self::SetupGate => "setup-gate",
            Self::Connecting => "connecting",
            Self::Running => "running",
            Self::Terminated(_) => "terminated",
        }
    }
}

// ──────────────────── daemon configuration ────────────────────

/// Arguments for `btcmon run`.
#[derive(Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Render to the terminal instead of the LCD.
    pub console: bool,
    /// Go straight to connecting without the keypress gate.
    pub skip_setup: bool,
    /// Systemd watchdog timeout in seconds (0 = disabled).
    pub watchdog_sec: u64,
}

/// Everything the daemon drives, assembled by the caller.
pub struct DaemonParts {
    pub config: Config,
    pub config_origin: ConfigOrigin,
    pub config_path: PathBuf,
    pub display: Box<dyn Display>,
    /// Keyboard for the setup gate; `None` skips the gate.
    pub keys: Option<Box<dyn KeySource>>,
    pub system: Arc<dyn SystemActions>,
    pub clock: Box<dyn Clock>,
    pub sources: SourceSet,
    pub signals: SignalHandler,
    pub log: JsonlWriter,
}

// ──────────────────── main daemon struct ────────────────────

pub struct MonitorDaemon {
    config: Config,
    config_origin: ConfigOrigin,
    config_path: PathBuf,
    display: Box<dyn Display>,
    keys: Option<Box<dyn KeySource>>,
    system: Arc<dyn SystemActions>,
    clock: Box<dyn Clock>,
    sources: SourceSet,
    signals: SignalHandler,
    watchdog: WatchdogHeartbeat,
    log: JsonlWriter,
    skip_setup: bool,
    phase: Phase,
}

/// Open the display the arguments ask for.
pub fn open_display(config: &Config, console: bool) -> Result<Box<dyn Display>> {
    let columns = config.device.columns;
    if console {
        return Ok(Box::new(ConsoleDisplay::new(columns)?));
    }
    #[cfg(feature = "lcd")]
    {
        let lcd = crate::display::Lcd1602::open(
            &config.device.i2c_bus,
            config.device.lcd_address,
            columns,
        )?;
        Ok(Box::new(lcd))
    }
    #[cfg(not(feature = "lcd"))]
    {
        eprintln!("[BTM-DAEMON] built without LCD support, using the console");
        Ok(Box::new(ConsoleDisplay::new(columns)?))
    }
}

/// Open the setup keyboard. A missing terminal only disables setup.
#[cfg(unix)]
pub fn open_keys(config: &Config) -> Option<Box<dyn KeySource>> {
    match crate::input::TtyKeys::open(&config.device.input_tty) {
        Ok(keys) => Some(Box::new(keys)),
        Err(e) => {
            eprintln!("[BTM-DAEMON] setup keyboard unavailable: {e}");
            None
        }
    }
}

#[cfg(not(unix))]
pub fn open_keys(_config: &Config) -> Option<Box<dyn KeySource>> {
    None
}

impl MonitorDaemon {
    /// Build the daemon against real hardware and network services.
    pub fn init(config_path: &Path, args: &DaemonArgs) -> Result<Self> {
        let (config, config_origin) = Config::load_or_create(config_path)?;
        let display = open_display(&config, args.console)?;
        let keys = if args.skip_setup {
            None
        } else {
            open_keys(&config)
        };
        let system: Arc<dyn SystemActions> = Arc::new(LinuxSystem::new(&config.device)?);
        let sources = SourceSet::live(config.device.price_cache.clone())?;
        let log = JsonlWriter::open(JsonlConfig::at(config.device.activity_log.clone()));

        let parts = DaemonParts {
            config,
            config_origin,
            config_path: config_path.to_path_buf(),
            display,
            keys,
            system,
            clock: Box::new(SystemClock),
            sources,
            signals: SignalHandler::new(),
            log,
        };
        Ok(Self::from_parts(parts, args))
    }

    pub fn from_parts(parts: DaemonParts, args: &DaemonArgs) -> Self {
        let watchdog = if args.watchdog_sec > 0 {
            WatchdogHeartbeat::new(args.watchdog_sec)
        } else {
            WatchdogHeartbeat::disabled()
        };
        Self {
            config: parts.config,
            config_origin: parts.config_origin,
            config_path: parts.config_path,
            display: parts.display,
            keys: parts.keys,
            system: parts.system,
            clock: parts.clock,
            sources: parts.sources,
            signals: parts.signals,
            watchdog,
            log: parts.log,
            skip_setup: args.skip_setup,
            phase: Phase::Bootstrapping,
        }
    }

    /// Shared signal flags, for callers that want to stop the loop.
    pub fn signals(&self) -> &SignalHandler {
        &self.signals
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every phase until the daemon terminates, and return why.
    pub fn run(&mut self) -> FatalReason {
        let config_hash = self.config.stable_hash().unwrap_or_default();
        eprintln!(
            "[BTM-DAEMON] starting v{} (config {config_hash})",
            env!("CARGO_PKG_VERSION")
        );
        self.log.write_entry(
            &LogEntry::new(EventType::DaemonStart, Severity::Info).details(format!(
                "version={} config_hash={config_hash}",
                env!("CARGO_PKG_VERSION")
            )),
        );

        loop {
            let next = match self.phase.clone() {
                Phase::Terminated(reason) => return self.terminate(reason),
                _ if self.signals.should_shutdown() => Phase::Terminated(FatalReason::Shutdown),
                Phase::Bootstrapping => self.bootstrap(),
                Phase::SetupGate => self.setup_gate(),
                Phase::Connecting => self.connect(),
                Phase::Running => self.run_ticks(),
            };
            self.enter(next);
        }
    }

    fn enter(&mut self, next: Phase) {
        eprintln!("[BTM-DAEMON] phase {} -> {}", self.phase.name(), next.name());
        self.log.write_entry(
            &LogEntry::new(EventType::PhaseChange, Severity::Info)
                .details(format!("{} -> {}", self.phase.name(), next.name())),
        );
        self.phase = next;
    }

    // ──────────────────── bootstrapping ────────────────────

    fn bootstrap(&mut self) -> Phase {
        if let Err(e) = self
            .display
            .clear()
            .and_then(|()| self.display.show_centered(BOOT_SPLASH[0], BOOT_SPLASH[1]))
        {
            return Phase::Terminated(FatalReason::from_error(&e));
        }
        self.clock.sleep(BOOT_HOLD);
        if self.config_origin == ConfigOrigin::CreatedDefaults {
            eprintln!(
                "[BTM-CONFIG] running on fresh defaults at {}",
                self.config_path.display()
            );
        }
        Phase::SetupGate
    }

    // ──────────────────── setup gate ────────────────────

    fn setup_gate(&mut self) -> Phase {
        if self.skip_setup {
            return Phase::Connecting;
        }
        let Some(keys) = self.keys.as_deref_mut() else {
            return Phase::Connecting;
        };
        if let Err(e) = self.display.show_centered(HEADER, "any key to setup") {
            return Phase::Terminated(FatalReason::from_error(&e));
        }

        let deadline = Deadline::after_secs(self.config.wait_config);
        match wait_for_key(keys, &deadline) {
            Ok(InputOutcome::Committed(_)) => {}
            Ok(InputOutcome::TimedOut | InputOutcome::Cancelled) => return Phase::Connecting,
            Err(e) => {
                eprintln!("[BTM-DAEMON] setup gate read failed, continuing: {e}");
                return Phase::Connecting;
            }
        }

        let mut session = SetupSession {
            display: self.display.as_mut(),
            keys,
            system: self.system.as_ref(),
            clock: self.clock.as_ref(),
            config: &mut self.config,
            config_path: &self.config_path,
            log: &mut self.log,
        };
        match session.run() {
            Ok(SetupExit::Finished) => Phase::Connecting,
            Ok(SetupExit::RestartRequested) => Phase::Terminated(FatalReason::RestartRequested),
            Err(e) => {
                eprintln!("[BTM-DAEMON] setup failed: {e}");
                self.log.write_entry(
                    &LogEntry::new(EventType::SetupExited, Severity::Warning).error(&e),
                );
                Phase::Connecting
            }
        }
    }

    // ──────────────────── connecting ────────────────────

    fn connect(&mut self) -> Phase {
        match self.try_connect() {
            Ok(next) => next,
            Err(e) => Phase::Terminated(FatalReason::from_error(&e)),
        }
    }

    fn try_connect(&mut self) -> Result<Phase> {
        let iface = self.config.device.wifi_interface.clone();
        self.display.show_centered(HEADER, "connecting")?;

        let ip = match self.system.ip_address(&iface) {
            Some(ip) => Some(ip),
            None => {
                let result = self.system.activate_networks();
                self.record_action("activate_networks", &result);
                self.system.ip_address(&iface)
            }
        };
        let Some(ip) = ip else {
            return Ok(Phase::Terminated(FatalReason::NoNetwork));
        };
        self.display.show_centered(&iface, &ip.to_string())?;
        self.clock.sleep(STATUS_HOLD);

        let host = self.config.device.ping_host.clone();
        let stats = self.system.ping(&host, PING_COUNT);
        eprintln!("[BTM-DAEMON] ping {host}: {}", stats.summary());
        if !stats.reachable() {
            return Ok(Phase::Terminated(FatalReason::Offline));
        }

        let zone = self.system.apply_configured_timezone(&self.config.timezone);
        self.record_action("apply_timezone", &zone);

        let wait = Duration::from_secs(self.config.device.time_sync_wait_secs);
        let sync = self.system.wait_time_sync(wait);
        self.record_action("wait_time_sync", &sync);
        self.display.show_centered(HEADER, &sync.status)?;
        self.clock.sleep(STATUS_HOLD);
        if !sync.ok {
            return Ok(Phase::Terminated(FatalReason::TimeSync(sync.status)));
        }

        self.display.show_centered(HEADER, "fetching data")?;
        let mut refreshes: Vec<(&'static str, RefreshOutcome)> =
            self.sources.refresh_chain().into_iter().collect();
        refreshes.push(self.sources.refresh_price());
        self.log_refreshes(&refreshes);
        Ok(Phase::Running)
    }

    // ──────────────────── running ────────────────────

    fn run_ticks(&mut self) -> Phase {
        let mut scheduler = match Scheduler::new(&self.config, self.clock.epoch()) {
            Ok(scheduler) => scheduler,
            Err(e) => return Phase::Terminated(FatalReason::from_error(&e)),
        };
        notify_ready("monitoring");

        loop {
            if self.signals.should_shutdown() {
                return Phase::Terminated(FatalReason::Shutdown);
            }
            if self.signals.should_reload() {
                self.reload_config(&mut scheduler);
            }
            match self.tick(&mut scheduler) {
                Ok(None) => {}
                Ok(Some(reason)) => return Phase::Terminated(reason),
                Err(e) => return Phase::Terminated(FatalReason::from_error(&e)),
            }
            let sum = scheduler.breaker().last_sum();
            self.watchdog
                .maybe_notify(&format!("running, {sum} source errors"));
            self.clock.sleep(until_next_tick(self.clock.now()));
        }
    }

    /// One pass: forced refresh if requested, due timers, render.
    fn tick(&mut self, scheduler: &mut Scheduler) -> Result<Option<FatalReason>> {
        if self.signals.should_refresh() {
            eprintln!("[BTM-DAEMON] forced refresh requested (SIGUSR1)");
            let forced = scheduler.refresh_all(&mut self.sources)?;
            if let Some(reason) = self.after_refresh(&forced)? {
                return Ok(Some(reason));
            }
        }

        let report = scheduler.tick(self.clock.epoch(), &mut self.sources)?;
        if let Some(reason) = self.after_refresh(&report)? {
            return Ok(Some(reason));
        }

        let local = self.clock.now().with_timezone(&Local);
        let [line0, line1] = screens::render(
            report.screen,
            &self.sources,
            &local,
            self.config.time_format,
            self.display.columns(),
        );
        self.display.show(&line0, &line1)?;
        Ok(None)
    }

    /// Log refresh outcomes, check the breaker, show the new-block splash.
    fn after_refresh(&mut self, report: &TickReport) -> Result<Option<FatalReason>> {
        if !report.refreshed() {
            return Ok(None);
        }
        self.log_refreshes(&report.refreshes);

        if report.tripped {
            let sum = report.error_sum.unwrap_or_default();
            eprintln!(
                "[BTM-DAEMON] {sum} source errors reached ceiling {}",
                self.config.api_failures
            );
            self.log.write_entry(
                &LogEntry::new(EventType::BreakerTrip, Severity::Critical)
                    .error_count(sum)
                    .details(format!("ceiling {}", self.config.api_failures)),
            );
            return Ok(Some(FatalReason::ApiFailures(sum)));
        }

        if report.new_block && self.config.block_splash {
            self.display.show(NEW_BLOCK_SPLASH[0], NEW_BLOCK_SPLASH[1])?;
            self.clock.sleep(SPLASH_HOLD);
        }
        Ok(None)
    }

    fn log_refreshes(&mut self, refreshes: &[(&'static str, RefreshOutcome)]) {
        for (name, outcome) in refreshes {
            if let Some((code, message)) = &outcome.failure {
                let mut entry = LogEntry::new(EventType::SourceFailure, Severity::Warning)
                    .source(*name)
                    .ok(false)
                    .details(message.clone());
                entry.error_code = Some((*code).to_string());
                self.log.write_entry(&entry);
            } else if outcome.error_delta < 0 {
                eprintln!(
                    "[BTM-SOURCE] {name} recovered after {} errors",
                    outcome.error_delta.unsigned_abs()
                );
                self.log.write_entry(
                    &LogEntry::new(EventType::SourceRecovered, Severity::Info)
                        .source(*name)
                        .ok(true)
                        .error_count(outcome.error_delta.unsigned_abs()),
                );
            }
        }
    }

    // ──────────────────── config reload ────────────────────

    fn reload_config(&mut self, scheduler: &mut Scheduler) {
        eprintln!("[BTM-DAEMON] config reload requested (SIGHUP)");
        let new_config = match Config::load(&self.config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("[BTM-DAEMON] config reload failed, keeping current: {e}");
                self.log.write_entry(
                    &LogEntry::new(EventType::ConfigReload, Severity::Warning)
                        .ok(false)
                        .error(&e),
                );
                return;
            }
        };

        let old_hash = self.config.stable_hash().unwrap_or_default();
        let new_hash = new_config.stable_hash().unwrap_or_default();
        if old_hash == new_hash {
            eprintln!("[BTM-DAEMON] config unchanged, skipping reload");
            return;
        }
        if let Err(e) = scheduler.reconfigure(&new_config, self.clock.epoch()) {
            eprintln!("[BTM-DAEMON] reloaded config rejected: {e}");
            return;
        }
        self.config = new_config;
        self.log.write_entry(
            &LogEntry::new(EventType::ConfigReload, Severity::Info)
                .ok(true)
                .details(format!("config hash: {old_hash} -> {new_hash}")),
        );
        eprintln!("[BTM-DAEMON] config reloaded");
    }

    // ──────────────────── shutdown ────────────────────

    fn record_action(&mut self, action: &str, result: &ActionResult) {
        eprintln!("[BTM-DAEMON] {action}: {}", result.status);
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

    fn terminate(&mut self, reason: FatalReason) -> FatalReason {
        let [line0, line1] = reason.lines();
        if let Err(e) = self.display.show_centered(&line0, &line1) {
            eprintln!("[BTM-DAEMON] final status render failed: {e}");
        }
        self.clock.sleep(FATAL_HOLD);

        let severity = match reason {
            FatalReason::Shutdown | FatalReason::RestartRequested => Severity::Info,
            _ => Severity::Critical,
        };
        if severity == Severity::Critical {
            self.log.write_entry(
                &LogEntry::new(EventType::Fatal, severity).details(reason.to_string()),
            );
        }
        self.log.write_entry(
            &LogEntry::new(EventType::DaemonStop, severity).details(reason.to_string()),
        );
        notify_stopping(&reason.to_string());
        eprintln!("[BTM-DAEMON] stopped: {reason}");
        reason
    }
}

// ──────────────────── tests ────────────────────
