//! Shared fakes for integration tests: manual clock, scripted sources, a
//! daemon rig wired to in-memory collaborators, and a CLI runner.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use btc_monitor::core::clock::Clock;
use btc_monitor::core::config::{Config, ConfigOrigin};
use btc_monitor::core::errors::BtmError;
use btc_monitor::daemon::loop_main::{DaemonArgs, DaemonParts, MonitorDaemon};
use btc_monitor::daemon::signals::SignalHandler;
use btc_monitor::display::MemoryDisplay;
use btc_monitor::input::{KeySource, ScriptedKeys};
use btc_monitor::logger::jsonl::{JsonlConfig, JsonlWriter};
use btc_monitor::platform::MockSystem;
use btc_monitor::sources::{
    BlockSnapshot, DataSource, ErrorCounter, FeeSnapshot, PriceSnapshot, RefreshOutcome,
    SourceSet,
};

/// Epoch the fake clock starts at: 2025-10-14 12:00:00 UTC.
pub const T0: i64 = 1_760_443_200;

// ──────────────────── clock ────────────────────

struct ClockState {
    millis: i64,
    slept: Vec<Duration>,
    stop_at: Option<(i64, SignalHandler)>,
}

/// Manual clock: `sleep` advances time instantly. Clones share the same time.
#[derive(Clone)]
pub struct FakeClock {
    state: Arc<Mutex<ClockState>>,
}

impl FakeClock {
    pub fn at(epoch: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ClockState {
                millis: epoch * 1000,
                slept: Vec::new(),
                stop_at: None,
            })),
        }
    }

    /// Request shutdown through `signals` once time reaches `epoch`.
    pub fn stop_at(&self, epoch: i64, signals: SignalHandler) {
        self.state.lock().unwrap().stop_at = Some((epoch, signals));
    }

    pub fn elapsed_since(&self, epoch: i64) -> i64 {
        self.epoch() - epoch
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.state.lock().unwrap().slept.clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.state.lock().unwrap().millis;
        DateTime::from_timestamp_millis(millis).expect("fake clock in range")
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.millis += i64::try_from(duration.as_millis()).expect("sleep fits i64");
        state.slept.push(duration);
        if let Some((at, signals)) = &state.stop_at
            && state.millis >= at * 1000
        {
            signals.request_shutdown();
        }
    }
}

// ──────────────────── scripted sources ────────────────────

/// One scripted refresh.
#[derive(Debug, Clone)]
pub enum Step<S> {
    Ok,
    Fail,
    /// Succeed and replace the snapshot.
    Update(S),
}

/// Refresh script for one source. Once the steps run out every refresh
/// succeeds, or fails when built with [`Plan::failing`].
#[derive(Debug, Clone)]
pub struct Plan<S> {
    steps: VecDeque<Step<S>>,
    then_fail: bool,
}

impl<S> Plan<S> {
    pub fn healthy() -> Self {
        Self {
            steps: VecDeque::new(),
            then_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            steps: VecDeque::new(),
            then_fail: true,
        }
    }

    pub fn steps(steps: impl IntoIterator<Item = Step<S>>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            then_fail: false,
        }
    }

    #[must_use]
    pub fn then_fail(mut self) -> Self {
        self.then_fail = true;
        self
    }
}

impl<S> Default for Plan<S> {
    fn default() -> Self {
        Self::healthy()
    }
}

pub struct ScriptedSource<S> {
    name: &'static str,
    snapshot: S,
    errors: ErrorCounter,
    plan: Plan<S>,
    refreshes: Arc<AtomicUsize>,
}

impl<S: Default> ScriptedSource<S> {
    pub fn new(name: &'static str, plan: Plan<S>, refreshes: Arc<AtomicUsize>) -> Self {
        Self {
            name,
            snapshot: S::default(),
            errors: ErrorCounter::default(),
            plan,
            refreshes,
        }
    }
}

impl<S> DataSource for ScriptedSource<S> {
    type Snapshot = S;

    fn name(&self) -> &'static str {
        self.name
    }

    fn refresh(&mut self) -> RefreshOutcome {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let step = self.plan.steps.pop_front().unwrap_or(if self.plan.then_fail {
            Step::Fail
        } else {
            Step::Ok
        });
        let result = match step {
            Step::Ok => Ok(()),
            Step::Update(snapshot) => {
                self.snapshot = snapshot;
                Ok(())
            }
            Step::Fail => Err(BtmError::http(
                format!("https://{}.invalid", self.name),
                "scripted failure",
            )),
        };
        let name = self.name;
        self.errors.record(name, result)
    }

    fn error_count(&self) -> u64 {
        self.errors.count()
    }

    fn snapshot(&self) -> &S {
        &self.snapshot
    }
}

/// Refresh call counts per source.
#[derive(Debug, Clone, Default)]
pub struct RefreshCounts {
    pub block: Arc<AtomicUsize>,
    pub fees: Arc<AtomicUsize>,
    pub price: Arc<AtomicUsize>,
}

impl RefreshCounts {
    pub fn block(&self) -> usize {
        self.block.load(Ordering::SeqCst)
    }

    pub fn fees(&self) -> usize {
        self.fees.load(Ordering::SeqCst)
    }

    pub fn price(&self) -> usize {
        self.price.load(Ordering::SeqCst)
    }
}

/// Plans for all three sources.
#[derive(Debug, Clone, Default)]
pub struct Plans {
    pub block: Plan<BlockSnapshot>,
    pub fees: Plan<FeeSnapshot>,
    pub price: Plan<PriceSnapshot>,
}

impl Plans {
    pub fn into_set(self) -> (SourceSet, RefreshCounts) {
        let counts = RefreshCounts::default();
        let set = SourceSet::new(
            Box::new(ScriptedSource::new("block", self.block, Arc::clone(&counts.block))),
            Box::new(ScriptedSource::new("fees", self.fees, Arc::clone(&counts.fees))),
            Box::new(ScriptedSource::new("price", self.price, Arc::clone(&counts.price))),
        );
        (set, counts)
    }
}

/// A block snapshot as the live source would report a fresh tip.
pub fn tip(height: u64, is_new_block: bool) -> BlockSnapshot {
    BlockSnapshot {
        hash: Some(format!("{height:064x}")),
        height,
        timestamp: T0 - 300,
        minutes_ago: 5,
        is_new_block,
    }
}

// ──────────────────── daemon rig ────────────────────

/// A daemon wired to in-memory collaborators, plus handles to inspect them.
pub struct Rig {
    pub daemon: MonitorDaemon,
    pub display: MemoryDisplay,
    pub system: Arc<MockSystem>,
    pub clock: FakeClock,
    pub signals: SignalHandler,
    pub counts: RefreshCounts,
    pub config_path: PathBuf,
    pub activity_log: PathBuf,
    pub dir: TempDir,
}

/// Config with every path inside `dir`, saved to `dir/config.toml`.
pub fn config_in(dir: &TempDir, mut config: Config) -> (Config, PathBuf) {
    config.device.activity_log = dir.path().join("activity.jsonl");
    config.device.price_cache = dir.path().join("price.json");
    let path = dir.path().join("config.toml");
    config.save(&path).expect("save test config");
    (config, path)
}

pub fn rig(
    config: Config,
    system: MockSystem,
    plans: Plans,
    keys: Option<ScriptedKeys>,
    args: &DaemonArgs,
) -> Rig {
    let dir = TempDir::new().expect("tempdir");
    let (config, config_path) = config_in(&dir, config);
    let activity_log = config.device.activity_log.clone();

    let display = MemoryDisplay::new(config.device.columns);
    let system = Arc::new(system);
    let clock = FakeClock::at(T0);
    let signals = SignalHandler::detached();
    let (sources, counts) = plans.into_set();
    let keys = keys.map(|k| Box::new(k) as Box<dyn KeySource>);

    let parts = DaemonParts {
        config,
        config_origin: ConfigOrigin::File,
        config_path: config_path.clone(),
        display: Box::new(display.clone()),
        keys,
        system: Arc::clone(&system) as Arc<dyn btc_monitor::platform::SystemActions>,
        clock: Box::new(clock.clone()),
        sources,
        signals: signals.clone(),
        log: JsonlWriter::open(JsonlConfig::at(activity_log.clone())),
    };
    let daemon = MonitorDaemon::from_parts(parts, args);

    Rig {
        daemon,
        display,
        system,
        clock,
        signals,
        counts,
        config_path,
        activity_log,
        dir,
    }
}

pub fn headless() -> DaemonArgs {
    DaemonArgs {
        console: false,
        skip_setup: true,
        watchdog_sec: 0,
    }
}

/// Lines of the activity log.
pub fn activity(rig: &Rig) -> Vec<serde_json::Value> {
    fs::read_to_string(&rig.activity_log)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid jsonl"))
        .collect()
}

pub fn events(rig: &Rig) -> Vec<String> {
    activity(rig)
        .iter()
        .filter_map(|v| v["event"].as_str().map(str::to_string))
        .collect()
}

// ──────────────────── CLI runner ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_btcmon") {
        return PathBuf::from(path);
    }

    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join("btcmon"));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve btcmon binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("btcmon-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute btcmon command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let log_content = format!(
        "case={case_name}\nbin={}\nargs={args:?}\nstatus={}\n----- stdout -----\n{stdout}\n----- stderr -----\n{stderr}\n",
        bin_path.display(),
        output.status
    );
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}
