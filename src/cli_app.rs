//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use btc_monitor::core::clock::SystemClock;
use btc_monitor::core::config::Config;
use btc_monitor::core::errors::BtmError;
use btc_monitor::daemon::loop_main::{self, DaemonArgs, EXIT_RESTART, MonitorDaemon};
use btc_monitor::logger::jsonl::{JsonlConfig, JsonlWriter};
use btc_monitor::platform::LinuxSystem;
use btc_monitor::setup::{SetupExit, SetupSession};
use btc_monitor::sources::fees::format_fee;
use btc_monitor::sources::{RefreshOutcome, SourceSet, Trend};

/// Bitcoin monitor for a 16x2 character display.
#[derive(Debug, Parser)]
#[command(
    name = "btcmon",
    author,
    version,
    about = "Bitcoin block, fee and price monitor for a character LCD",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the monitor daemon.
    Run(RunArgs),
    /// Run the interactive setup flow once and exit.
    Setup(SetupArgs),
    /// Refresh every data source once and print the results.
    Fetch(FetchArgs),
    /// View or create the configuration file.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Draw the display in this terminal instead of on the LCD.
    #[arg(long)]
    console: bool,
    /// Skip the boot-time keypress gate.
    #[arg(long)]
    skip_setup: bool,
    /// Systemd watchdog timeout in seconds (0 disables).
    #[arg(long, default_value_t = 0, value_name = "SECONDS")]
    watchdog_sec: u64,
}

#[derive(Debug, Clone, Args, Default)]
struct SetupArgs {
    /// Draw the display in this terminal instead of on the LCD.
    #[arg(long)]
    console: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct FetchArgs {
    /// Emit one JSON object instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Write the default configuration.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl From<BtmError> for CliError {
    fn from(value: BtmError) -> Self {
        match value {
            BtmError::InvalidConfig { .. } | BtmError::ConfigParse { .. } => {
                Self::User(value.to_string())
            }
            other => Self::Runtime(other.to_string()),
        }
    }
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands. Returns the process exit code.
pub fn run(cli: &Cli) -> Result<i32, CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_daemon(cli, args),
        Command::Setup(args) => run_setup(cli, args),
        Command::Fetch(args) => run_fetch(cli, args).map(|()| 0),
        Command::Config(args) => run_config(cli, args).map(|()| 0),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(0)
        }
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Config::default_path)
}

// ──────────────────── run / setup ────────────────────

fn run_daemon(cli: &Cli, args: &RunArgs) -> Result<i32, CliError> {
    let daemon_args = DaemonArgs {
        console: args.console,
        skip_setup: args.skip_setup,
        watchdog_sec: args.watchdog_sec,
    };
    let mut daemon = MonitorDaemon::init(&config_path(cli), &daemon_args)?;
    let reason = daemon.run();
    Ok(reason.exit_code())
}

fn run_setup(cli: &Cli, args: &SetupArgs) -> Result<i32, CliError> {
    let path = config_path(cli);
    let (mut config, _) = Config::load_or_create(&path)?;
    let mut display = loop_main::open_display(&config, args.console)?;
    let Some(mut keys) = loop_main::open_keys(&config) else {
        return Err(CliError::Runtime(format!(
            "setup needs a keyboard on {}",
            config.device.input_tty.display()
        )));
    };
    let system = LinuxSystem::new(&config.device)?;
    let mut log = JsonlWriter::open(JsonlConfig::at(config.device.activity_log.clone()));

    let mut session = SetupSession {
        display: display.as_mut(),
        keys: keys.as_mut(),
        system: &system,
        clock: &SystemClock,
        config: &mut config,
        config_path: &path,
        log: &mut log,
    };
    match session.run()? {
        SetupExit::Finished => Ok(0),
        SetupExit::RestartRequested => Ok(EXIT_RESTART),
    }
}

// ──────────────────── fetch ────────────────────

fn run_fetch(cli: &Cli, args: &FetchArgs) -> Result<(), CliError> {
    let (config, _) = Config::load_or_create(&config_path(cli))?;
    let mut sources = SourceSet::live(config.device.price_cache.clone())?;
    let mut refreshes: Vec<(&'static str, RefreshOutcome)> =
        sources.refresh_chain().into_iter().collect();
    refreshes.push(sources.refresh_price());

    let block = sources.block.snapshot();
    let fees = sources.fees.snapshot();
    let price = sources.price.snapshot();

    match output_mode(args.json) {
        OutputMode::Human => {
            for (name, outcome) in &refreshes {
                let status = if outcome.ok {
                    "ok".green()
                } else {
                    "failed".red()
                };
                match &outcome.failure {
                    Some((_, message)) => println!("{name:>6}: {status} ({message})"),
                    None => println!("{name:>6}: {status}"),
                }
            }
            println!();
            println!(
                "block  {} ({} min ago)",
                block.height.to_string().bold(),
                block.minutes_ago
            );
            if let Some(hash) = &block.hash {
                println!("hash   {hash}");
            }
            println!(
                "fees   {} / {} / {} / {} sat/vB",
                format_fee(fees.fastest),
                format_fee(fees.half_hour),
                format_fee(fees.hour),
                format_fee(fees.economy)
            );
            match price.price {
                Some(p) => println!(
                    "price  ${p:.0} {}{}",
                    price.trend.glyph(),
                    if price.from_cache { " (cached)" } else { "" }
                ),
                None => println!("price  unknown"),
            }
        }
        OutputMode::Json => {
            let outcomes: Vec<Value> = refreshes
                .iter()
                .map(|(name, outcome)| {
                    json!({
                        "source": name,
                        "ok": outcome.ok,
                        "error_code": outcome.failure.as_ref().map(|(code, _)| *code),
                        "error": outcome.failure.as_ref().map(|(_, message)| message),
                    })
                })
                .collect();
            let error_counts: serde_json::Map<String, Value> = sources
                .error_report()
                .into_iter()
                .map(|(name, count)| (name.to_string(), json!(count)))
                .collect();
            let payload = json!({
                "command": "fetch",
                "refreshes": outcomes,
                "error_counts": error_counts,
                "block": {
                    "hash": block.hash,
                    "height": block.height,
                    "timestamp": block.timestamp,
                    "minutes_ago": block.minutes_ago,
                },
                "fees": {
                    "fastest": fees.fastest,
                    "half_hour": fees.half_hour,
                    "hour": fees.hour,
                    "economy": fees.economy,
                },
                "price": {
                    "usd": price.price,
                    "trend": trend_label(price.trend),
                    "from_cache": price.from_cache,
                },
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

const fn trend_label(trend: Trend) -> &'static str {
    match trend {
        Trend::Up => "up",
        Trend::Down => "down",
        Trend::Unknown => "unknown",
    }
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let path = config_path(cli);
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            println!("{}", path.display());
            if !path.exists() {
                println!("  (file does not exist; defaults will be written on first run)");
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = if path.exists() {
                Config::load(&path)?
            } else {
                Config::default()
            };
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
            println!("{rendered}");
            Ok(())
        }
        Some(ConfigCommand::Init { force }) => {
            if path.exists() && !force {
                return Err(CliError::User(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            Config::default().save(&path)?;
            println!("{} {}", "wrote".green(), path.display());
            Ok(())
        }
    }
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(json_flag: bool) -> OutputMode {
    let env_mode = std::env::var("BTCMON_OUTPUT_FORMAT").ok();
    resolve_output_mode(json_flag, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
