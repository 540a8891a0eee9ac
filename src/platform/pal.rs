//! System action capability trait and its Linux implementation.
//!
//! The daemon and the setup flow only see [`SystemActions`]. Each action
//! reports a success flag plus a short status string sized for the display;
//! the command behind it (nmcli, timedatectl, raspi-config, git) never leaks
//! through the interface.

#![allow(missing_docs)]

use std::fs;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::config::DeviceConfig;
use crate::core::errors::{BtmError, Result};
use crate::sources::HttpClient;

const TIMEZONE_LOOKUP_URL: &str = "http://ip-api.com/json";
/// Upper bound on waiting for NetworkManager to settle after `connection up`.
const NETWORK_SETTLE_LIMIT: Duration = Duration::from_secs(45);
const NETWORK_POLL: Duration = Duration::from_millis(100);
const TIME_SYNC_POLL: Duration = Duration::from_secs(1);

/// Outcome of a system action: success flag and a display-sized status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub ok: bool,
    pub status: String,
}

impl ActionResult {
    pub fn success(status: impl Into<String>) -> Self {
        Self {
            ok: true,
            status: status.into(),
        }
    }

    pub fn failure(status: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: status.into(),
        }
    }
}

/// Echo requests sent and replies received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingStats {
    pub sent: u32,
    pub received: u32,
}

impl PingStats {
    pub const fn reachable(self) -> bool {
        self.received > 0
    }

    pub fn summary(self) -> String {
        format!("{}/{} succeeded", self.received, self.sent)
    }
}

/// Host capabilities the daemon and setup flow sequence.
pub trait SystemActions: Send + Sync {
    /// IPv4 address currently assigned to `interface`, if any.
    fn ip_address(&self, interface: &str) -> Option<Ipv4Addr>;

    /// Bring up every known wired and wireless profile and wait until one
    /// activates or all of them fail.
    fn activate_networks(&self) -> ActionResult;

    fn ping(&self, host: &str, count: u32) -> PingStats;

    /// Wait up to `timeout` for the wall clock to report NTP synchronization.
    fn wait_time_sync(&self, timeout: Duration) -> ActionResult;

    fn os_timezone(&self) -> Result<String>;

    /// Zone name for the current public IP.
    fn lookup_timezone(&self) -> Result<String>;

    fn apply_timezone(&self, zone: &str) -> ActionResult;

    fn set_wifi_country(&self, code: &str) -> ActionResult;

    fn apply_wifi_credentials(&self, ssid: &str, passphrase: &str, hidden: bool) -> ActionResult;

    fn toggle_remote_access(&self, enable: bool) -> ActionResult;

    /// Replace the installed tree with the tip of `channel`.
    fn self_update(&self, channel: &str) -> ActionResult;

    /// Apply the configured zone. `"auto"` (or blank) resolves through
    /// [`SystemActions::lookup_timezone`] first.
    fn apply_configured_timezone(&self, configured: &str) -> ActionResult {
        let configured = configured.trim();
        if configured.is_empty() || configured.eq_ignore_ascii_case("auto") {
            match self.lookup_timezone() {
                Ok(zone) => self.apply_timezone(&zone),
                Err(err) => {
                    eprintln!("[BTM-SYSTEM] timezone lookup failed: {err}");
                    ActionResult::failure("(!) ip-api.com")
                }
            }
        } else {
            self.apply_timezone(configured)
        }
    }
}

// ──────────────────── Linux ────────────────────

/// Linux implementation: NetworkManager, systemd-timesyncd, raspi-config
/// and git.
#[derive(Debug, Clone)]
pub struct LinuxSystem {
    http: HttpClient,
    repo_dir: PathBuf,
    repo_url: String,
}

impl LinuxSystem {
    pub fn new(device: &DeviceConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new()?,
            repo_dir: device.repo_dir.clone(),
            repo_url: device.repo_url.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    timezone: Option<String>,
}

/// Run `cmd` to completion; non-zero exit is an error carrying stderr.
fn run(cmd: &mut Command, label: &str) -> Result<String> {
    let output = cmd.output().map_err(|e| BtmError::SystemCommand {
        command: label.to_string(),
        details: e.to_string(),
    })?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(BtmError::SystemCommand {
            command: label.to_string(),
            details: format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        })
    }
}

/// raspi-config's `do_ssh` takes 0 to enable and 1 to disable.
const fn raspi_ssh_arg(enable: bool) -> &'static str {
    if enable { "0" } else { "1" }
}

impl SystemActions for LinuxSystem {
    fn ip_address(&self, interface: &str) -> Option<Ipv4Addr> {
        let addrs = match nix::ifaddrs::getifaddrs() {
            Ok(addrs) => addrs,
            Err(err) => {
                eprintln!("[BTM-SYSTEM] getifaddrs failed: {err}");
                return None;
            }
        };
        addrs
            .filter(|ifa| ifa.interface_name == interface)
            .filter_map(|ifa| ifa.address)
            .find_map(|addr| addr.as_sockaddr_in().map(|sin| *SocketAddrV4::from(*sin).ip()))
    }

    fn activate_networks(&self) -> ActionResult {
        let listing = match run(
            Command::new("nmcli").args(["-t", "-f", "NAME,TYPE", "connection", "show"]),
            "nmcli connection show",
        ) {
            Ok(listing) => listing,
            Err(err) => {
                eprintln!("[BTM-SYSTEM] {err}");
                return ActionResult::failure("(!) nmcli");
            }
        };
        let profiles = parse_nmcli_profiles(&listing);
        if profiles.is_empty() {
            return ActionResult::failure("no net profiles");
        }
        for name in &profiles {
            // A profile failing to come up is expected; the poll below decides.
            if let Err(err) = run(
                Command::new("nmcli").args(["connection", "up", name.as_str()]),
                "nmcli connection up",
            ) {
                eprintln!("[BTM-SYSTEM] {name}: {err}");
            }
        }

        let started = Instant::now();
        while started.elapsed() < NETWORK_SETTLE_LIMIT {
            let active = match run(
                Command::new("nmcli").args([
                    "-t",
                    "-f",
                    "NAME,TYPE,STATE",
                    "connection",
                    "show",
                    "--active",
                ]),
                "nmcli connection show --active",
            ) {
                Ok(active) => active,
                Err(err) => {
                    eprintln!("[BTM-SYSTEM] {err}");
                    return ActionResult::failure("(!) nmcli");
                }
            };
            match network_state(&active) {
                NetworkState::Up => return ActionResult::success("network up"),
                NetworkState::Down => return ActionResult::failure("no network"),
                NetworkState::Pending => thread::sleep(NETWORK_POLL),
            }
        }
        ActionResult::failure("network timeout")
    }

    fn ping(&self, host: &str, count: u32) -> PingStats {
        let lost = PingStats {
            sent: count,
            received: 0,
        };
        let count_arg = count.to_string();
        // Exit status 1 only means some replies were lost.
        match Command::new("ping")
            .args(["-c", count_arg.as_str(), host])
            .output()
        {
            Ok(out) => parse_ping_summary(&String::from_utf8_lossy(&out.stdout)).unwrap_or(lost),
            Err(err) => {
                eprintln!("[BTM-SYSTEM] ping {host}: {err}");
                lost
            }
        }
    }

    fn wait_time_sync(&self, timeout: Duration) -> ActionResult {
        let started = Instant::now();
        while started.elapsed() < timeout {
            let output = Command::new("timedatectl")
                .args(["show", "--property", "NTPSynchronized", "--value"])
                .output();
            match output {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    return ActionResult::failure("ntp: missing?");
                }
                Err(err) => {
                    eprintln!("[BTM-SYSTEM] timedatectl: {err}");
                    return ActionResult::failure("ntp: unk error");
                }
                Ok(out) if !out.status.success() => {
                    return ActionResult::failure("ntp: unk error");
                }
                Ok(out) if String::from_utf8_lossy(&out.stdout).trim() == "yes" => {
                    return ActionResult::success("ntp: connected");
                }
                Ok(_) => thread::sleep(TIME_SYNC_POLL),
            }
        }
        ActionResult::failure("ntp: timeout")
    }

    fn os_timezone(&self) -> Result<String> {
        run(
            Command::new("timedatectl").args(["show", "--property=Timezone", "--value"]),
            "timedatectl show",
        )
    }

    fn lookup_timezone(&self) -> Result<String> {
        let response: IpApiResponse = self.http.get_json(TIMEZONE_LOOKUP_URL)?;
        response
            .timezone
            .filter(|zone| !zone.trim().is_empty())
            .ok_or_else(|| BtmError::http(TIMEZONE_LOOKUP_URL, "response has no timezone"))
    }

    fn apply_timezone(&self, zone: &str) -> ActionResult {
        match run(
            Command::new("sudo").args(["timedatectl", "set-timezone", zone]),
            "timedatectl set-timezone",
        ) {
            Ok(_) => ActionResult::success(format!("set: {zone}")),
            Err(err) => {
                eprintln!("[BTM-SYSTEM] {err}");
                ActionResult::failure("(!) set zone")
            }
        }
    }

    fn set_wifi_country(&self, code: &str) -> ActionResult {
        match run(
            Command::new("sudo").args(["raspi-config", "nonint", "do_wifi_country", code]),
            "raspi-config do_wifi_country",
        ) {
            Ok(_) => ActionResult::success(format!("country: {code}")),
            Err(err) => {
                eprintln!("[BTM-SYSTEM] {err}");
                ActionResult::failure("(!) wifi country")
            }
        }
    }

    fn apply_wifi_credentials(&self, ssid: &str, passphrase: &str, hidden: bool) -> ActionResult {
        let hidden = if hidden { "1" } else { "0" };
        // The passphrase stays out of the label so it never reaches the logs.
        match run(
            Command::new("sudo").args([
                "raspi-config",
                "nonint",
                "do_wifi_ssid_passphrase",
                ssid,
                passphrase,
                hidden,
                "1",
            ]),
            "raspi-config do_wifi_ssid_passphrase",
        ) {
            Ok(_) => ActionResult::success("wifi saved"),
            Err(err) => {
                eprintln!("[BTM-SYSTEM] {err}");
                ActionResult::failure("(!) wifi creds")
            }
        }
    }

    fn toggle_remote_access(&self, enable: bool) -> ActionResult {
        match run(
            Command::new("sudo").args(["raspi-config", "nonint", "do_ssh", raspi_ssh_arg(enable)]),
            "raspi-config do_ssh",
        ) {
            Ok(_) => ActionResult::success(if enable { "enabled" } else { "disabled" }),
            Err(err) => {
                eprintln!("[BTM-SYSTEM] {err}");
                ActionResult::failure("(!) toggle fail")
            }
        }
    }

    fn self_update(&self, channel: &str) -> ActionResult {
        if let Err(err) = fs::create_dir_all(&self.repo_dir) {
            eprintln!(
                "[BTM-SYSTEM] cannot create {}: {err}",
                self.repo_dir.display()
            );
            return ActionResult::failure("update failed");
        }
        let target = format!("origin/{channel}");
        let steps: [&[&str]; 6] = [
            &["init"],
            &["remote", "remove", "origin"],
            &["remote", "add", "origin", self.repo_url.as_str()],
            &["fetch", "origin"],
            &["reset", "--hard", target.as_str()],
            &["clean", "-fdx"],
        ];
        for args in steps {
            let label = format!("git {}", args.join(" "));
            eprintln!("[BTM-SYSTEM] running {label}");
            let result = run(
                Command::new("git").args(args).current_dir(&self.repo_dir),
                &label,
            );
            match result {
                Ok(_) => {}
                // A fresh repository has no origin to remove.
                Err(_) if args == ["remote", "remove", "origin"] => {}
                Err(err) => {
                    eprintln!("[BTM-SYSTEM] {err}");
                    return ActionResult::failure("update failed");
                }
            }
        }
        ActionResult::success("update success")
    }
}

// ──────────────────── parsers ────────────────────

/// Extract sent/received counts from `ping` output (iputils or busybox).
fn parse_ping_summary(raw: &str) -> Option<PingStats> {
    let re = Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received").ok()?;
    let caps = re.captures(raw)?;
    Some(PingStats {
        sent: caps[1].parse().ok()?,
        received: caps[2].parse().ok()?,
    })
}

fn is_network_type(kind: &str) -> bool {
    matches!(
        kind,
        "wifi" | "ethernet" | "802-11-wireless" | "802-3-ethernet"
    )
}

/// Profile names from `nmcli -t -f NAME,TYPE connection show`.
///
/// Terse mode escapes `:` inside names as `\:`, so the type is whatever
/// follows the last unescaped colon.
fn parse_nmcli_profiles(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.rsplit_once(':'))
        .filter(|(_, kind)| is_network_type(kind))
        .map(|(name, _)| name.replace("\\:", ":"))
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetworkState {
    Up,
    Down,
    Pending,
}

/// Classify `nmcli -t -f NAME,TYPE,STATE connection show --active`.
///
/// No relevant active profile at all counts as down.
fn network_state(raw: &str) -> NetworkState {
    let states: Vec<&str> = raw
        .lines()
        .filter_map(|line| {
            let mut parts = line.rsplitn(3, ':');
            let state = parts.next()?;
            let kind = parts.next()?;
            is_network_type(kind).then_some(state)
        })
        .collect();
    if states.iter().any(|s| *s == "activated") {
        NetworkState::Up
    } else if states.iter().all(|s| *s == "deactivated") {
        NetworkState::Down
    } else {
        NetworkState::Pending
    }
}

// ──────────────────── mock ────────────────────

/// Scripted capabilities for deterministic tests. Every call is recorded.
#[derive(Debug)]
pub struct MockSystem {
    pub ip: Option<Ipv4Addr>,
    pub networks: ActionResult,
    pub ping_stats: PingStats,
    pub time_sync: ActionResult,
    pub os_zone: String,
    /// `None` makes the lookup fail.
    pub lookup_zone: Option<String>,
    /// Result for every mutating action (timezone, Wi-Fi, SSH).
    pub action: ActionResult,
    pub update: ActionResult,
    #[doc(hidden)]
    pub calls: Mutex<Vec<String>>,
}

impl Default for MockSystem {
    fn default() -> Self {
        Self {
            ip: Some(Ipv4Addr::new(192, 168, 1, 50)),
            networks: ActionResult::success("network up"),
            ping_stats: PingStats {
                sent: 4,
                received: 4,
            },
            time_sync: ActionResult::success("ntp: connected"),
            os_zone: "Etc/UTC".to_string(),
            lookup_zone: Some("America/Denver".to_string()),
            action: ActionResult::success("ok"),
            update: ActionResult::success("update success"),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockSystem {
    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn scripted(&self, status: String) -> ActionResult {
        ActionResult {
            ok: self.action.ok,
            status: if self.action.ok {
                status
            } else {
                self.action.status.clone()
            },
        }
    }
}

impl SystemActions for MockSystem {
    fn ip_address(&self, interface: &str) -> Option<Ipv4Addr> {
        self.record(format!("ip_address {interface}"));
        self.ip
    }

    fn activate_networks(&self) -> ActionResult {
        self.record("activate_networks");
        self.networks.clone()
    }

    fn ping(&self, host: &str, count: u32) -> PingStats {
        self.record(format!("ping {host} {count}"));
        self.ping_stats
    }

    fn wait_time_sync(&self, timeout: Duration) -> ActionResult {
        self.record(format!("wait_time_sync {}", timeout.as_secs()));
        self.time_sync.clone()
    }

    fn os_timezone(&self) -> Result<String> {
        self.record("os_timezone");
        Ok(self.os_zone.clone())
    }

    fn lookup_timezone(&self) -> Result<String> {
        self.record("lookup_timezone");
        self.lookup_zone
            .clone()
            .ok_or_else(|| BtmError::http(TIMEZONE_LOOKUP_URL, "scripted failure"))
    }

    fn apply_timezone(&self, zone: &str) -> ActionResult {
        self.record(format!("apply_timezone {zone}"));
        self.scripted(format!("set: {zone}"))
    }

    fn set_wifi_country(&self, code: &str) -> ActionResult {
        self.record(format!("set_wifi_country {code}"));
        self.scripted(format!("country: {code}"))
    }

    fn apply_wifi_credentials(&self, ssid: &str, _passphrase: &str, hidden: bool) -> ActionResult {
        self.record(format!("apply_wifi_credentials {ssid} hidden={hidden}"));
        self.scripted("wifi saved".to_string())
    }

    fn toggle_remote_access(&self, enable: bool) -> ActionResult {
        self.record(format!("toggle_remote_access {enable}"));
        self.scripted(if enable { "enabled" } else { "disabled" }.to_string())
    }

    fn self_update(&self, channel: &str) -> ActionResult {
        self.record(format!("self_update {channel}"));
        self.update.clone()
    }
}
