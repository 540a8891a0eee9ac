//! Configuration system: flat TOML record + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{BtmError, Result};

/// Full daemon configuration.
///
/// The top-level keys form the flat record the setup flow edits. Device and
/// path settings live in the nested `[device]` table and are only changed by
/// editing the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Clock format on the price screen: 12 or 24.
    pub time_format: u32,
    /// Seconds between screen rotations.
    pub wait_scr_chg: u64,
    /// Seconds between block + fee refreshes.
    pub wait_meta: u64,
    /// Seconds between price refreshes.
    pub wait_price: u64,
    /// Show the "new block" splash when the chain tip changes.
    pub block_splash: bool,
    /// Seconds to wait for a keypress that enters setup at boot.
    pub wait_config: u64,
    /// `"auto"` or an explicit zone name such as `America/Denver`.
    pub timezone: String,
    /// Aggregate error count at which the daemon gives up.
    pub api_failures: u32,
    /// Update channel: the git branch self-update resets to.
    pub vers_loc: String,
    pub device: DeviceConfig,
}

/// Hardware and filesystem settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    pub i2c_bus: PathBuf,
    pub lcd_address: u8,
    pub columns: usize,
    /// Terminal the setup flow reads raw keystrokes from.
    pub input_tty: PathBuf,
    pub wifi_interface: String,
    pub ping_host: String,
    pub time_sync_wait_secs: u64,
    pub activity_log: PathBuf,
    pub price_cache: PathBuf,
    pub repo_dir: PathBuf,
    pub repo_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_format: 24,
            wait_scr_chg: 6,
            wait_meta: 10,
            wait_price: 60,
            block_splash: true,
            wait_config: 3,
            timezone: "auto".to_string(),
            api_failures: 20,
            vers_loc: "current".to_string(),
            device: DeviceConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let data = home_dir().join(".local").join("share").join("btcmon");
        Self {
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            lcd_address: 0x3e,
            columns: 16,
            input_tty: PathBuf::from("/dev/tty"),
            wifi_interface: "wlan0".to_string(),
            ping_host: "1.1.1.1".to_string(),
            time_sync_wait_secs: 15,
            activity_log: data.join("activity.jsonl"),
            price_cache: data.join("price_cache.json"),
            repo_dir: data.join("repo"),
            repo_url: "https://github.com/sadtank/btc-mon".to_string(),
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[BTM-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read from an existing file.
    File,
    /// The file was missing; defaults were written to it.
    CreatedDefaults,
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir().join(".config").join("btcmon").join("config.toml")
    }

    /// Load config from `path`, creating it with defaults when missing, then
    /// apply env overrides and validate.
    pub fn load_or_create(path: &Path) -> Result<(Self, ConfigOrigin)> {
        let (mut cfg, origin) = if path.exists() {
            (Self::read_file(path)?, ConfigOrigin::File)
        } else {
            eprintln!(
                "[BTM-CONFIG] missing config file {}, creating defaults",
                path.display()
            );
            let defaults = Self::default();
            defaults.save(path)?;
            (defaults, ConfigOrigin::CreatedDefaults)
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok((cfg, origin))
    }

    /// Strict load used for reloads: the file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = Self::read_file(path)?;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| BtmError::io(path, source))?;
        Ok(toml::from_str(&raw)?)
    }

    /// Persist the record to `path` via temp file + rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let rendered = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| BtmError::io(parent, source))?;
        }
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, rendered).map_err(|source| BtmError::io(&tmp, source))?;
        fs::rename(&tmp, path).map_err(|source| BtmError::io(path, source))?;
        Ok(())
    }

    /// Deterministic hash of the effective config for the activity log.
    ///
    /// FNV-1a over the canonical JSON so the value is stable across builds.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    /// Apply `BTCMON_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("BTCMON_TIME_FORMAT") {
            self.time_format = parse_env("BTCMON_TIME_FORMAT", &raw)?;
        }
        if let Some(raw) = lookup("BTCMON_WAIT_SCR_CHG") {
            self.wait_scr_chg = parse_env("BTCMON_WAIT_SCR_CHG", &raw)?;
        }
        if let Some(raw) = lookup("BTCMON_WAIT_META") {
            self.wait_meta = parse_env("BTCMON_WAIT_META", &raw)?;
        }
        if let Some(raw) = lookup("BTCMON_WAIT_PRICE") {
            self.wait_price = parse_env("BTCMON_WAIT_PRICE", &raw)?;
        }
        if let Some(raw) = lookup("BTCMON_BLOCK_SPLASH") {
            self.block_splash = parse_env("BTCMON_BLOCK_SPLASH", &raw)?;
        }
        if let Some(raw) = lookup("BTCMON_WAIT_CONFIG") {
            self.wait_config = parse_env("BTCMON_WAIT_CONFIG", &raw)?;
        }
        if let Some(raw) = lookup("BTCMON_TIMEZONE") {
            self.timezone = raw.trim().to_string();
        }
        if let Some(raw) = lookup("BTCMON_API_FAILURES") {
            self.api_failures = parse_env("BTCMON_API_FAILURES", &raw)?;
        }
        if let Some(raw) = lookup("BTCMON_VERS_LOC") {
            self.vers_loc = raw.trim().to_string();
        }
        if let Some(raw) = lookup("BTCMON_INPUT_TTY") {
            self.device.input_tty = PathBuf::from(raw);
        }
        Ok(())
    }

    /// Check invariants the scheduler relies on.
    pub fn validate(&self) -> Result<()> {
        for (name, val) in [
            ("wait_scr_chg", self.wait_scr_chg),
            ("wait_meta", self.wait_meta),
            ("wait_price", self.wait_price),
        ] {
            if val == 0 {
                return Err(BtmError::InvalidConfig {
                    details: format!("{name} must be > 0 seconds"),
                });
            }
        }
        if !matches!(self.time_format, 12 | 24) {
            return Err(BtmError::InvalidConfig {
                details: format!("time_format must be 12 or 24, got {}", self.time_format),
            });
        }
        if self.api_failures == 0 {
            return Err(BtmError::InvalidConfig {
                details: "api_failures must be >= 1".to_string(),
            });
        }
        if self.timezone.trim().is_empty() {
            return Err(BtmError::InvalidConfig {
                details: "timezone must be \"auto\" or a zone name".to_string(),
            });
        }
        if self.vers_loc.trim().is_empty() {
            return Err(BtmError::InvalidConfig {
                details: "vers_loc must name an update channel".to_string(),
            });
        }
        if self.device.columns < 8 {
            return Err(BtmError::InvalidConfig {
                details: format!("device.columns must be >= 8, got {}", self.device.columns),
            });
        }
        Ok(())
    }

    /// Whether the timezone should be resolved from IP geolocation.
    #[must_use]
    pub fn timezone_is_auto(&self) -> bool {
        self.timezone.trim().eq_ignore_ascii_case("auto")
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| BtmError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigOrigin};
    use crate::core::errors::BtmError;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_shipped_record() {
        let cfg = Config::default();
        assert_eq!(cfg.time_format, 24);
        assert_eq!(cfg.wait_scr_chg, 6);
        assert_eq!(cfg.wait_meta, 10);
        assert_eq!(cfg.wait_price, 60);
        assert!(cfg.block_splash);
        assert_eq!(cfg.wait_config, 3);
        assert_eq!(cfg.timezone, "auto");
        assert_eq!(cfg.api_failures, 20);
        assert_eq!(cfg.vers_loc, "current");
    }

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = Config::default();
        cfg.wait_meta = 0;
        let err = cfg.validate().expect_err("zero interval must fail");
        match err {
            BtmError::InvalidConfig { details } => assert!(details.contains("wait_meta")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn time_format_must_be_12_or_24() {
        let mut cfg = Config::default();
        cfg.time_format = 13;
        assert!(cfg.validate().is_err());
        cfg.time_format = 12;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn failure_ceiling_must_be_positive() {
        let mut cfg = Config::default();
        cfg.api_failures = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env = vars(&[
            ("BTCMON_WAIT_META", "30"),
            ("BTCMON_BLOCK_SPLASH", "false"),
            ("BTCMON_TIMEZONE", " Europe/Berlin "),
        ]);
        let mut cfg = Config::default();
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .expect("overrides should parse");
        assert_eq!(cfg.wait_meta, 30);
        assert!(!cfg.block_splash);
        assert_eq!(cfg.timezone, "Europe/Berlin");
    }

    #[test]
    fn env_override_parse_failure_is_config_error() {
        let env = vars(&[("BTCMON_API_FAILURES", "lots")]);
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .expect_err("non-numeric override must fail");
        assert_eq!(err.code(), "BTM-1003");
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let (cfg, origin) = Config::load_or_create(&path).unwrap();
        assert_eq!(origin, ConfigOrigin::CreatedDefaults);
        assert!(path.exists());
        assert_eq!(cfg.wait_scr_chg, Config::default().wait_scr_chg);

        let (_, origin) = Config::load_or_create(&path).unwrap();
        assert_eq!(origin, ConfigOrigin::File);
    }

    #[test]
    fn save_then_load_preserves_edits() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let mut cfg = Config::default();
        cfg.wait_price = 120;
        cfg.timezone = "Asia/Tokyo".to_string();
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.wait_price, 120);
        assert_eq!(loaded.timezone, "Asia/Tokyo");
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "wait_meta = 45\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.wait_meta, 45);
        assert_eq!(loaded.wait_price, 60);
    }

    #[test]
    fn stable_hash_changes_when_config_changes() {
        let before = Config::default().stable_hash().unwrap();
        let mut modified = Config::default();
        modified.api_failures += 1;
        assert_ne!(before, modified.stable_hash().unwrap());
    }

    #[test]
    fn auto_timezone_detection_is_case_insensitive() {
        let mut cfg = Config::default();
        assert!(cfg.timezone_is_auto());
        cfg.timezone = "AUTO".to_string();
        assert!(cfg.timezone_is_auto());
        cfg.timezone = "UTC".to_string();
        assert!(!cfg.timezone_is_auto());
    }
}
