//! Enumerated list of user-editable config fields.
//!
//! The setup flow walks [`ConfigField::ALL`] instead of reflecting over the
//! record, so every editable setting has a name, a kind, a rendering of its
//! current value and a typed parse.

use std::fmt;

use crate::core::config::Config;

/// Value kind of an editable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Flag,
    Text,
}

/// Result of applying raw operator input to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    /// The value changed; carries the previous rendering.
    Updated { previous: String },
    /// Empty input or the same value; nothing changed.
    Unchanged,
    /// Input rejected; the previous value is retained.
    Invalid(String),
}

/// One editable top-level setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    TimeFormat,
    WaitScrChg,
    WaitMeta,
    WaitPrice,
    BlockSplash,
    WaitConfig,
    Timezone,
    ApiFailures,
    VersLoc,
}

impl ConfigField {
    /// Every editable field, in file order.
    pub const ALL: [Self; 9] = [
        Self::TimeFormat,
        Self::WaitScrChg,
        Self::WaitMeta,
        Self::WaitPrice,
        Self::BlockSplash,
        Self::WaitConfig,
        Self::Timezone,
        Self::ApiFailures,
        Self::VersLoc,
    ];

    /// Key name as it appears in the config file.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TimeFormat => "time_format",
            Self::WaitScrChg => "wait_scr_chg",
            Self::WaitMeta => "wait_meta",
            Self::WaitPrice => "wait_price",
            Self::BlockSplash => "block_splash",
            Self::WaitConfig => "wait_config",
            Self::Timezone => "timezone",
            Self::ApiFailures => "api_failures",
            Self::VersLoc => "vers_loc",
        }
    }

    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::BlockSplash => FieldKind::Flag,
            Self::Timezone | Self::VersLoc => FieldKind::Text,
            _ => FieldKind::Integer,
        }
    }

    /// Render the field's current value from `cfg`.
    #[must_use]
    pub fn current(self, cfg: &Config) -> String {
        match self {
            Self::TimeFormat => cfg.time_format.to_string(),
            Self::WaitScrChg => cfg.wait_scr_chg.to_string(),
            Self::WaitMeta => cfg.wait_meta.to_string(),
            Self::WaitPrice => cfg.wait_price.to_string(),
            Self::BlockSplash => cfg.block_splash.to_string(),
            Self::WaitConfig => cfg.wait_config.to_string(),
            Self::Timezone => cfg.timezone.clone(),
            Self::ApiFailures => cfg.api_failures.to_string(),
            Self::VersLoc => cfg.vers_loc.clone(),
        }
    }

    /// Parse `raw` and store it into `cfg`. On `Invalid` the record is untouched.
    pub fn apply(self, cfg: &mut Config, raw: &str) -> FieldEdit {
        let raw = raw.trim();
        if raw.is_empty() {
            return FieldEdit::Unchanged;
        }
        let previous = self.current(cfg);

        match self.kind() {
            FieldKind::Integer => {
                let Ok(value) = raw.parse::<u64>() else {
                    return FieldEdit::Invalid(format!("{raw:?} is not a whole number"));
                };
                if let Err(reason) = self.store_integer(cfg, value) {
                    return FieldEdit::Invalid(reason);
                }
            }
            FieldKind::Flag => {
                let Some(value) = parse_flag(raw) else {
                    return FieldEdit::Invalid(format!("{raw:?} is not yes/no"));
                };
                cfg.block_splash = value;
            }
            FieldKind::Text => {
                let value = raw.to_string();
                match self {
                    Self::Timezone => cfg.timezone = value,
                    _ => cfg.vers_loc = value,
                }
            }
        }

        if self.current(cfg) == previous {
            FieldEdit::Unchanged
        } else {
            FieldEdit::Updated { previous }
        }
    }

    fn store_integer(self, cfg: &mut Config, value: u64) -> Result<(), String> {
        match self {
            Self::TimeFormat => {
                if !matches!(value, 12 | 24) {
                    return Err("must be 12 or 24".to_string());
                }
                cfg.time_format = u32::try_from(value).map_err(|e| e.to_string())?;
            }
            Self::WaitScrChg | Self::WaitMeta | Self::WaitPrice => {
                if value == 0 {
                    return Err("interval must be > 0".to_string());
                }
                let slot = match self {
                    Self::WaitScrChg => &mut cfg.wait_scr_chg,
                    Self::WaitMeta => &mut cfg.wait_meta,
                    _ => &mut cfg.wait_price,
                };
                *slot = value;
            }
            Self::WaitConfig => cfg.wait_config = value,
            Self::ApiFailures => {
                if value == 0 {
                    return Err("ceiling must be >= 1".to_string());
                }
                cfg.api_failures = u32::try_from(value).map_err(|e| e.to_string())?;
            }
            Self::BlockSplash | Self::Timezone | Self::VersLoc => {
                return Err(format!("{} is not numeric", self.name()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "true" | "on" => Some(true),
        "0" | "n" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_cover_record() {
        let names: std::collections::HashSet<_> =
            ConfigField::ALL.iter().map(|f| f.name()).collect();
        assert_eq!(names.len(), ConfigField::ALL.len());
        let rendered = toml::to_string(&Config::default()).unwrap();
        for name in names {
            assert!(rendered.contains(name), "{name} missing from serialized record");
        }
    }

    #[test]
    fn integer_update_reports_previous() {
        let mut cfg = Config::default();
        let edit = ConfigField::WaitMeta.apply(&mut cfg, "25");
        assert_eq!(
            edit,
            FieldEdit::Updated {
                previous: "10".to_string()
            }
        );
        assert_eq!(cfg.wait_meta, 25);
    }

    #[test]
    fn empty_input_keeps_value() {
        let mut cfg = Config::default();
        assert_eq!(ConfigField::Timezone.apply(&mut cfg, "   "), FieldEdit::Unchanged);
        assert_eq!(cfg.timezone, "auto");
    }

    #[test]
    fn invalid_input_keeps_value() {
        let mut cfg = Config::default();
        let edit = ConfigField::WaitPrice.apply(&mut cfg, "soon");
        assert!(matches!(edit, FieldEdit::Invalid(_)));
        assert_eq!(cfg.wait_price, 60);

        let edit = ConfigField::WaitScrChg.apply(&mut cfg, "0");
        assert!(matches!(edit, FieldEdit::Invalid(_)));
        assert_eq!(cfg.wait_scr_chg, 6);

        let edit = ConfigField::TimeFormat.apply(&mut cfg, "13");
        assert!(matches!(edit, FieldEdit::Invalid(_)));
        assert_eq!(cfg.time_format, 24);
    }

    #[test]
    fn same_value_is_unchanged() {
        let mut cfg = Config::default();
        assert_eq!(ConfigField::ApiFailures.apply(&mut cfg, "20"), FieldEdit::Unchanged);
    }

    #[test]
    fn flag_accepts_common_spellings() {
        let mut cfg = Config::default();
        assert!(matches!(
            ConfigField::BlockSplash.apply(&mut cfg, "No"),
            FieldEdit::Updated { .. }
        ));
        assert!(!cfg.block_splash);
        assert!(matches!(
            ConfigField::BlockSplash.apply(&mut cfg, "maybe"),
            FieldEdit::Invalid(_)
        ));
        assert!(!cfg.block_splash);
    }

    #[test]
    fn applied_config_still_validates() {
        let mut cfg = Config::default();
        for field in ConfigField::ALL {
            let _ = field.apply(&mut cfg, "0");
        }
        assert!(cfg.validate().is_ok());
    }
}
