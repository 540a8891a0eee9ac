//! BTM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, BtmError>;

/// Top-level error type for the btc monitor daemon.
#[derive(Debug, Error)]
pub enum BtmError {
    #[error("[BTM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BTM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BTM-2001] display device failure: {details}")]
    Display { details: String },

    #[error("[BTM-2002] terminal failure: {details}")]
    Terminal { details: String },

    #[error("[BTM-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[BTM-2201] HTTP request to {endpoint} failed: {details}")]
    Http { endpoint: String, details: String },

    #[error("[BTM-2301] system command `{command}` failed: {details}")]
    SystemCommand { command: String, details: String },

    #[error("[BTM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BTM-3101] screen index {index} outside rotation of {len}")]
    ScreenIndex { index: usize, len: usize },

    #[error("[BTM-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl BtmError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BTM-1001",
            Self::ConfigParse { .. } => "BTM-1003",
            Self::Display { .. } => "BTM-2001",
            Self::Terminal { .. } => "BTM-2002",
            Self::Serialization { .. } => "BTM-2101",
            Self::Http { .. } => "BTM-2201",
            Self::SystemCommand { .. } => "BTM-2301",
            Self::Io { .. } => "BTM-3002",
            Self::ScreenIndex { .. } => "BTM-3101",
            Self::Runtime { .. } => "BTM-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// A screen index outside the rotation is a logic defect and never retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Io { .. } | Self::SystemCommand { .. } | Self::Display { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for HTTP failures.
    #[must_use]
    pub fn http(endpoint: impl Into<String>, details: impl ToString) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            details: details.to_string(),
        }
    }
}

impl From<serde_json::Error> for BtmError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for BtmError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for BtmError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for BtmError {
    fn from(value: reqwest::Error) -> Self {
        let endpoint = value
            .url()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string);
        Self::Http {
            endpoint,
            details: value.to_string(),
        }
    }
}
