//! Recommended fee rates from mempool.space.

#![allow(missing_docs)]

use serde::Deserialize;

use crate::core::errors::Result;
use crate::sources::http::HttpClient;
use crate::sources::{DataSource, ErrorCounter, RefreshOutcome};

const FEES_URL: &str = "https://mempool.space/api/v1/fees/recommended";

/// Fee rates in sat/vB. `None` means not yet known.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeeSnapshot {
    #[serde(rename = "fastestFee")]
    pub fastest: Option<f64>,
    #[serde(rename = "halfHourFee")]
    pub half_hour: Option<f64>,
    #[serde(rename = "hourFee")]
    pub hour: Option<f64>,
    #[serde(rename = "economyFee")]
    pub economy: Option<f64>,
}

/// Render a fee for the display: whole numbers without a fraction, `?` when
/// unknown.
#[must_use]
pub fn format_fee(fee: Option<f64>) -> String {
    match fee {
        None => "?".to_string(),
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => {
            let s = format!("{v:.2}");
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
    }
}

pub struct FeeSource {
    http: HttpClient,
    snapshot: FeeSnapshot,
    errors: ErrorCounter,
}

impl FeeSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            snapshot: FeeSnapshot::default(),
            errors: ErrorCounter::default(),
        }
    }

    fn fetch(&mut self) -> Result<()> {
        self.snapshot = self.http.get_json(FEES_URL)?;
        Ok(())
    }
}

impl DataSource for FeeSource {
    type Snapshot = FeeSnapshot;

    fn name(&self) -> &'static str {
        "fees"
    }

    fn refresh(&mut self) -> RefreshOutcome {
        let result = self.fetch();
        let name = self.name();
        self.errors.record(name, result)
    }

    fn error_count(&self) -> u64 {
        self.errors.count()
    }

    fn snapshot(&self) -> &FeeSnapshot {
        &self.snapshot
    }
}
