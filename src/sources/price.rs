//! BTC/USD price from the Kraken public ticker, with a file cache.
//!
//! The cache holds the last good raw response. When a fetch fails the cache
//! is parsed instead so the screen keeps a price; the failure still counts.

#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::errors::{BtmError, Result};
use crate::sources::http::HttpClient;
use crate::sources::{DataSource, ErrorCounter, RefreshOutcome};

const TICKER_URL: &str = "https://api.kraken.com/0/public/Ticker?pair=XBTUSD";
const PAIR: &str = "XXBTZUSD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trend {
    Up,
    Down,
    #[default]
    Unknown,
}

impl Trend {
    pub const fn glyph(self) -> char {
        match self {
            Self::Up => '^',
            Self::Down => 'v',
            Self::Unknown => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceSnapshot {
    /// 24h volume-weighted average price in USD.
    pub price: Option<f64>,
    pub trend: Trend,
    /// Whether the current values came from the cache file.
    pub from_cache: bool,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: std::collections::HashMap<String, TickerPair>,
}

/// Kraken ticker fields: `a` ask, `b` bid, `p` VWAP [today, 24h].
#[derive(Debug, Deserialize)]
struct TickerPair {
    a: Vec<String>,
    b: Vec<String>,
    p: Vec<String>,
}

/// Extract price and trend from a raw ticker body.
///
/// Trend is up when the bid/ask midpoint is above the 24h VWAP.
pub fn parse_ticker(raw: &str) -> Result<(f64, Trend)> {
    let bad = |details: String| BtmError::Serialization {
        context: "kraken ticker",
        details,
    };
    let response: TickerResponse = serde_json::from_str(raw)?;
    if !response.error.is_empty() {
        return Err(bad(response.error.join("; ")));
    }
    let pair = response
        .result
        .get(PAIR)
        .ok_or_else(|| bad(format!("missing pair {PAIR}")))?;
    let field = |values: &[String], idx: usize, name: &str| -> Result<f64> {
        values
            .get(idx)
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| bad(format!("bad field {name}[{idx}]")))
    };
    let vwap = field(pair.p.as_slice(), 1, "p")?;
    let ask = field(pair.a.as_slice(), 0, "a")?;
    let bid = field(pair.b.as_slice(), 0, "b")?;
    let mid = (ask + bid) / 2.0;
    let trend = if mid > vwap { Trend::Up } else { Trend::Down };
    Ok((vwap, trend))
}

pub struct PriceSource {
    http: HttpClient,
    cache_path: PathBuf,
    snapshot: PriceSnapshot,
    errors: ErrorCounter,
}

impl PriceSource {
    pub fn new(http: HttpClient, cache_path: PathBuf) -> Self {
        Self {
            http,
            cache_path,
            snapshot: PriceSnapshot::default(),
            errors: ErrorCounter::default(),
        }
    }

    fn fetch(&mut self) -> Result<()> {
        let raw = self.http.get_text(TICKER_URL)?;
        let (price, trend) = parse_ticker(&raw)?;
        self.snapshot = PriceSnapshot {
            price: Some(price),
            trend,
            from_cache: false,
        };
        self.write_cache(&raw);
        Ok(())
    }

    fn write_cache(&self, raw: &str) {
        if let Some(parent) = self.cache_path.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            eprintln!("[BTM-SOURCE] price cache dir {}: {e}", parent.display());
            return;
        }
        if let Err(e) = fs::write(&self.cache_path, raw) {
            eprintln!(
                "[BTM-SOURCE] price cache write {}: {e}",
                self.cache_path.display()
            );
        }
    }

    /// Fall back to the cached response; keep the current snapshot if the
    /// cache is missing or unreadable.
    fn load_cache(&mut self) {
        let Ok(raw) = fs::read_to_string(&self.cache_path) else {
            return;
        };
        match parse_ticker(&raw) {
            Ok((price, trend)) => {
                self.snapshot = PriceSnapshot {
                    price: Some(price),
                    trend,
                    from_cache: true,
                };
            }
            Err(e) => eprintln!("[BTM-SOURCE] price cache unreadable: {e}"),
        }
    }
}

impl DataSource for PriceSource {
    type Snapshot = PriceSnapshot;

    fn name(&self) -> &'static str {
        "price"
    }

    fn refresh(&mut self) -> RefreshOutcome {
        let result = self.fetch();
        if result.is_err() {
            self.load_cache();
        }
        let name = self.name();
        self.errors.record(name, result)
    }

    fn error_count(&self) -> u64 {
        self.errors.count()
    }

    fn snapshot(&self) -> &PriceSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"error":[],"result":{"XXBTZUSD":{
        "a":["64010.10000","1","1.000"],
        "b":["64000.00000","2","2.000"],
        "c":["64005.00000","0.01"],
        "v":["1000.0","2000.0"],
        "p":["63900.00000","63500.25000"],
        "t":[1000,2000],
        "l":["63000.0","62000.0"],
        "h":["65000.0","66000.0"],
        "o":"63800.0"}}}"#;

    #[test]
    fn parses_vwap_and_trend() {
        let (price, trend) = parse_ticker(SAMPLE).unwrap();
        assert!((price - 63_500.25).abs() < f64::EPSILON);
        assert_eq!(trend, Trend::Up);
    }

    #[test]
    fn midpoint_below_vwap_is_down() {
        let raw = SAMPLE.replace("63500.25000", "70000.00000");
        let (_, trend) = parse_ticker(&raw).unwrap();
        assert_eq!(trend, Trend::Down);
    }

    #[test]
    fn api_error_is_reported() {
        let raw = r#"{"error":["EQuery:Unknown asset pair"],"result":{}}"#;
        let err = parse_ticker(raw).unwrap_err();
        assert_eq!(err.code(), "BTM-2101");
        assert!(err.to_string().contains("Unknown asset pair"));
    }

    #[test]
    fn missing_pair_is_error() {
        assert!(parse_ticker(r#"{"error":[],"result":{}}"#).is_err());
    }

    #[test]
    fn cache_fallback_supplies_price() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("price_cache.json");
        fs::write(&cache, SAMPLE).unwrap();

        let mut source = PriceSource::new(HttpClient::new().unwrap(), cache);
        source.load_cache();
        let snap = source.snapshot();
        assert!(snap.from_cache);
        assert_eq!(snap.trend, Trend::Up);
        assert!(snap.price.is_some());
        assert_eq!(source.error_count(), 0);
    }

    #[test]
    fn trend_glyphs() {
        assert_eq!(Trend::Up.glyph(), '^');
        assert_eq!(Trend::Down.glyph(), 'v');
        assert_eq!(Trend::Unknown.glyph(), '-');
    }
}
