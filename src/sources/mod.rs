//! Network data sources polled by the tick loop.
//!
//! Each source owns its error counter: reset to zero by a successful refresh,
//! bumped by one on failure. A failed refresh keeps the previous snapshot.

#![allow(missing_docs)]

pub mod block;
pub mod fees;
pub mod http;
pub mod price;

use crate::core::errors::Result;

pub use block::{BlockSnapshot, BlockSource};
pub use fees::{FeeSnapshot, FeeSource};
pub use http::HttpClient;
pub use price::{PriceSnapshot, PriceSource, Trend};

/// Result of one refresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub ok: bool,
    /// Change applied to the source's error counter: `+1` on failure, minus
    /// the previous count on success.
    pub error_delta: i64,
    /// Error code and message when the refresh failed.
    pub failure: Option<(&'static str, String)>,
}

/// A refreshable record with an error counter.
pub trait DataSource {
    type Snapshot;

    fn name(&self) -> &'static str;
    fn refresh(&mut self) -> RefreshOutcome;
    fn error_count(&self) -> u64;
    fn snapshot(&self) -> &Self::Snapshot;
}

/// Per-source error tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorCounter {
    count: u64,
}

impl ErrorCounter {
    pub const fn count(self) -> u64 {
        self.count
    }

    /// Apply a fetch result: reset on success, `+1` on failure.
    pub fn record(&mut self, source: &str, result: Result<()>) -> RefreshOutcome {
        match result {
            Ok(()) => {
                let delta = -i64::try_from(self.count).unwrap_or(i64::MAX);
                self.count = 0;
                RefreshOutcome {
                    ok: true,
                    error_delta: delta,
                    failure: None,
                }
            }
            Err(err) => {
                self.count = self.count.saturating_add(1);
                if err.is_retryable() {
                    eprintln!("[BTM-SOURCE] {source} refresh failed ({}): {err}", self.count);
                } else {
                    eprintln!(
                        "[BTM-SOURCE] {source} refresh failed ({}), unexpected response: {err}",
                        self.count
                    );
                }
                RefreshOutcome {
                    ok: false,
                    error_delta: 1,
                    failure: Some((err.code(), err.to_string())),
                }
            }
        }
    }
}

pub type BoxedSource<S> = Box<dyn DataSource<Snapshot = S>>;

/// The three sources the screens draw from.
pub struct SourceSet {
    pub block: BoxedSource<BlockSnapshot>,
    pub fees: BoxedSource<FeeSnapshot>,
    pub price: BoxedSource<PriceSnapshot>,
}

impl SourceSet {
    pub fn new(
        block: BoxedSource<BlockSnapshot>,
        fees: BoxedSource<FeeSnapshot>,
        price: BoxedSource<PriceSnapshot>,
    ) -> Self {
        Self { block, fees, price }
    }

    /// Live sources backed by one shared HTTP client.
    pub fn live(price_cache: std::path::PathBuf) -> Result<Self> {
        let http = HttpClient::new()?;
        Ok(Self::new(
            Box::new(BlockSource::new(http.clone())),
            Box::new(FeeSource::new(http.clone())),
            Box::new(PriceSource::new(http, price_cache)),
        ))
    }

    /// Refresh block metadata then fees.
    pub fn refresh_chain(&mut self) -> [(&'static str, RefreshOutcome); 2] {
        [
            (self.block.name(), self.block.refresh()),
            (self.fees.name(), self.fees.refresh()),
        ]
    }

    pub fn refresh_price(&mut self) -> (&'static str, RefreshOutcome) {
        (self.price.name(), self.price.refresh())
    }

    /// Current counters, for the breaker.
    pub fn error_counts(&self) -> [u64; 3] {
        [
            self.block.error_count(),
            self.fees.error_count(),
            self.price.error_count(),
        ]
    }

    /// Named counters, for status output.
    pub fn error_report(&self) -> [(&'static str, u64); 3] {
        [
            (self.block.name(), self.block.error_count()),
            (self.fees.name(), self.fees.error_count()),
            (self.price.name(), self.price.error_count()),
        ]
    }
}
