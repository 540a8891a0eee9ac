//! Chain tip metadata from mempool.space.

#![allow(missing_docs)]

use serde::Deserialize;

use crate::core::errors::Result;
use crate::sources::http::HttpClient;
use crate::sources::{DataSource, ErrorCounter, RefreshOutcome};

const TIP_HASH_URL: &str = "https://mempool.space/api/blocks/tip/hash";
const BLOCK_URL: &str = "https://mempool.space/api/block";

/// Latest block as shown on the block/fees screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSnapshot {
    pub hash: Option<String>,
    pub height: u64,
    /// Block header time, epoch seconds.
    pub timestamp: i64,
    pub minutes_ago: u64,
    /// Set by the refresh that saw the tip change; cleared by the next one.
    pub is_new_block: bool,
}

/// Response of `/api/block/{hash}`; fields we do not show are ignored.
#[derive(Debug, Deserialize)]
struct BlockMeta {
    id: String,
    height: u64,
    timestamp: i64,
}

/// `max(0, round((now - timestamp) / 60))`.
#[must_use]
pub fn minutes_ago(now: i64, timestamp: i64) -> u64 {
    let delta = now.saturating_sub(timestamp);
    if delta <= 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (delta as f64 / 60.0).round() as u64
    }
}

pub struct BlockSource {
    http: HttpClient,
    snapshot: BlockSnapshot,
    errors: ErrorCounter,
}

impl BlockSource {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            snapshot: BlockSnapshot::default(),
            errors: ErrorCounter::default(),
        }
    }

    fn fetch(&mut self, now: i64) -> Result<()> {
        let tip = self.http.get_text(TIP_HASH_URL)?;
        if self.snapshot.hash.as_deref() == Some(tip.as_str()) {
            self.snapshot.is_new_block = false;
        } else {
            let meta: BlockMeta = self.http.get_json(&format!("{BLOCK_URL}/{tip}"))?;
            self.snapshot.hash = Some(meta.id);
            self.snapshot.height = meta.height;
            self.snapshot.timestamp = meta.timestamp;
            self.snapshot.is_new_block = true;
        }
        self.snapshot.minutes_ago = minutes_ago(now, self.snapshot.timestamp);
        Ok(())
    }
}

impl DataSource for BlockSource {
    type Snapshot = BlockSnapshot;

    fn name(&self) -> &'static str {
        "block"
    }

    fn refresh(&mut self) -> RefreshOutcome {
        let now = chrono::Utc::now().timestamp();
        let result = self.fetch(now);
        if result.is_err() {
            self.snapshot.is_new_block = false;
        }
        let name = self.name();
        self.errors.record(name, result)
    }

    fn error_count(&self) -> u64 {
        self.errors.count()
    }

    fn snapshot(&self) -> &BlockSnapshot {
        &self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_ago_rounds_and_clamps() {
        assert_eq!(minutes_ago(1_000, 1_000), 0);
        assert_eq!(minutes_ago(1_000, 2_000), 0);
        assert_eq!(minutes_ago(1_089, 1_000), 1);
        assert_eq!(minutes_ago(1_091, 1_000), 2);
        assert_eq!(minutes_ago(1_000 + 600, 1_000), 10);
    }

    #[test]
    fn block_meta_ignores_extra_fields() {
        let raw = r#"{"id":"00000000000000000001","height":840000,"version":536870912,
                      "timestamp":1713571767,"tx_count":3050}"#;
        let meta: BlockMeta = serde_json::from_str(raw).unwrap();
        assert_eq!(meta.height, 840_000);
        assert_eq!(meta.timestamp, 1_713_571_767);
        assert_eq!(meta.id, "00000000000000000001");
    }
}
