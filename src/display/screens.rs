//! Screen renderers: pure functions from snapshots to two display rows.

#![allow(missing_docs)]

use std::fmt::Display as FmtDisplay;

use chrono::{DateTime, TimeZone};

use crate::display::layout::{justify2, justify3};
use crate::schedule::Screen;
use crate::sources::fees::format_fee;
use crate::sources::{BlockSnapshot, FeeSnapshot, PriceSnapshot, SourceSet};

/// Header shown on the boot splash and status lines.
pub const HEADER: &str = "BTC  MON";
pub const BOOT_SPLASH: [&str; 2] = ["stay humble", "stack sats"];
pub const NEW_BLOCK_SPLASH: [&str; 2] = ["+--NEW  BLOCK--+", "|______________|"];

/// Clock and date on top, price with trend below.
pub fn clock_price<Tz>(
    now: &DateTime<Tz>,
    time_format: u32,
    price: &PriceSnapshot,
    cols: usize,
) -> [String; 2]
where
    Tz: TimeZone,
    Tz::Offset: FmtDisplay,
{
    let time_fmt = if time_format == 12 { "%I:%M" } else { "%H:%M" };
    let clock = now.format(time_fmt).to_string();
    let date = now.format("%m-%d-%Y").to_string();

    let price_text = price.price.map_or_else(
        || format!("$--{}", price.trend.glyph()),
        |p| format!("${p:.2}{}", price.trend.glyph()),
    );
    let tag = if price.from_cache { "C24" } else { "L24" };

    [
        justify2(&clock, &date, cols),
        justify2(&price_text, tag, cols),
    ]
}

/// Height and age on top, the widest fee line that fits below.
pub fn block_fees(block: &BlockSnapshot, fees: &FeeSnapshot, cols: usize) -> [String; 2] {
    let height = if block.hash.is_some() {
        block.height.to_string()
    } else {
        "?".to_string()
    };
    let top = justify2(&height, &format!("{} min", block.minutes_ago), cols);

    let (high, mid, low) = (
        format_fee(fees.fastest),
        format_fee(fees.half_hour),
        format_fee(fees.hour),
    );
    let bare = format!("{high} {mid} {low}");
    let labeled = |label: &str, values: &str| {
        (label.chars().count() + values.chars().count() < cols)
            .then(|| justify2(label, values, cols))
    };
    let spread = |a: &str, b: &str, c: &str| {
        let used = a.chars().count() + b.chars().count() + c.chars().count();
        (used + 2 <= cols).then(|| justify3(a, b, c, cols))
    };
    // Most descriptive first; every candidate that fits fills the row, so the
    // first fitting one wins.
    let tagged = [format!("H{high}"), format!("M{mid}"), format!("L{low}")];
    let candidates = [
        labeled("sat/vB", tagged.join(" ").as_str()),
        labeled("sat/vB", bare.as_str()),
        labeled("s/vB", bare.as_str()),
        spread(tagged[0].as_str(), tagged[1].as_str(), tagged[2].as_str()),
        spread(high.as_str(), mid.as_str(), low.as_str()),
    ];
    let bottom = candidates
        .into_iter()
        .flatten()
        .next()
        .unwrap_or(bare);

    [top, bottom]
}

/// Render `screen` from the sources' latest snapshots.
pub fn render<Tz>(
    screen: Screen,
    sources: &SourceSet,
    now: &DateTime<Tz>,
    time_format: u32,
    cols: usize,
) -> [String; 2]
where
    Tz: TimeZone,
    Tz::Offset: FmtDisplay,
{
    match screen {
        Screen::ClockPrice => clock_price(now, time_format, sources.price.snapshot(), cols),
        Screen::BlockFees => block_fees(sources.block.snapshot(), sources.fees.snapshot(), cols),
    }
}
