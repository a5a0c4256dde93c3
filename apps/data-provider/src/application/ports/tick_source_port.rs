//! Tick Source Port
//!
//! Per-symbol source of intraday ticks feeding the bar aggregator.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::bars::RawTick;

/// Port yielding a symbol's intraday ticks.
///
/// Implementations absorb their own failures: a symbol that cannot be fetched
/// yields an empty sequence.
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Fetch ticks for `symbol` between `start` and `end` inclusive.
    async fn fetch_ticks(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawTick>;
}
