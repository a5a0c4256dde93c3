//! Bar Aggregator
//!
//! Fans a historical request out to one tick fetch per symbol and reduces each
//! symbol's ticks to daily bars.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{FixedOffset, NaiveDate};
use futures::future::join_all;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::application::ports::{SessionGate, TickSource};
use crate::domain::bars::{DailyBar, aggregate_daily};
use crate::infrastructure::metrics;

/// Daily bars keyed by symbol. Every requested symbol is present.
pub type FetchResult = BTreeMap<String, Vec<DailyBar>>;

/// Errors fetching historical bars.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No live broker session could be obtained.
    #[error("broker session unavailable")]
    Unavailable,
}

/// Historical daily bar service.
pub struct BarAggregator {
    gate: Arc<dyn SessionGate>,
    source: Arc<dyn TickSource>,
    market_offset: FixedOffset,
}

impl BarAggregator {
    /// Create an aggregator bucketing ticks into days at `market_offset`.
    #[must_use]
    pub fn new(
        gate: Arc<dyn SessionGate>,
        source: Arc<dyn TickSource>,
        market_offset: FixedOffset,
    ) -> Self {
        Self {
            gate,
            source,
            market_offset,
        }
    }

    /// Fetch daily bars for `symbols` between `start` and `end` inclusive.
    ///
    /// Duplicate symbols collapse. A symbol whose fetch fails maps to an empty
    /// vector; the call itself still succeeds.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Unavailable` when no live session can be obtained.
    /// No symbol is requested in that case.
    pub async fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, FetchError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("fetch_historical", %request_id, symbols = symbols.len());

        async move {
            if !self.gate.ensure_live().await {
                tracing::warn!("Broker session unavailable, rejecting historical fetch");
                return Err(FetchError::Unavailable);
            }

            let started = Instant::now();
            let distinct: BTreeSet<&str> = symbols.iter().map(String::as_str).collect();

            let fetches = distinct.into_iter().map(|symbol| async move {
                let ticks = self.source.fetch_ticks(symbol, start, end).await;
                let bars = aggregate_daily(&ticks, self.market_offset);
                if bars.is_empty() {
                    tracing::warn!(symbol, %start, %end, "No bars for symbol");
                } else {
                    tracing::debug!(symbol, ticks = ticks.len(), bars = bars.len(), "Aggregated");
                }
                (symbol.to_string(), bars)
            });

            let result: FetchResult = join_all(fetches).await.into_iter().collect();

            metrics::record_fetch_duration(started.elapsed());
            tracing::info!(
                symbols = result.len(),
                elapsed_ms = started.elapsed().as_millis(),
                "Historical fetch complete"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for BarAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarAggregator")
            .field("market_offset", &self.market_offset)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
