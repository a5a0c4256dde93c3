//! Daily Bar Types
//!
//! Domain types for turning the broker's intraday kbar series into one
//! OHLCV record per trading day.
//!
//! # Reduction Rules
//!
//! Ticks are bucketed by the calendar date of their timestamp in the market's
//! UTC offset, sorted by timestamp within each bucket, and reduced:
//!
//! - `open`: the first tick's open
//! - `high` / `low`: extrema over the ticks that carry a value
//! - `close`: the last tick's close
//! - `volume`: sum over the ticks that carry a value
//! - `ts`: the last tick's timestamp in whole seconds

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NANOS_PER_SEC: i64 = 1_000_000_000;

// =============================================================================
// Raw Ticks
// =============================================================================

/// One intraday sample from the broker's kbar series.
///
/// Only the timestamp and close are guaranteed; the remaining fields are
/// absent when the broker omits the corresponding column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    /// Nanosecond epoch timestamp.
    pub ts: i64,
    /// Close price.
    pub close: f64,
    /// Open price.
    pub open: Option<f64>,
    /// High price.
    pub high: Option<f64>,
    /// Low price.
    pub low: Option<f64>,
    /// Traded volume.
    pub volume: Option<i64>,
}

impl RawTick {
    /// Create a tick carrying only a timestamp and close.
    #[must_use]
    pub const fn new(ts: i64, close: f64) -> Self {
        Self {
            ts,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }

    /// Attach open, high, low and volume.
    #[must_use]
    pub const fn with_ohlv(mut self, open: f64, high: f64, low: f64, volume: i64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self.volume = Some(volume);
        self
    }

    /// Timestamp truncated to whole seconds.
    #[must_use]
    pub const fn ts_secs(&self) -> i64 {
        self.ts.div_euclid(NANOS_PER_SEC)
    }

    /// Calendar date of this tick in the given market offset.
    ///
    /// Returns `None` when the timestamp is outside chrono's representable range.
    #[must_use]
    pub fn trading_date(&self, offset: FixedOffset) -> Option<NaiveDate> {
        let nanos = u32::try_from(self.ts.rem_euclid(NANOS_PER_SEC)).ok()?;
        DateTime::from_timestamp(self.ts_secs(), nanos)
            .map(|dt| dt.with_timezone(&offset).date_naive())
    }
}

// =============================================================================
// Vendor Kbar Payload
// =============================================================================

/// Columnar kbar payload as delivered by the broker.
///
/// `ts` and `Close` are required; the other columns may be missing entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KbarSeries {
    /// Nanosecond timestamps.
    #[serde(default)]
    pub ts: Option<Vec<i64>>,
    /// Close prices.
    #[serde(default, rename = "Close")]
    pub close: Option<Vec<f64>>,
    /// Open prices.
    #[serde(default, rename = "Open")]
    pub open: Option<Vec<f64>>,
    /// High prices.
    #[serde(default, rename = "High")]
    pub high: Option<Vec<f64>>,
    /// Low prices.
    #[serde(default, rename = "Low")]
    pub low: Option<Vec<f64>>,
    /// Volumes.
    #[serde(default, rename = "Volume")]
    pub volume: Option<Vec<i64>>,
}

/// Errors decoding a [`KbarSeries`] into ticks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required column is missing.
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),

    /// The series carries no samples.
    #[error("kbar series is empty")]
    Empty,

    /// Required columns disagree on the number of samples.
    #[error("column length mismatch: ts has {ts} entries, Close has {close}")]
    LengthMismatch {
        /// Length of the `ts` column.
        ts: usize,
        /// Length of the `Close` column.
        close: usize,
    },
}

impl KbarSeries {
    /// Decode the columnar payload into row-oriented ticks.
    ///
    /// An optional column shorter than `ts` leaves the trailing ticks without
    /// that field.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` when `ts` or `Close` is missing, empty, or the two
    /// differ in length.
    pub fn into_ticks(self) -> Result<Vec<RawTick>, DecodeError> {
        let ts = self.ts.ok_or(DecodeError::MissingColumn("ts"))?;
        let close = self.close.ok_or(DecodeError::MissingColumn("Close"))?;

        if ts.is_empty() || close.is_empty() {
            return Err(DecodeError::Empty);
        }
        if ts.len() != close.len() {
            return Err(DecodeError::LengthMismatch {
                ts: ts.len(),
                close: close.len(),
            });
        }

        let price_at = |column: &Option<Vec<f64>>, i: usize| {
            column.as_ref().and_then(|values| values.get(i).copied())
        };

        Ok(ts
            .iter()
            .zip(&close)
            .enumerate()
            .map(|(i, (&ts, &close))| RawTick {
                ts,
                close,
                open: price_at(&self.open, i),
                high: price_at(&self.high, i),
                low: price_at(&self.low, i),
                volume: self
                    .volume
                    .as_ref()
                    .and_then(|values| values.get(i).copied()),
            })
            .collect())
    }
}

// =============================================================================
// Daily Bars
// =============================================================================

/// One trading day's OHLCV record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date (`YYYY-MM-DD`).
    pub date: NaiveDate,
    /// Last tick's timestamp in epoch seconds.
    pub ts: i64,
    /// First tick's open.
    pub open: Option<f64>,
    /// Highest high of the day.
    pub high: Option<f64>,
    /// Lowest low of the day.
    pub low: Option<f64>,
    /// Last tick's close.
    pub close: f64,
    /// Total volume of the day.
    pub volume: Option<i64>,
}

/// Reduce a symbol's ticks into daily bars in ascending date order.
///
/// Input order does not matter. Ticks whose timestamp cannot be mapped to a
/// date are dropped.
#[must_use]
pub fn aggregate_daily(ticks: &[RawTick], offset: FixedOffset) -> Vec<DailyBar> {
    let mut buckets: BTreeMap<NaiveDate, Vec<RawTick>> = BTreeMap::new();

    for tick in ticks {
        if let Some(date) = tick.trading_date(offset) {
            buckets.entry(date).or_default().push(*tick);
        } else {
            tracing::warn!(ts = tick.ts, "Dropping tick with unrepresentable timestamp");
        }
    }

    buckets
        .into_iter()
        .filter_map(|(date, mut day)| {
            day.sort_by_key(|tick| tick.ts);
            reduce_day(date, &day)
        })
        .collect()
}

fn reduce_day(date: NaiveDate, ticks: &[RawTick]) -> Option<DailyBar> {
    let first = ticks.first()?;
    let last = ticks.last()?;

    let present = |value: Option<f64>| value.filter(|v| !v.is_nan());
    let high = ticks
        .iter()
        .filter_map(|tick| present(tick.high))
        .reduce(f64::max);
    let low = ticks
        .iter()
        .filter_map(|tick| present(tick.low))
        .reduce(f64::min);
    let volume = ticks
        .iter()
        .filter_map(|tick| tick.volume)
        .reduce(i64::saturating_add);

    Some(DailyBar {
        date,
        ts: last.ts_secs(),
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;

    const SECOND: i64 = NANOS_PER_SEC;
    const MINUTE: i64 = 60 * SECOND;
    const DAY: i64 = 24 * 60 * MINUTE;
    /// 2025-01-01T00:00:00Z in nanoseconds.
    const JAN_1: i64 = 1_735_689_600 * SECOND;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn two_ticks_same_day_reduce_to_one_bar() {
        let ticks = [
            RawTick::new(JAN_1 + 9 * 60 * MINUTE, 500.0).with_ohlv(495.0, 505.0, 490.0, 10_000),
            RawTick::new(JAN_1 + 9 * 60 * MINUTE + MINUTE, 510.0)
                .with_ohlv(500.0, 515.0, 498.0, 12_000),
        ];

        let bars = aggregate_daily(&ticks, utc());

        assert_eq!(bars.len(), 1);
        let bar = &bars[0];
        assert_eq!(bar.date, date("2025-01-01"));
        assert_eq!(bar.open, Some(495.0));
        assert_eq!(bar.high, Some(515.0));
        assert_eq!(bar.low, Some(490.0));
        assert_eq!(bar.close, 510.0);
        assert_eq!(bar.volume, Some(22_000));
        assert_eq!(bar.ts, ticks[1].ts / SECOND);
    }

    #[test]
    fn unordered_ticks_use_chronological_open_and_close() {
        let ticks = [
            RawTick::new(JAN_1 + 3 * MINUTE, 103.0).with_ohlv(102.0, 104.0, 101.0, 3),
            RawTick::new(JAN_1 + MINUTE, 101.0).with_ohlv(100.0, 102.0, 99.0, 1),
            RawTick::new(JAN_1 + 2 * MINUTE, 102.0).with_ohlv(101.0, 103.0, 100.0, 2),
        ];

        let bars = aggregate_daily(&ticks, utc());

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, Some(100.0));
        assert_eq!(bars[0].close, 103.0);
        assert_eq!(bars[0].volume, Some(6));
    }

    #[test]
    fn absent_fields_are_ignored_in_extrema_and_volume() {
        let ticks = [
            RawTick::new(JAN_1, 10.0),
            RawTick {
                high: Some(12.0),
                volume: Some(5),
                ..RawTick::new(JAN_1 + MINUTE, 11.0)
            },
            RawTick {
                low: Some(9.0),
                ..RawTick::new(JAN_1 + 2 * MINUTE, 10.5)
            },
        ];

        let bars = aggregate_daily(&ticks, utc());

        assert_eq!(bars[0].open, None);
        assert_eq!(bars[0].high, Some(12.0));
        assert_eq!(bars[0].low, Some(9.0));
        assert_eq!(bars[0].close, 10.5);
        assert_eq!(bars[0].volume, Some(5));
    }

    #[test]
    fn day_without_any_volume_has_no_volume() {
        let bars = aggregate_daily(&[RawTick::new(JAN_1, 1.0)], utc());
        assert_eq!(bars[0].volume, None);
        assert_eq!(bars[0].high, None);
    }

    #[test]
    fn ticks_on_separate_days_produce_ascending_bars() {
        let ticks = [
            RawTick::new(JAN_1 + 2 * DAY, 3.0),
            RawTick::new(JAN_1, 1.0),
            RawTick::new(JAN_1 + DAY, 2.0),
        ];

        let bars = aggregate_daily(&ticks, utc());

        let dates: Vec<_> = bars.iter().map(|b| b.date).collect();
        assert_eq!(
            dates,
            vec![date("2025-01-01"), date("2025-01-02"), date("2025-01-03")]
        );
        assert_eq!(bars[2].close, 3.0);
    }

    #[test]
    fn market_offset_shifts_date_boundary() {
        // 2025-01-01T20:00Z is already 2025-01-02 at UTC+8.
        let tick = RawTick::new(JAN_1 + 20 * 60 * MINUTE, 1.0);
        let taipei = FixedOffset::east_opt(8 * 3600).unwrap();

        assert_eq!(tick.trading_date(utc()), Some(date("2025-01-01")));
        assert_eq!(tick.trading_date(taipei), Some(date("2025-01-02")));
    }

    #[test]
    fn empty_input_produces_no_bars() {
        assert!(aggregate_daily(&[], utc()).is_empty());
    }

    #[test]
    fn daily_bar_serializes_date_as_iso_string() {
        let bars = aggregate_daily(&[RawTick::new(JAN_1, 500.0)], utc());
        let json = serde_json::to_value(&bars[0]).unwrap();
        assert_eq!(json["date"], "2025-01-01");
        assert_eq!(json["close"], 500.0);
        assert_eq!(json["ts"], 1_735_689_600);
    }

    #[test]
    fn decode_full_series() {
        let series = KbarSeries {
            ts: Some(vec![JAN_1, JAN_1 + DAY, JAN_1 + 2 * DAY]),
            close: Some(vec![500.0, 510.0, 520.0]),
            open: Some(vec![495.0, 505.0, 515.0]),
            high: Some(vec![505.0, 515.0, 525.0]),
            low: Some(vec![490.0, 500.0, 510.0]),
            volume: Some(vec![10_000, 12_000, 15_000]),
        };

        let ticks = series.into_ticks().unwrap();

        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].open, Some(495.0));
        assert_eq!(ticks[2].close, 520.0);
        assert_eq!(ticks[1].volume, Some(12_000));
    }

    #[test]
    fn decode_short_optional_column_leaves_gaps() {
        let series = KbarSeries {
            ts: Some(vec![JAN_1, JAN_1 + MINUTE]),
            close: Some(vec![1.0, 2.0]),
            open: Some(vec![0.5]),
            ..KbarSeries::default()
        };

        let ticks = series.into_ticks().unwrap();

        assert_eq!(ticks[0].open, Some(0.5));
        assert_eq!(ticks[1].open, None);
        assert_eq!(ticks[1].high, None);
    }

    #[test]
    fn decode_rejects_missing_and_empty_columns() {
        let missing_ts = KbarSeries {
            close: Some(vec![1.0]),
            ..KbarSeries::default()
        };
        assert_eq!(
            missing_ts.into_ticks(),
            Err(DecodeError::MissingColumn("ts"))
        );

        let empty = KbarSeries {
            ts: Some(vec![]),
            close: Some(vec![]),
            ..KbarSeries::default()
        };
        assert_eq!(empty.into_ticks(), Err(DecodeError::Empty));

        let mismatched = KbarSeries {
            ts: Some(vec![JAN_1, JAN_1 + MINUTE]),
            close: Some(vec![1.0]),
            ..KbarSeries::default()
        };
        assert_eq!(
            mismatched.into_ticks(),
            Err(DecodeError::LengthMismatch { ts: 2, close: 1 })
        );
    }

    #[test]
    fn decode_vendor_json_column_names() {
        let json = r#"{"ts":[1735689600000000000],"Close":[500.0],"Volume":[10]}"#;
        let series: KbarSeries = serde_json::from_str(json).unwrap();
        let ticks = series.into_ticks().unwrap();
        assert_eq!(ticks, vec![RawTick {
            volume: Some(10),
            ..RawTick::new(JAN_1, 500.0)
        }]);
    }

    fn arb_tick(days: i64) -> impl Strategy<Value = RawTick> {
        (0..days, 0..(24 * 60i64), 1.0..1000.0f64, 0.0..10.0f64, 0..10_000i64).prop_map(
            |(day, minute, close, spread, volume)| {
                RawTick::new(JAN_1 + day * DAY + minute * MINUTE, close).with_ohlv(
                    close,
                    close + spread,
                    close - spread,
                    volume,
                )
            },
        )
    }

    proptest! {
        #[test]
        fn one_bar_per_distinct_date_in_ascending_order(
            ticks in prop::collection::vec(arb_tick(10), 1..200)
        ) {
            let distinct: BTreeSet<NaiveDate> = ticks
                .iter()
                .filter_map(|t| t.trading_date(utc()))
                .collect();

            let bars = aggregate_daily(&ticks, utc());

            prop_assert_eq!(bars.len(), distinct.len());
            prop_assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
        }

        #[test]
        fn open_and_close_follow_chronology(
            ticks in prop::collection::vec(arb_tick(1), 1..100)
        ) {
            // Ties keep input order, so the first minimum and last maximum win.
            let first = ticks.iter().min_by_key(|t| t.ts).unwrap();
            let last = ticks.iter().max_by_key(|t| t.ts).unwrap();

            let bars = aggregate_daily(&ticks, utc());

            prop_assert_eq!(bars.len(), 1);
            prop_assert_eq!(bars[0].open, first.open);
            prop_assert_eq!(bars[0].close, last.close);
        }

        #[test]
        fn extrema_bound_open_and_close(
            ticks in prop::collection::vec(arb_tick(3), 1..100)
        ) {
            for bar in aggregate_daily(&ticks, utc()) {
                let (open, high, low) = (bar.open.unwrap(), bar.high.unwrap(), bar.low.unwrap());
                prop_assert!(low <= open && open <= high);
                prop_assert!(low <= bar.close && bar.close <= high);
            }
        }
    }
}
