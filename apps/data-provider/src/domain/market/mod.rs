//! Market Data Types
//!
//! Positions and market scanner records served to downstream callers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Positions
// =============================================================================

/// An open stock position as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Stock code.
    pub code: String,
    /// Held quantity.
    pub quantity: i64,
    /// Average entry price.
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_price: Decimal,
    /// Latest traded price.
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    /// Unrealized profit and loss.
    #[serde(with = "rust_decimal::serde::float")]
    pub unrealized_pnl: Decimal,
}

// =============================================================================
// Scanners
// =============================================================================

/// Ranking performed by a broker-side market scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScannerType {
    /// Ranked by percentage change.
    ChangePercentRank,
    /// Ranked by absolute price change.
    ChangePriceRank,
    /// Ranked by intraday high-low range.
    DayRangeRank,
    /// Ranked by traded volume.
    VolumeRank,
    /// Ranked by traded amount.
    AmountRank,
}

impl ScannerType {
    /// Every supported scanner.
    pub const ALL: [Self; 5] = [
        Self::ChangePercentRank,
        Self::ChangePriceRank,
        Self::DayRangeRank,
        Self::VolumeRank,
        Self::AmountRank,
    ];

    /// Parse the broker's scanner name. Matching is exact.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// The broker's name for this scanner.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChangePercentRank => "ChangePercentRank",
            Self::ChangePriceRank => "ChangePriceRank",
            Self::DayRangeRank => "DayRangeRank",
            Self::VolumeRank => "VolumeRank",
            Self::AmountRank => "AmountRank",
        }
    }
}

impl std::fmt::Display for ScannerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked row returned by a market scanner.
///
/// Numeric columns are optional because scanners differ in what they fill in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScannerItem {
    /// Trading date of the snapshot.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Stock code.
    pub code: String,
    /// Stock name.
    #[serde(default)]
    pub name: String,
    /// Snapshot timestamp (nanoseconds).
    #[serde(default)]
    pub ts: Option<i64>,
    /// Open price.
    #[serde(default)]
    pub open: Option<f64>,
    /// High price.
    #[serde(default)]
    pub high: Option<f64>,
    /// Low price.
    #[serde(default)]
    pub low: Option<f64>,
    /// Latest price.
    #[serde(default)]
    pub close: Option<f64>,
    /// High minus low.
    #[serde(default)]
    pub price_range: Option<f64>,
    /// Change versus the previous close.
    #[serde(default)]
    pub change_price: Option<f64>,
    /// Direction of the change (limit up, up, unchanged, down, limit down).
    #[serde(default)]
    pub change_type: Option<String>,
    /// Volume-weighted average price.
    #[serde(default)]
    pub average_price: Option<f64>,
    /// Volume of the latest trade.
    #[serde(default)]
    pub volume: Option<i64>,
    /// Cumulative volume.
    #[serde(default)]
    pub total_volume: Option<i64>,
    /// Amount of the latest trade.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Cumulative amount.
    #[serde(default)]
    pub total_amount: Option<f64>,
    /// Previous session's volume.
    #[serde(default)]
    pub yesterday_volume: Option<i64>,
    /// Volume relative to the previous session.
    #[serde(default)]
    pub volume_ratio: Option<f64>,
    /// Value the scanner ranked on.
    #[serde(default)]
    pub rank_value: Option<f64>,
}

// =============================================================================
// Tests
// =============================================================================
