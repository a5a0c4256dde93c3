//! HTTP request DTOs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const fn default_scanner_count() -> u32 {
    100
}

/// Request for historical daily bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRequest {
    /// Symbols to fetch.
    pub symbols: Vec<String>,
    /// First day, inclusive (`YYYY-MM-DD`).
    pub start_date: NaiveDate,
    /// Last day, inclusive (`YYYY-MM-DD`).
    pub end_date: NaiveDate,
}

/// Request for a market scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerRequest {
    /// Scanner name, matched exactly.
    pub scanner_type: String,
    /// Trading date (`YYYY-MM-DD`).
    pub date: NaiveDate,
    /// Maximum rows.
    #[serde(default = "default_scanner_count")]
    pub count: u32,
    /// Rank ascending instead of descending.
    #[serde(default)]
    pub ascending: bool,
}
