//! HTTP response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::market::{Position, ScannerItem};

/// Open positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsResponse {
    /// Positions as reported by the broker.
    pub positions: Vec<Position>,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// Scanner rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerResponse {
    /// Ranked rows.
    pub data: Vec<ScannerItem>,
    /// When the scan was taken.
    pub timestamp: DateTime<Utc>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` while the process serves requests.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Last successful broker login.
    pub last_login_time: Option<DateTime<Utc>>,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable cause.
    pub detail: String,
}
