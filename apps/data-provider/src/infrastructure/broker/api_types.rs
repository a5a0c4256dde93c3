//! Broker gateway request and response types.
//!
//! These types map directly to the session gateway's REST format.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Session
// ============================================================================

/// Login request.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    /// API key.
    pub api_key: &'a str,
    /// Secret key.
    pub secret_key: &'a str,
    /// Log in to the simulation environment.
    pub simulation: bool,
}

/// Login response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    /// Session token for subsequent requests.
    pub token: String,
}

/// Certificate activation request.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateCaRequest<'a> {
    /// Certificate path on the gateway host.
    pub ca_path: &'a str,
    /// Certificate password.
    pub ca_password: &'a str,
}

// ============================================================================
// Market Data
// ============================================================================

/// Intraday kbar request.
#[derive(Debug, Clone, Serialize)]
pub struct KbarsRequest<'a> {
    /// Contract code.
    pub code: &'a str,
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
}

/// Scanner request.
#[derive(Debug, Clone, Serialize)]
pub struct ScannerRequest {
    /// Scanner name.
    pub scanner_type: &'static str,
    /// Trading date.
    pub date: NaiveDate,
    /// Maximum rows.
    pub count: u32,
    /// Rank ascending instead of descending.
    pub ascending: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// Error body returned by the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayErrorResponse {
    /// Human readable message.
    #[serde(default, alias = "detail")]
    pub message: Option<String>,
}
