//! Broker Port (Driven Port)
//!
//! Interface to the vendor broker session. Every call is fallible and may block
//! for an unbounded time unless the caller applies its own timeout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::bars::KbarSeries;
use crate::domain::market::{Position, ScannerItem, ScannerType};

/// Callback through which the broker delivers a kbar request's result.
///
/// The broker may invoke it at any later time, or never.
pub type KbarCallback = Arc<dyn Fn(KbarSeries) + Send + Sync>;

/// Position as reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPosition {
    /// Stock code.
    pub code: String,
    /// Held quantity.
    pub quantity: i64,
    /// Average entry price.
    pub price: Decimal,
    /// Latest traded price.
    pub last_price: Decimal,
    /// Unrealized profit and loss.
    pub pnl: Decimal,
}

impl From<BrokerPosition> for Position {
    fn from(position: BrokerPosition) -> Self {
        Self {
            code: position.code,
            quantity: position.quantity,
            avg_price: position.price,
            current_price: position.last_price,
            unrealized_pnl: position.pnl,
        }
    }
}

/// Connection usage reported by the broker; doubles as the liveness probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUsage {
    /// Open connections for this account.
    pub connections: u32,
    /// Bytes transferred today.
    pub bytes: u64,
    /// Daily byte allowance.
    pub limit_bytes: u64,
    /// Bytes left in today's allowance.
    pub remaining_bytes: u64,
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Connection error.
    #[error("broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Login rejected.
    #[error("broker authentication failed: {message}")]
    AuthenticationFailed {
        /// Rejection reason.
        message: String,
    },

    /// Client certificate could not be activated.
    #[error("certificate activation failed: {message}")]
    CertificateRejected {
        /// Rejection reason.
        message: String,
    },

    /// The session has no valid login.
    #[error("broker session is not logged in")]
    NotLoggedIn,

    /// No contract exists for the symbol.
    #[error("unknown contract: {symbol}")]
    UnknownContract {
        /// The unresolved symbol.
        symbol: String,
    },

    /// Unknown error.
    #[error("broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

/// Port for the authenticated broker session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerSession: Send + Sync {
    /// Authenticate with the API key pair.
    async fn login(&self, api_key: &str, secret_key: &str) -> Result<(), BrokerError>;

    /// Activate the client certificate for the logged-in session.
    async fn activate_ca(&self, ca_path: &Path, ca_password: &str) -> Result<(), BrokerError>;

    /// Cheap read used to confirm the session is alive.
    async fn usage(&self) -> Result<SessionUsage, BrokerError>;

    /// List open stock positions.
    async fn list_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Request intraday kbars for `symbol` between `start` and `end` inclusive.
    ///
    /// Returning `Ok` only means the request was issued; the data arrives later
    /// through `callback`, if at all.
    async fn kbars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeout: Duration,
        callback: KbarCallback,
    ) -> Result<(), BrokerError>;

    /// Run a market scanner.
    async fn scanners(
        &self,
        scanner_type: ScannerType,
        date: NaiveDate,
        count: u32,
        ascending: bool,
    ) -> Result<Vec<ScannerItem>, BrokerError>;
}
