#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Data Provider - Broker Market Data Gateway
//!
//! An HTTP facade over a brokerage trading API. Downstream services fetch
//! positions, historical daily bars and market scanners without embedding
//! the broker SDK.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core data types with no I/O
//!   - `bars`: Raw ticks, vendor kbar payloads, daily reduction
//!   - `market`: Positions and scanner rows
//!   - `session`: Broker credentials
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Broker session, session gate, tick source
//!   - `services`: Session guardian, callback bridge, bar aggregator
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broker`: REST client for the broker session gateway
//!   - `http`: REST API and health probes
//!   - `config`: Environment configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! POST /api/historical
//!        |
//!        v
//! SessionGuardian.ensure_live() --(dead)--> 503
//!        |
//!        v
//! BarAggregator.fetch ---+--> CallbackBridge(symbol A) --> broker kbars --> callback
//!                        +--> CallbackBridge(symbol B) --> broker kbars --> callback
//!        |
//!        v
//! aggregate_daily per symbol --> { symbol: [DailyBar] }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core market data types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::bars::{DailyBar, KbarSeries, RawTick, aggregate_daily};
pub use domain::market::{Position, ScannerItem, ScannerType};
pub use domain::session::{CaCertificate, Credentials};

// Services
pub use application::services::{
    BarAggregator, CallbackBridge, FetchError, FetchResult, SessionError, SessionGuardian,
};

// Infrastructure config
pub use infrastructure::config::{
    BrokerSettings, ConfigError, Environment, HistoricalSettings, ProviderConfig, ServerSettings,
};

// HTTP server
pub use infrastructure::http::{AppState, HttpServer, HttpServerError, create_router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
