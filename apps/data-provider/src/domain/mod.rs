//! Domain Layer - Core market data types and business logic.
//!
//! This layer contains the bar reduction rules and the value types exchanged
//! with callers and the broker. Nothing here performs I/O.

/// Intraday ticks, the vendor kbar payload, and daily bar reduction.
pub mod bars;

/// Positions and market scanner records.
pub mod market;

/// Broker login credentials and client certificate.
pub mod session;
