//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the broker.

/// Port interfaces for the broker session, liveness, and tick sources.
pub mod ports;

/// Session guardian, callback bridge, and bar aggregator.
pub mod services;
