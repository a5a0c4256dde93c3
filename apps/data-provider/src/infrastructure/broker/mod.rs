//! Broker Gateway Adapter
//!
//! Production implementation of `BrokerSession` against the broker's REST
//! session gateway:
//! - Token-based session carried as a bearer header
//! - Simulation vs production selected at login
//! - Callback delivery of kbar responses from a spawned task

mod api_types;
mod gateway;

pub use gateway::GatewayBrokerSession;
