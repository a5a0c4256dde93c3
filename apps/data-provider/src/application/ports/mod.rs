//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//!
//! - `BrokerSession`: the vendor broker session (driven)
//! - `SessionGate`: liveness of the shared session (driven by services, consumed by handlers)
//! - `TickSource`: per-symbol intraday ticks for aggregation

mod broker_port;
mod session_gate_port;
mod tick_source_port;

#[cfg(test)]
pub use broker_port::MockBrokerSession;
pub use broker_port::{BrokerError, BrokerPosition, BrokerSession, KbarCallback, SessionUsage};
pub use session_gate_port::SessionGate;
pub use tick_source_port::TickSource;
