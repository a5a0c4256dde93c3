//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SessionGuardian`: keeps the broker session alive, re-authenticating on demand
//! - `CallbackBridge`: awaits callback-delivered kbars with a bounded wait
//! - `BarAggregator`: fans out per-symbol fetches and reduces them to daily bars

mod bar_aggregator;
mod callback_bridge;
mod session_guardian;

pub use bar_aggregator::{BarAggregator, FetchError, FetchResult};
pub use callback_bridge::{CallbackBridge, CompletionSlot, DEFAULT_KBARS_TIMEOUT};
pub use session_guardian::{SessionError, SessionGuardian};
