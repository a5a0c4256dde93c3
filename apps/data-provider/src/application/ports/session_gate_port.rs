//! Session Gate Port
//!
//! Liveness contract consumed by everything that talks to the broker. The
//! single-session guardian implements it today; a pooled implementation can
//! replace it without touching callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Port guarding access to a live broker session.
#[async_trait]
pub trait SessionGate: Send + Sync {
    /// Confirm the session is usable, re-authenticating at most once.
    ///
    /// Returns `false` when no live session could be established.
    async fn ensure_live(&self) -> bool;

    /// Time of the last successful login, if any.
    fn last_login_time(&self) -> Option<DateTime<Utc>>;
}
