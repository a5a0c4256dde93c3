//! Session Guardian
//!
//! Owns the single broker session and keeps it usable across request bursts
//! and transient disconnects.
//!
//! # Liveness
//!
//! `ensure_live()` probes the session with a cheap `usage()` read. When the
//! probe fails it runs exactly one re-login cycle:
//!
//! 1. `login` with the stored API key pair
//! 2. `activate_ca` when a client certificate is configured
//! 3. record the login timestamp
//!
//! # Single Flight
//!
//! Re-login is serialized by an async mutex. Each completed cycle bumps a
//! login epoch. A caller that observed an older epoch before probing adopts a
//! failed cycle that finished while it waited. After a successful one it
//! probes again under the lock and logs in itself only if that probe fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::application::ports::{BrokerError, BrokerSession, SessionGate};
use crate::domain::session::{CaCertificate, Credentials};
use crate::infrastructure::metrics;

/// Errors establishing a broker session.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Login was rejected or could not be attempted.
    #[error("login failed: {0}")]
    Login(BrokerError),

    /// Certificate activation failed after a successful login.
    #[error("certificate activation failed: {0}")]
    Certificate(BrokerError),
}

/// Guardian of the process-wide broker session.
pub struct SessionGuardian {
    session: Arc<dyn BrokerSession>,
    credentials: Credentials,
    certificate: Option<CaCertificate>,
    relogin_lock: Mutex<()>,
    login_epoch: AtomicU64,
    last_cycle_ok: AtomicBool,
    last_login: RwLock<Option<DateTime<Utc>>>,
}

impl SessionGuardian {
    /// Create a guardian for `session`. No login happens until
    /// [`establish`](Self::establish) or a failed liveness probe.
    #[must_use]
    pub fn new(
        session: Arc<dyn BrokerSession>,
        credentials: Credentials,
        certificate: Option<CaCertificate>,
    ) -> Self {
        Self {
            session,
            credentials,
            certificate,
            relogin_lock: Mutex::new(()),
            login_epoch: AtomicU64::new(0),
            last_cycle_ok: AtomicBool::new(false),
            last_login: RwLock::new(None),
        }
    }

    /// Shared handle to the guarded session for read operations.
    #[must_use]
    pub fn session(&self) -> Arc<dyn BrokerSession> {
        Arc::clone(&self.session)
    }

    /// Perform the startup login.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when login or certificate activation fails. The
    /// caller must treat this as fatal.
    pub async fn establish(&self) -> Result<DateTime<Utc>, SessionError> {
        let _guard = self.relogin_lock.lock().await;
        let outcome = self.login_cycle().await;
        self.finish_cycle(outcome.is_ok());
        let logged_in_at = outcome?;

        tracing::info!(
            at = %logged_in_at,
            certificate = self.certificate.is_some(),
            "Broker session established"
        );
        Ok(logged_in_at)
    }

    async fn relogin(&self, observed_epoch: u64) -> bool {
        let _guard = self.relogin_lock.lock().await;

        if self.login_epoch.load(Ordering::Acquire) != observed_epoch {
            if !self.last_cycle_ok.load(Ordering::Acquire) {
                tracing::debug!("Adopting failed concurrent re-login");
                return false;
            }
            // The session may have died again after that cycle finished.
            if self.session.usage().await.is_ok() {
                tracing::debug!("Adopting concurrent re-login");
                return true;
            }
        }

        let outcome = self.login_cycle().await;
        let ok = outcome.is_ok();
        self.finish_cycle(ok);
        metrics::record_relogin(ok);

        match outcome {
            Ok(at) => tracing::info!(at = %at, "Broker session re-established"),
            Err(e) => tracing::error!(error = %e, "Broker re-login failed"),
        }
        ok
    }

    async fn login_cycle(&self) -> Result<DateTime<Utc>, SessionError> {
        self.session
            .login(self.credentials.api_key(), self.credentials.secret_key())
            .await
            .map_err(SessionError::Login)?;

        if let Some(certificate) = &self.certificate {
            self.session
                .activate_ca(certificate.path(), certificate.password())
                .await
                .map_err(SessionError::Certificate)?;
        }

        let now = Utc::now();
        *self.last_login.write() = Some(now);
        Ok(now)
    }

    fn finish_cycle(&self, ok: bool) {
        self.last_cycle_ok.store(ok, Ordering::Release);
        self.login_epoch.fetch_add(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl SessionGate for SessionGuardian {
    async fn ensure_live(&self) -> bool {
        let observed_epoch = self.login_epoch.load(Ordering::Acquire);

        let live = match self.session.usage().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Liveness probe failed, re-authenticating");
                self.relogin(observed_epoch).await
            }
        };

        metrics::set_session_live(live);
        live
    }

    fn last_login_time(&self) -> Option<DateTime<Utc>> {
        *self.last_login.read()
    }
}

impl std::fmt::Debug for SessionGuardian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuardian")
            .field("credentials", &self.credentials)
            .field("certificate", &self.certificate)
            .field("login_epoch", &self.login_epoch.load(Ordering::Relaxed))
            .field("last_login", &*self.last_login.read())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
