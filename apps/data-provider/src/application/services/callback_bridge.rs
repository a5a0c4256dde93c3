//! Callback Bridge
//!
//! Turns the broker's callback-style kbar delivery into an awaitable call with
//! a hard upper bound on the wait.
//!
//! The broker may invoke the callback once, several times, late, or never. A
//! [`CompletionSlot`] honours the first delivery and drops everything after it,
//! including deliveries that arrive once the waiter has given up.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::application::ports::{BrokerError, BrokerSession, KbarCallback, TickSource};
use crate::domain::bars::{KbarSeries, RawTick};
use crate::infrastructure::metrics::{self, KbarsOutcome};

/// Default wait for a kbar callback.
pub const DEFAULT_KBARS_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Completion Slot
// =============================================================================

/// Single-assignment completion shared between a waiter and a callback.
#[derive(Debug)]
pub struct CompletionSlot<T> {
    settled: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> CompletionSlot<T> {
    /// Create a slot and the receiver its resolution is delivered to.
    #[must_use]
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Self {
            settled: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        });
        (slot, rx)
    }

    /// Deliver `value`. Returns `false` when the slot was already settled.
    pub fn resolve(&self, value: T) -> bool {
        if self.settled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let Some(sender) = self.sender.lock().take() else {
            return false;
        };
        // The waiter may have stopped listening; the slot is settled either way.
        let _ = sender.send(value);
        true
    }

    /// Settle the slot without a value so later deliveries are dropped.
    pub fn abandon(&self) {
        self.settled.store(true, Ordering::Release);
        self.sender.lock().take();
    }

    /// Whether a value was delivered or the slot was abandoned.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

// =============================================================================
// Callback Bridge
// =============================================================================

/// Awaitable front for the broker's kbar callback.
#[derive(Clone)]
pub struct CallbackBridge {
    session: Arc<dyn BrokerSession>,
    timeout: Duration,
}

impl CallbackBridge {
    /// Create a bridge that waits at most `timeout` per symbol by default.
    #[must_use]
    pub fn new(session: Arc<dyn BrokerSession>, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    /// Default per-symbol wait.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Request kbars for `symbol` and wait up to `timeout` for delivery.
    ///
    /// The deadline covers issuing the request as well as the wait for the
    /// callback. Every failure mode yields an empty sequence: request errors,
    /// decode errors, a callback dropped without delivery, and a callback that
    /// never arrives in time.
    pub async fn await_kbars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeout: Duration,
    ) -> Vec<RawTick> {
        let (slot, rx) = CompletionSlot::<Vec<RawTick>>::new();
        // The callback owns the only strong handle, so dropping it undelivered
        // closes the channel.
        let pending = Arc::downgrade(&slot);
        let callback = Self::callback(symbol, slot);

        let delivery = async {
            self.session
                .kbars(symbol, start, end, timeout, callback)
                .await?;
            Ok::<_, BrokerError>(rx.await.ok())
        };

        match tokio::time::timeout(timeout, delivery).await {
            Ok(Ok(Some(ticks))) => ticks,
            Ok(Ok(None)) => {
                metrics::record_kbars_outcome(KbarsOutcome::Dropped);
                tracing::warn!(symbol, "Kbar callback dropped without delivery");
                Vec::new()
            }
            Ok(Err(e)) => {
                Self::abandon(&pending);
                metrics::record_kbars_outcome(KbarsOutcome::RequestError);
                tracing::warn!(symbol, error = %e, "Kbar request failed");
                Vec::new()
            }
            Err(_) => {
                Self::abandon(&pending);
                metrics::record_kbars_outcome(KbarsOutcome::Timeout);
                tracing::warn!(
                    symbol,
                    timeout_secs = timeout.as_secs_f64(),
                    "Timed out waiting for kbar callback"
                );
                Vec::new()
            }
        }
    }

    fn abandon(pending: &Weak<CompletionSlot<Vec<RawTick>>>) {
        if let Some(slot) = pending.upgrade() {
            slot.abandon();
        }
    }

    fn callback(symbol: &str, slot: Arc<CompletionSlot<Vec<RawTick>>>) -> KbarCallback {
        let symbol = symbol.to_string();
        Arc::new(move |series: KbarSeries| {
            if slot.is_settled() {
                tracing::debug!(symbol = %symbol, "Ignoring kbar delivery for settled request");
                return;
            }

            let (ticks, outcome) = if series == KbarSeries::default() {
                (Vec::new(), KbarsOutcome::Empty)
            } else {
                match series.into_ticks() {
                    Ok(ticks) => (ticks, KbarsOutcome::Ok),
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "Undecodable kbar payload");
                        (Vec::new(), KbarsOutcome::DecodeError)
                    }
                }
            };

            let count = ticks.len();
            if slot.resolve(ticks) {
                metrics::record_kbars_outcome(outcome);
                tracing::debug!(symbol = %symbol, ticks = count, "Kbar callback resolved");
            }
        })
    }
}

impl std::fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TickSource for CallbackBridge {
    async fn fetch_ticks(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<RawTick> {
        self.await_kbars(symbol, start, end, self.timeout).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use parking_lot::Mutex as SyncMutex;

    use super::*;
    use crate::application::ports::MockBrokerSession;

    const SHORT: Duration = Duration::from_millis(50);

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series() -> KbarSeries {
        KbarSeries {
            ts: Some(vec![1_704_180_600_000_000_000, 1_704_184_200_000_000_000]),
            close: Some(vec![500.0, 510.0]),
            open: Some(vec![495.0, 500.0]),
            high: Some(vec![505.0, 515.0]),
            low: Some(vec![490.0, 498.0]),
            volume: Some(vec![10_000, 12_000]),
        }
    }

    /// Session whose kbar request hangs far past any test timeout.
    struct StalledSession;

    #[async_trait]
    impl BrokerSession for StalledSession {
        async fn login(&self, _: &str, _: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn activate_ca(&self, _: &std::path::Path, _: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn usage(&self) -> Result<crate::application::ports::SessionUsage, BrokerError> {
            Err(BrokerError::NotLoggedIn)
        }

        async fn list_positions(
            &self,
        ) -> Result<Vec<crate::application::ports::BrokerPosition>, BrokerError> {
            Ok(Vec::new())
        }

        async fn kbars(
            &self,
            _: &str,
            _: NaiveDate,
            _: NaiveDate,
            _: Duration,
            _: KbarCallback,
        ) -> Result<(), BrokerError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok(())
        }

        async fn scanners(
            &self,
            _: crate::domain::market::ScannerType,
            _: NaiveDate,
            _: u32,
            _: bool,
        ) -> Result<Vec<crate::domain::market::ScannerItem>, BrokerError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn slot_honours_only_first_resolution() {
        let (slot, mut rx) = CompletionSlot::new();

        assert!(slot.resolve(1));
        assert!(!slot.resolve(2));
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn abandoned_slot_drops_late_resolution() {
        let (slot, mut rx) = CompletionSlot::<u32>::new();

        slot.abandon();

        assert!(slot.is_settled());
        assert!(!slot.resolve(7));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn resolve_after_receiver_dropped_still_settles() {
        let (slot, rx) = CompletionSlot::new();
        drop(rx);

        assert!(slot.resolve("late"));
        assert!(slot.is_settled());
    }

    #[tokio::test]
    async fn immediate_callback_yields_decoded_ticks() {
        let mut mock = MockBrokerSession::new();
        mock.expect_kbars()
            .times(1)
            .returning(|_, _, _, _, callback| {
                callback(series());
                Ok(())
            });

        let bridge = CallbackBridge::new(Arc::new(mock), DEFAULT_KBARS_TIMEOUT);
        let ticks = bridge
            .await_kbars("2330", date(2024, 1, 2), date(2024, 1, 2), SHORT)
            .await;

        assert_eq!(ticks.len(), 2);
        assert_eq!(ticks[1].close, 510.0);
        assert_eq!(ticks[0].volume, Some(10_000));
    }

    #[tokio::test]
    async fn deferred_callback_is_awaited() {
        let mut mock = MockBrokerSession::new();
        mock.expect_kbars().returning(|_, _, _, _, callback| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                callback(series());
            });
            Ok(())
        });

        let bridge = CallbackBridge::new(Arc::new(mock), Duration::from_secs(5));
        let ticks = bridge
            .fetch_ticks("2330", date(2024, 1, 2), date(2024, 1, 2))
            .await;

        assert_eq!(ticks.len(), 2);
    }

    #[tokio::test]
    async fn missing_callback_times_out_empty() {
        let held: Arc<SyncMutex<Vec<KbarCallback>>> = Arc::new(SyncMutex::new(Vec::new()));
        let captured = Arc::clone(&held);

        let mut mock = MockBrokerSession::new();
        mock.expect_kbars().returning(move |_, _, _, _, callback| {
            captured.lock().push(callback);
            Ok(())
        });

        let bridge = CallbackBridge::new(Arc::new(mock), DEFAULT_KBARS_TIMEOUT);
        let started = Instant::now();
        let ticks = bridge
            .await_kbars("2330", date(2024, 1, 2), date(2024, 1, 2), SHORT)
            .await;

        assert!(ticks.is_empty());
        assert!(started.elapsed() < SHORT + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stalled_request_is_bounded_by_timeout() {
        let bridge = CallbackBridge::new(Arc::new(StalledSession), DEFAULT_KBARS_TIMEOUT);
        let started = Instant::now();
        let ticks = bridge
            .await_kbars(
                "2330",
                date(2024, 1, 2),
                date(2024, 1, 2),
                Duration::from_millis(100),
            )
            .await;

        assert!(ticks.is_empty());
        assert!(started.elapsed() < Duration::from_millis(100) + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn dropped_callback_returns_empty_without_waiting() {
        let mut mock = MockBrokerSession::new();
        mock.expect_kbars().returning(|_, _, _, _, _| Ok(()));

        let bridge = CallbackBridge::new(Arc::new(mock), DEFAULT_KBARS_TIMEOUT);
        let started = Instant::now();
        let ticks = bridge
            .await_kbars(
                "2330",
                date(2024, 1, 2),
                date(2024, 1, 2),
                Duration::from_secs(10),
            )
            .await;

        assert!(ticks.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn request_error_yields_empty() {
        let mut mock = MockBrokerSession::new();
        mock.expect_kbars().returning(|symbol, _, _, _, _| {
            Err(BrokerError::UnknownContract {
                symbol: symbol.to_string(),
            })
        });

        let bridge = CallbackBridge::new(Arc::new(mock), DEFAULT_KBARS_TIMEOUT);
        let ticks = bridge
            .await_kbars("INVALID", date(2024, 1, 2), date(2024, 1, 2), SHORT)
            .await;

        assert!(ticks.is_empty());
    }

    #[tokio::test]
    async fn undecodable_payload_yields_empty() {
        let mut mock = MockBrokerSession::new();
        mock.expect_kbars().returning(|_, _, _, _, callback| {
            callback(KbarSeries {
                ts: Some(vec![1, 2, 3]),
                close: Some(vec![1.0]),
                ..KbarSeries::default()
            });
            Ok(())
        });

        let bridge = CallbackBridge::new(Arc::new(mock), DEFAULT_KBARS_TIMEOUT);
        let ticks = bridge
            .await_kbars("2330", date(2024, 1, 2), date(2024, 1, 2), SHORT)
            .await;

        assert!(ticks.is_empty());
    }

    #[tokio::test]
    async fn second_delivery_is_ignored() {
        let mut mock = MockBrokerSession::new();
        mock.expect_kbars().returning(|_, _, _, _, callback| {
            callback(series());
            callback(KbarSeries::default());
            Ok(())
        });

        let bridge = CallbackBridge::new(Arc::new(mock), DEFAULT_KBARS_TIMEOUT);
        let ticks = bridge
            .await_kbars("2330", date(2024, 1, 2), date(2024, 1, 2), SHORT)
            .await;

        assert_eq!(ticks.len(), 2);
    }

    #[tokio::test]
    async fn late_delivery_after_timeout_is_a_no_op() {
        let stored: Arc<SyncMutex<Option<KbarCallback>>> = Arc::new(SyncMutex::new(None));
        let captured = Arc::clone(&stored);

        let mut mock = MockBrokerSession::new();
        mock.expect_kbars().returning(move |_, _, _, _, callback| {
            *captured.lock() = Some(callback);
            Ok(())
        });

        let bridge = CallbackBridge::new(Arc::new(mock), DEFAULT_KBARS_TIMEOUT);
        let ticks = bridge
            .await_kbars("2330", date(2024, 1, 2), date(2024, 1, 2), SHORT)
            .await;
        assert!(ticks.is_empty());

        let callback = stored.lock().take().unwrap();
        callback(series());
        callback(series());
    }
}
