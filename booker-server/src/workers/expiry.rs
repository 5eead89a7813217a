//! Hold expiry worker.
//!
//! Every tick: move lapsed `held` bookings to `expired` (journal event and
//! outbox row in the same transaction), release their hold keys best-effort,
//! and purge idempotency mappings past retention.
//!
//! Safe under concurrent sweepers: the store's conditional update only fires
//! while the booking is still `held`, so double-processing writes nothing.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use booker_core::{
    hold_key, BookingStatus, BookingStore, Clock, EventEnvelope, EventPayload, HoldRegistry,
};

use crate::metrics;

/// Idempotency mappings older than this are dropped; comfortably above the
/// longest configurable hold.
const IDEMPOTENCY_RETENTION_HOURS: i64 = 24;

/// Periodic sweeper for lapsed holds.
pub struct HoldExpiryWorker {
    store: Arc<dyn BookingStore>,
    holds: Arc<dyn HoldRegistry>,
    clock: Arc<dyn Clock>,
    tick_interval: std::time::Duration,
}

impl HoldExpiryWorker {
    /// Assemble the worker.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        holds: Arc<dyn HoldRegistry>,
        clock: Arc<dyn Clock>,
        tick_interval: std::time::Duration,
    ) -> Self {
        Self {
            store,
            holds,
            clock,
            tick_interval,
        }
    }

    /// Run until the shutdown channel flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.tick_interval.as_secs(),
            "Hold expiry worker started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Hold expiry worker shutting down");
                    break;
                }
            }
        }
    }

    /// One sweep: expire lapsed holds and purge stale idempotency keys.
    /// Returns how many bookings this sweep expired.
    ///
    /// Errors are logged; an affected booking is retried on the next tick.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();

        let lapsed = match self.store.list_expired_holds(now).await {
            Ok(lapsed) => lapsed,
            Err(err) => {
                tracing::error!(error = %err, "Failed to list expired holds");
                return 0;
            }
        };

        let mut expired = 0;
        for booking in lapsed {
            let envelope = EventEnvelope::new(
                booking.id,
                Uuid::new_v4().to_string(),
                now,
                EventPayload::Expired {
                    reason: "Hold expired".to_string(),
                },
            );

            match self
                .store
                .transition(
                    booking.id,
                    &[BookingStatus::Held],
                    BookingStatus::Expired,
                    &envelope,
                )
                .await
            {
                Ok(Some(_)) => {
                    expired += 1;
                    metrics::record_hold_expired();
                    tracing::info!(
                        booking_id = %booking.id,
                        expired_at = %now,
                        "Hold expired; booking moved to expired"
                    );

                    let key = hold_key(
                        booking.venue_id,
                        booking.table_id,
                        booking.date,
                        booking.start_time,
                    );
                    if let Err(err) = self.holds.release(&key).await {
                        tracing::warn!(
                            hold_key = %key,
                            error = %err,
                            "Failed to release expired hold key"
                        );
                    }
                }
                // A concurrent sweeper or an admin got there first.
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %err,
                        "Failed to expire booking; will retry next tick"
                    );
                }
            }
        }

        let cutoff = now - ChronoDuration::hours(IDEMPOTENCY_RETENTION_HOURS);
        match self.store.purge_idempotency_keys(cutoff).await {
            Ok(purged) if purged > 0 => {
                tracing::debug!(purged, "Purged stale idempotency keys");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Failed to purge idempotency keys");
            }
        }

        expired
    }
}
