//! Outbox dispatcher.
//!
//! Every tick: read up to a batch of pending rows oldest-first, decode each
//! envelope (current encoding, legacy JSON fallback), publish to the row's
//! topic keyed by booking id, and record the outcome:
//!
//! - publish success → `sent`, retry count unchanged
//! - publish failure under the retry ceiling → stays `pending`, count + 1
//! - publish failure at the ceiling → `dlq`
//! - undecodable payload → `failed`, row abandoned
//!
//! Rows are re-encoded before publishing, so legacy-encoded rows leave the
//! process in the current encoding. Delivery is at-least-once: a crash
//! between publish and the status update causes a republish, and consumers
//! deduplicate on the envelope's event id.

use std::sync::Arc;
use tokio::sync::watch;

use booker_core::{BookingStore, EventEnvelope, EventPublisher, OutboxRow, OutboxStatus};

use crate::metrics;

/// Periodic publisher of pending outbox rows.
pub struct OutboxDispatcher {
    store: Arc<dyn BookingStore>,
    publisher: Arc<dyn EventPublisher>,
    batch_size: i64,
    max_retries: i32,
    tick_interval: std::time::Duration,
}

impl OutboxDispatcher {
    /// Assemble the dispatcher.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        publisher: Arc<dyn EventPublisher>,
        batch_size: i64,
        max_retries: i32,
        tick_interval: std::time::Duration,
    ) -> Self {
        Self {
            store,
            publisher,
            batch_size,
            max_retries,
            tick_interval,
        }
    }

    /// Run until the shutdown channel flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.tick_interval.as_secs(),
            batch_size = self.batch_size,
            "Outbox dispatcher started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.dispatch_batch().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Outbox dispatcher shutting down");
                    break;
                }
            }
        }
    }

    /// One tick: dispatch up to `batch_size` rows in order. Returns how many
    /// rows were published.
    pub async fn dispatch_batch(&self) -> usize {
        let rows = match self.store.list_pending_outbox(self.batch_size).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(error = %err, "Failed to list pending outbox rows");
                return 0;
            }
        };

        let mut sent = 0;
        for row in rows {
            if self.dispatch_row(&row).await {
                sent += 1;
            }
        }
        sent
    }

    async fn dispatch_row(&self, row: &OutboxRow) -> bool {
        let envelope = match EventEnvelope::decode(&row.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::error!(
                    outbox_id = %row.id,
                    topic = %row.topic,
                    error = %err,
                    "Undecodable outbox payload; marking row failed"
                );
                metrics::record_outbox_dispatch("failed");
                self.update_status(row, OutboxStatus::Failed, row.retry_count + 1)
                    .await;
                return false;
            }
        };

        // Always publish the current encoding; legacy rows get upgraded on
        // the wire.
        let payload = match envelope.encode() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(outbox_id = %row.id, error = %err, "Envelope re-encode failed");
                metrics::record_outbox_dispatch("failed");
                self.update_status(row, OutboxStatus::Failed, row.retry_count + 1)
                    .await;
                return false;
            }
        };

        match self
            .publisher
            .publish(&row.topic, &row.key, &payload, &envelope.trace_id)
            .await
        {
            Ok(()) => {
                metrics::record_outbox_dispatch("sent");
                self.update_status(row, OutboxStatus::Sent, row.retry_count)
                    .await;
                true
            }
            Err(err) => {
                if row.retry_count >= self.max_retries {
                    tracing::error!(
                        outbox_id = %row.id,
                        topic = %row.topic,
                        retry_count = row.retry_count,
                        error = %err,
                        "Publish retries exhausted; dead-lettering row"
                    );
                    metrics::record_outbox_dispatch("dlq");
                    self.update_status(row, OutboxStatus::Dlq, row.retry_count + 1)
                        .await;
                } else {
                    tracing::warn!(
                        outbox_id = %row.id,
                        topic = %row.topic,
                        retry_count = row.retry_count,
                        error = %err,
                        "Publish failed; row stays pending for retry"
                    );
                    metrics::record_outbox_dispatch("retry");
                    self.update_status(row, OutboxStatus::Pending, row.retry_count + 1)
                        .await;
                }
                false
            }
        }
    }

    async fn update_status(&self, row: &OutboxRow, status: OutboxStatus, retry_count: i32) {
        if let Err(err) = self
            .store
            .update_outbox_status(row.id, status, retry_count)
            .await
        {
            // The row stays pending and will be re-dispatched; consumers
            // deduplicate on the event id.
            tracing::error!(
                outbox_id = %row.id,
                status = %status,
                error = %err,
                "Failed to record outbox outcome"
            );
        }
    }
}
