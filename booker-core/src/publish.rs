//! The event stream seam: keyed publication of encoded envelopes.
//!
//! The production implementation lives in `booker-redpanda`; a capturing
//! double lives in `booker-testing`. Publish errors never surface to the
//! lifecycle operation that enqueued the event; the outbox dispatcher owns
//! the retry schedule.

use thiserror::Error;

use crate::BoxFuture;

/// Errors raised by the event stream client.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The broker rejected or timed out the publish.
    #[error("failed to publish to {topic}: {reason}")]
    Failed {
        /// Destination topic
        topic: String,
        /// Broker-reported reason
        reason: String,
    },

    /// The client could not be constructed or has lost its connection.
    #[error("event stream connection failed: {0}")]
    ConnectionFailed(String),
}

/// Sink for lifecycle events.
///
/// Messages sharing a key land on the same partition, so per-booking event
/// order is preserved as long as the dispatcher hands rows over oldest-first.
pub trait EventPublisher: Send + Sync {
    /// Publish `payload` to `topic` with the given routing key, carrying the
    /// originating trace id as a message header.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when the broker rejects the message or is
    /// unreachable.
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: &'a str,
        payload: &'a [u8],
        trace_id: &'a str,
    ) -> BoxFuture<'a, Result<(), PublishError>>;
}
