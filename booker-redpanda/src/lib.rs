//! Kafka-compatible publisher for booking lifecycle events.
//!
//! Works against Redpanda, Apache Kafka, or any broker speaking the Kafka
//! protocol. Messages are keyed by booking id, so all events of one booking
//! land on the same partition and consumers observe them in creation order.
//!
//! Delivery is at-least-once: the outbox dispatcher marks a row `sent` only
//! after the broker acknowledges, and a crash between the two causes a
//! republish. Consumers deduplicate on the envelope's event id.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

use booker_core::{BoxFuture, EventPublisher, PublishError};

/// Event stream publisher backed by an rdkafka [`FutureProducer`].
pub struct RedpandaPublisher {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
}

impl std::fmt::Debug for RedpandaPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaPublisher")
            .field("brokers", &self.brokers)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedpandaPublisher {
    /// Create a publisher with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::ConnectionFailed`] if the producer cannot be
    /// created from the given broker list.
    pub fn new(brokers: &str) -> Result<Self, PublishError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the publisher.
    #[must_use]
    pub fn builder() -> RedpandaPublisherBuilder {
        RedpandaPublisherBuilder::default()
    }

    /// Get a reference to the brokers string.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for configuring a [`RedpandaPublisher`].
#[derive(Default)]
pub struct RedpandaPublisherBuilder {
    brokers: Option<String>,
    acks: Option<String>,
    timeout: Option<Duration>,
}

impl RedpandaPublisherBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode: "0", "1", or "all".
    ///
    /// Default: "all". The outbox already absorbs broker hiccups, so the
    /// producer favours durability over latency.
    #[must_use]
    pub fn acks(mut self, acks: impl Into<String>) -> Self {
        self.acks = Some(acks.into());
        self
    }

    /// Set the per-message send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`RedpandaPublisher`].
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::ConnectionFailed`] if:
    /// - Brokers not set
    /// - Cannot create producer
    pub fn build(self) -> Result<RedpandaPublisher, PublishError> {
        let brokers = self
            .brokers
            .ok_or_else(|| PublishError::ConnectionFailed("Brokers not configured".to_string()))?;

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.acks.as_deref().unwrap_or("all"));

        let producer: FutureProducer = producer_config.create().map_err(|e| {
            PublishError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            acks = self.acks.as_deref().unwrap_or("all"),
            "RedpandaPublisher created successfully"
        );

        Ok(RedpandaPublisher {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
        })
    }
}

impl EventPublisher for RedpandaPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: &'a str,
        payload: &'a [u8],
        trace_id: &'a str,
    ) -> BoxFuture<'a, Result<(), PublishError>> {
        let timeout = self.timeout;

        Box::pin(async move {
            let headers = OwnedHeaders::new().insert(Header {
                key: "trace_id",
                value: Some(trace_id),
            });

            let record = FutureRecord::to(topic)
                .payload(payload)
                .key(key)
                .headers(headers);

            let send_result = self.producer.send(record, Timeout::After(timeout)).await;

            match send_result {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition = partition,
                        offset = offset,
                        key = %key,
                        "Event published successfully"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %topic,
                        key = %key,
                        error = %kafka_error,
                        "Failed to publish event"
                    );
                    Err(PublishError::Failed {
                        topic: topic.to_string(),
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publisher_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaPublisher>();
        assert_sync::<RedpandaPublisher>();
    }

    #[test]
    fn builder_requires_brokers() {
        let err = RedpandaPublisher::builder().build().unwrap_err();
        assert!(matches!(err, PublishError::ConnectionFailed(_)));
    }
}
