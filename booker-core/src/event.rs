//! Lifecycle event kinds and the wire envelope.
//!
//! Every committed state change produces exactly one [`EventEnvelope`] which
//! is written to the outbox in the same transaction and later published to
//! the event stream. The envelope is self-contained: consumers deduplicate on
//! `event_id` and never need to consult the store.
//!
//! # Encodings
//!
//! Writes always use the current encoding (bincode). The decode path also
//! accepts the legacy JSON encoding so rows written before the encoding
//! change still dispatch; the dispatcher re-encodes them before publishing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::types::BookingId;

/// Service name stamped into every envelope this process writes.
pub const EVENT_SOURCE: &str = "booker";

/// The kind of a lifecycle event. Maps 1:1 onto stream topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A slot was claimed and a booking created in `held`
    Held,
    /// An admin confirmed the booking
    Confirmed,
    /// An admin cancelled the booking
    Cancelled,
    /// Guests were seated
    Seated,
    /// The visit finished
    Finished,
    /// Guests never arrived
    NoShow,
    /// The hold lapsed without confirmation
    Expired,
}

impl EventKind {
    /// The stream topic this kind publishes to.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::Held => "booking.held",
            Self::Confirmed => "booking.confirmed",
            Self::Cancelled => "booking.cancelled",
            Self::Seated => "booking.seated",
            Self::Finished => "booking.finished",
            Self::NoShow => "booking.no_show",
            Self::Expired => "booking.expired",
        }
    }

    /// Stable textual form used in the journal table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Seated => "seated",
            Self::Finished => "finished",
            Self::NoShow => "no_show",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific event data.
///
/// Externally tagged so both the current encoding and the legacy JSON form
/// can represent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    /// Slot claimed; carries the hold deadline
    Held {
        /// When the hold lapses unless confirmed
        expires_at: DateTime<Utc>,
    },
    /// Booking confirmed
    Confirmed {
        /// Acting admin
        admin_id: String,
    },
    /// Booking cancelled
    Cancelled {
        /// Acting admin
        admin_id: String,
        /// Operator-supplied reason, if any
        reason: Option<String>,
    },
    /// Guests seated
    Seated {
        /// Acting admin
        admin_id: String,
    },
    /// Visit finished
    Finished {
        /// Acting admin
        admin_id: String,
    },
    /// Guests never arrived
    NoShow {
        /// Acting admin
        admin_id: String,
    },
    /// Hold lapsed
    Expired {
        /// Why the booking expired
        reason: String,
    },
}

impl EventPayload {
    /// The event kind this payload belongs to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Held { .. } => EventKind::Held,
            Self::Confirmed { .. } => EventKind::Confirmed,
            Self::Cancelled { .. } => EventKind::Cancelled,
            Self::Seated { .. } => EventKind::Seated,
            Self::Finished { .. } => EventKind::Finished,
            Self::NoShow { .. } => EventKind::NoShow,
            Self::Expired { .. } => EventKind::Expired,
        }
    }
}

/// Failure to decode an envelope from outbox bytes.
#[derive(Error, Debug)]
#[error("envelope decode failed: {0}")]
pub struct EnvelopeDecodeError(String);

/// The published representation of one lifecycle event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Stable event identifier; consumers deduplicate on this under
    /// at-least-once delivery
    pub event_id: Uuid,
    /// Event kind (also determines the topic)
    pub kind: EventKind,
    /// The booking this event belongs to; doubles as the routing key
    pub booking_id: BookingId,
    /// Trace identifier propagated from the originating request
    pub trace_id: String,
    /// Seconds since epoch, server wall clock
    pub occurred_at: i64,
    /// Emitting service name
    pub source: String,
    /// Kind-specific data
    pub payload: EventPayload,
}

impl EventEnvelope {
    /// Build an envelope for a lifecycle event.
    #[must_use]
    pub fn new(
        booking_id: BookingId,
        trace_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            kind: payload.kind(),
            booking_id,
            trace_id: trace_id.into(),
            occurred_at: occurred_at.timestamp(),
            source: EVENT_SOURCE.to_string(),
            payload,
        }
    }

    /// Serialize with the current encoding.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeDecodeError`] if serialization fails (cannot happen
    /// for well-formed envelopes; surfaced rather than panicking).
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeDecodeError> {
        bincode::serialize(self).map_err(|e| EnvelopeDecodeError(e.to_string()))
    }

    /// Deserialize from outbox bytes.
    ///
    /// Tries the current encoding first, then falls back to the legacy JSON
    /// encoding for rows that predate the encoding change.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeDecodeError`] when the bytes match neither encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeDecodeError> {
        match bincode::deserialize::<Self>(bytes) {
            Ok(envelope) => Ok(envelope),
            Err(bincode_err) => serde_json::from_slice::<Self>(bytes).map_err(|json_err| {
                EnvelopeDecodeError(format!(
                    "not current encoding ({bincode_err}) nor legacy JSON ({json_err})"
                ))
            }),
        }
    }

    /// The topic this envelope publishes to.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        self.kind.topic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> EventEnvelope {
        EventEnvelope::new(
            BookingId::new(),
            "trace-123",
            Utc.with_ymd_and_hms(2024, 1, 15, 19, 0, 0).unwrap(),
            EventPayload::Cancelled {
                admin_id: "admin-1".to_string(),
                reason: Some("guest called".to_string()),
            },
        )
    }

    #[test]
    fn kind_topic_mapping() {
        assert_eq!(EventKind::Held.topic(), "booking.held");
        assert_eq!(EventKind::Confirmed.topic(), "booking.confirmed");
        assert_eq!(EventKind::Cancelled.topic(), "booking.cancelled");
        assert_eq!(EventKind::Seated.topic(), "booking.seated");
        assert_eq!(EventKind::Finished.topic(), "booking.finished");
        assert_eq!(EventKind::NoShow.topic(), "booking.no_show");
        assert_eq!(EventKind::Expired.topic(), "booking.expired");
    }

    #[test]
    fn payload_kind_agreement() {
        let envelope = sample();
        assert_eq!(envelope.kind, EventKind::Cancelled);
        assert_eq!(envelope.topic(), "booking.cancelled");
    }

    #[test]
    fn current_encoding_round_trip() {
        let envelope = sample();
        let bytes = envelope.encode().unwrap();
        let decoded = EventEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn legacy_json_is_accepted() {
        let envelope = sample();
        let legacy = serde_json::to_vec(&envelope).unwrap();
        let decoded = EventEnvelope::decode(&legacy).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = EventEnvelope::decode(b"{not an envelope").unwrap_err();
        assert!(err.to_string().contains("legacy JSON"));
    }

    #[test]
    fn occurred_at_is_epoch_seconds() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 19, 0, 0).unwrap();
        let envelope = EventEnvelope::new(
            BookingId::new(),
            "t",
            at,
            EventPayload::Expired {
                reason: "Hold expired".to_string(),
            },
        );
        assert_eq!(envelope.occurred_at, at.timestamp());
        assert_eq!(envelope.source, EVENT_SOURCE);
    }
}
