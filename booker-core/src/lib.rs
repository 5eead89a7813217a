//! Core domain types and seams for the booker reservation engine.
//!
//! This crate is backend-agnostic: it defines the booking entity and its
//! lifecycle state machine, the wire envelope for lifecycle events, the error
//! vocabulary, and the three traits the engine is assembled from:
//!
//! - [`store::BookingStore`]: durable, transactional persistence
//!   (implemented by `booker-postgres`)
//! - [`hold::HoldRegistry`]: the ephemeral slot-hold arbiter
//!   (implemented by `booker-redis`)
//! - [`publish::EventPublisher`]: the event stream sink
//!   (implemented by `booker-redpanda`)
//!
//! In-memory doubles of all three live in `booker-testing`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;

pub mod clock;
pub mod error;
pub mod event;
pub mod hold;
pub mod publish;
pub mod status;
pub mod store;
pub mod types;

/// Boxed future used by the seam traits so they stay dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use clock::{Clock, SystemClock};
pub use error::BookingError;
pub use event::{EventEnvelope, EventKind, EventPayload};
pub use hold::{hold_key, HoldRegistry};
pub use publish::{EventPublisher, PublishError};
pub use status::BookingStatus;
pub use store::{BookingStore, IdempotencyKey};
pub use types::{
    Booking, BookingFilters, BookingId, OutboxId, OutboxRow, OutboxStatus, RoomId, TableId,
    TableInfo, VenueId,
};
