//! Domain types for the booking engine.
//!
//! Contains the identifier newtypes, the [`Booking`] entity, table metadata
//! used by the availability planner, and the outbox row types shared between
//! the store and the dispatcher.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::status::BookingStatus;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a venue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueId(Uuid);

impl VenueId {
    /// Creates a new random `VenueId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `VenueId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VenueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a room within a venue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(Uuid);

impl RoomId {
    /// Creates a new random `RoomId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RoomId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a physical table
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(Uuid);

impl TableId {
    /// Creates a new random `TableId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TableId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an outbox row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboxId(Uuid);

impl OutboxId {
    /// Creates a new random `OutboxId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `OutboxId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OutboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OutboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Booking
// ============================================================================

/// A reservation against one table for one time window.
///
/// `start_time`/`end_time` form a half-open window `[start, end)` at minute
/// resolution; `end_time` is computed once at creation and stored. A booking
/// in [`BookingStatus::Held`] always carries an `expires_at` deadline; every
/// other status ignores it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Stable identifier
    pub id: BookingId,
    /// Venue the table belongs to
    pub venue_id: VenueId,
    /// Reserved table
    pub table_id: TableId,
    /// Calendar date of the window (local wall clock)
    pub date: NaiveDate,
    /// Start of the window, inclusive
    pub start_time: NaiveTime,
    /// End of the window, exclusive
    pub end_time: NaiveTime,
    /// Number of guests
    pub party_size: i32,
    /// Customer display name
    pub customer_name: String,
    /// Customer contact string
    pub customer_phone: String,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Free-form comment
    pub comment: String,
    /// Acting admin identifier (trusted, established by the gateway)
    pub admin_id: String,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of last status change
    pub updated_at: DateTime<Utc>,
    /// Hold deadline; populated only while the booking is held
    pub expires_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Whether this booking's window overlaps `[start, end)` on the same day.
    ///
    /// Windows are half-open, so back-to-back bookings do not overlap.
    #[must_use]
    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start_time < end && start < self.end_time
    }

    /// Whether this booking currently counts toward the occupancy of its slot.
    #[must_use]
    pub const fn occupies(&self) -> bool {
        self.status.occupies()
    }
}

/// Filters for listing bookings.
#[derive(Clone, Debug, Default)]
pub struct BookingFilters {
    /// Restrict to one venue
    pub venue_id: Option<VenueId>,
    /// Restrict to one table
    pub table_id: Option<TableId>,
    /// Restrict to one date
    pub date: Option<NaiveDate>,
    /// Restrict to one status
    pub status: Option<BookingStatus>,
    /// Page size
    pub limit: i64,
    /// Page offset
    pub offset: i64,
}

// ============================================================================
// Venue catalogue
// ============================================================================

/// Table metadata the availability planner works with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table identifier
    pub id: TableId,
    /// Room the table stands in; only same-room tables can merge
    pub room_id: RoomId,
    /// Display name, e.g. "T12"
    pub name: String,
    /// Seats at this table
    pub capacity: i32,
    /// Whether the table may be merged with a neighbour
    pub can_merge: bool,
    /// Floor zone, e.g. "window", "terrace"
    pub zone: String,
}

// ============================================================================
// Outbox
// ============================================================================

/// Delivery status of an outbox row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Awaiting dispatch (or awaiting retry after a publish failure)
    Pending,
    /// Published to the event stream
    Sent,
    /// Publish failed more than the retry ceiling; parked for operators
    Dlq,
    /// Payload could not be decoded; row is abandoned
    Failed,
}

impl OutboxStatus {
    /// Stable textual form used in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Dlq => "dlq",
            Self::Failed => "failed",
        }
    }

    /// Parse the database textual form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "dlq" => Some(Self::Dlq),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable event awaiting publication.
///
/// Created inside the same store transaction as the booking-state change it
/// describes; mutated only by the outbox dispatcher; never deleted by the
/// core (retention is external).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxRow {
    /// Row identifier
    pub id: OutboxId,
    /// Destination topic
    pub topic: String,
    /// Routing key: the booking identifier, so per-booking order survives
    /// partitioning
    pub key: String,
    /// Serialized [`crate::event::EventEnvelope`]
    pub payload: Vec<u8>,
    /// Delivery status
    pub status: OutboxStatus,
    /// Publish attempts that have failed so far
    pub retry_count: i32,
    /// Server time of creation; dispatch order is oldest-first
    pub created_at: DateTime<Utc>,
}
