//! The booking store seam: durable, transactional persistence of bookings,
//! journal events, outbox rows, and idempotency keys.
//!
//! Every mutating operation is atomic: the booking row change, the journal
//! append, and the outbox insert commit together or not at all. That single
//! transaction is what makes the outbox pattern exactly-once-effective.
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns (via [`BoxFuture`])
//! instead of `async fn` so it can be used as a trait object
//! (`Arc<dyn BookingStore>`) across the coordinator and workers.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;

use crate::error::BookingError;
use crate::event::EventEnvelope;
use crate::status::BookingStatus;
use crate::types::{
    Booking, BookingFilters, BookingId, OutboxId, OutboxRow, OutboxStatus, TableId, VenueId,
};
use crate::BoxFuture;

/// Scope of an idempotency lookup: the acting admin plus the caller-supplied
/// key, so two admins reusing the same key never collide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdempotencyKey {
    /// Acting admin identifier
    pub admin_id: String,
    /// Caller-supplied key
    pub key: String,
}

/// Durable storage for the booking lifecycle.
///
/// Implementations must guarantee the occupancy invariant at the storage
/// layer (via an exclusion constraint, or by re-running the overlap query
/// inside the insert transaction) because the hold registry alone is not a
/// sufficient guard.
pub trait BookingStore: Send + Sync {
    /// Insert a freshly held booking together with its journal event, its
    /// outbox row, and (when present) the idempotency mapping, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// - [`BookingError::OccupancyConflict`] when an overlapping booking in
    ///   {held, confirmed, seated} already occupies the slot
    /// - [`BookingError::Transient`] on backend I/O failure
    fn create_booking<'a>(
        &'a self,
        booking: &'a Booking,
        envelope: &'a EventEnvelope,
        idempotency: Option<&'a IdempotencyKey>,
    ) -> BoxFuture<'a, Result<(), BookingError>>;

    /// Conditionally move a booking to `to`, appending the journal event and
    /// the outbox row in the same transaction.
    ///
    /// The status update applies only while the current status is one of
    /// `expected_from`; `Ok(None)` means no row matched (the booking is
    /// missing or its status changed underneath the caller) and nothing was
    /// written. Entering any status other than `held` clears `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn transition<'a>(
        &'a self,
        id: BookingId,
        expected_from: &'a [BookingStatus],
        to: BookingStatus,
        envelope: &'a EventEnvelope,
    ) -> BoxFuture<'a, Result<Option<Booking>, BookingError>>;

    /// Fetch one booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn get(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>, BookingError>>;

    /// List bookings matching `filters`, ordered by date and start time,
    /// plus the total match count for pagination.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn list<'a>(
        &'a self,
        filters: &'a BookingFilters,
    ) -> BoxFuture<'a, Result<(Vec<Booking>, i64), BookingError>>;

    /// The subset of `table_ids` occupied at the given slot: tables with a
    /// booking in {held, confirmed, seated} whose half-open window overlaps
    /// `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn find_occupying<'a>(
        &'a self,
        venue_id: VenueId,
        table_ids: &'a [TableId],
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> BoxFuture<'a, Result<HashSet<TableId>, BookingError>>;

    /// All bookings still in `held` whose expiry deadline is before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Booking>, BookingError>>;

    /// Up to `limit` pending outbox rows, oldest first. Oldest-first order is
    /// what preserves per-booking causal order through the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn list_pending_outbox(
        &self,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<OutboxRow>, BookingError>>;

    /// Record the outcome of a dispatch attempt.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn update_outbox_status(
        &self,
        id: OutboxId,
        status: OutboxStatus,
        retry_count: i32,
    ) -> BoxFuture<'_, Result<(), BookingError>>;

    /// Booking previously created under `(admin_id, key)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn find_by_idempotency_key<'a>(
        &'a self,
        admin_id: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<BookingId>, BookingError>>;

    /// Delete idempotency mappings created before `before`; returns the
    /// number removed. Driven by the expiry worker.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    fn purge_idempotency_keys(
        &self,
        before: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, BookingError>>;
}
