//! In-memory test doubles for the booker seams.
//!
//! Fast, deterministic implementations of [`BookingStore`], [`HoldRegistry`],
//! [`EventPublisher`], and [`Clock`] so the coordinator, the planner, and the
//! background workers can be tested without Postgres, Redis, or a broker:
//!
//! - [`MemoryBookingStore`] enforces the occupancy invariant the same way the
//!   real store does, so conflict paths are exercisable.
//! - [`MemoryHoldRegistry`] expires holds against an injected clock, so TTL
//!   behavior is driven by [`ManualClock::advance`] instead of sleeping.
//! - [`CapturingPublisher`] records every publish and can be scripted to fail
//!   the next N attempts, which is how the outbox retry/DLQ schedule is
//!   tested.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use booker_core::store::{BookingStore, IdempotencyKey};
use booker_core::{
    Booking, BookingError, BookingFilters, BookingId, BookingStatus, BoxFuture, Clock,
    EventEnvelope, EventPublisher, HoldRegistry, OutboxId, OutboxRow, OutboxStatus, PublishError,
    TableId, VenueId,
};

// ============================================================================
// Clock
// ============================================================================

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Booking store
// ============================================================================

/// One journal entry recorded by [`MemoryBookingStore`].
#[derive(Clone, Debug)]
pub struct JournalEntry {
    /// Booking the entry belongs to
    pub booking_id: BookingId,
    /// Event kind text, as the real store writes it
    pub kind: String,
}

#[derive(Default)]
struct StoreInner {
    bookings: HashMap<BookingId, Booking>,
    journal: Vec<JournalEntry>,
    outbox: Vec<OutboxRow>,
    idempotency: HashMap<(String, String), (BookingId, DateTime<Utc>)>,
    create_failures_remaining: u32,
}

/// In-memory booking store with the same atomicity and occupancy semantics
/// as the `PostgreSQL` implementation.
#[derive(Default)]
pub struct MemoryBookingStore {
    inner: Mutex<StoreInner>,
}

impl MemoryBookingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every outbox row, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn outbox_rows(&self) -> Vec<OutboxRow> {
        self.inner.lock().unwrap().outbox.clone()
    }

    /// Snapshot of the journal, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.inner.lock().unwrap().journal.clone()
    }

    /// Fail the next `n` `create_booking` calls with a transient error, as a
    /// crashed transaction would.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_next_create(&self, n: u32) {
        self.inner.lock().unwrap().create_failures_remaining = n;
    }

    /// Overwrite one outbox row's payload. Lets tests plant legacy-encoded
    /// or corrupt payloads for the dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned or the row does not exist.
    pub fn set_outbox_payload(&self, id: OutboxId, payload: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .outbox
            .iter_mut()
            .find(|row| row.id == id)
            .expect("outbox row exists");
        row.payload = payload;
    }

    fn append_event(inner: &mut StoreInner, envelope: &EventEnvelope) -> Result<(), BookingError> {
        inner.journal.push(JournalEntry {
            booking_id: envelope.booking_id,
            kind: envelope.kind.as_str().to_string(),
        });

        let payload = envelope
            .encode()
            .map_err(|e| BookingError::Internal(e.to_string()))?;
        inner.outbox.push(OutboxRow {
            id: OutboxId::new(),
            topic: envelope.topic().to_string(),
            key: envelope.booking_id.to_string(),
            payload,
            status: OutboxStatus::Pending,
            retry_count: 0,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

impl BookingStore for MemoryBookingStore {
    fn create_booking<'a>(
        &'a self,
        booking: &'a Booking,
        envelope: &'a EventEnvelope,
        idempotency: Option<&'a IdempotencyKey>,
    ) -> BoxFuture<'a, Result<(), BookingError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();

            if inner.create_failures_remaining > 0 {
                inner.create_failures_remaining -= 1;
                return Err(BookingError::Transient(
                    "scripted store failure".to_string(),
                ));
            }

            let conflict = inner.bookings.values().any(|existing| {
                existing.venue_id == booking.venue_id
                    && existing.table_id == booking.table_id
                    && existing.date == booking.date
                    && existing.occupies()
                    && existing.overlaps(booking.start_time, booking.end_time)
            });
            if conflict {
                return Err(BookingError::OccupancyConflict);
            }

            inner.bookings.insert(booking.id, booking.clone());
            Self::append_event(&mut inner, envelope)?;

            if let Some(idem) = idempotency {
                inner.idempotency.insert(
                    (idem.admin_id.clone(), idem.key.clone()),
                    (booking.id, Utc::now()),
                );
            }

            Ok(())
        })
    }

    fn transition<'a>(
        &'a self,
        id: BookingId,
        expected_from: &'a [BookingStatus],
        to: BookingStatus,
        envelope: &'a EventEnvelope,
    ) -> BoxFuture<'a, Result<Option<Booking>, BookingError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();

            let updated = match inner.bookings.get_mut(&id) {
                Some(booking) if expected_from.contains(&booking.status) => {
                    booking.status = to;
                    booking.updated_at = Utc::now();
                    if to.clears_expiry() {
                        booking.expires_at = None;
                    }
                    booking.clone()
                }
                _ => return Ok(None),
            };

            Self::append_event(&mut inner, envelope)?;
            Ok(Some(updated))
        })
    }

    fn get(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>, BookingError>> {
        Box::pin(async move { Ok(self.inner.lock().unwrap().bookings.get(&id).cloned()) })
    }

    fn list<'a>(
        &'a self,
        filters: &'a BookingFilters,
    ) -> BoxFuture<'a, Result<(Vec<Booking>, i64), BookingError>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let mut matches: Vec<Booking> = inner
                .bookings
                .values()
                .filter(|b| filters.venue_id.is_none_or(|v| b.venue_id == v))
                .filter(|b| filters.table_id.is_none_or(|t| b.table_id == t))
                .filter(|b| filters.date.is_none_or(|d| b.date == d))
                .filter(|b| filters.status.is_none_or(|s| b.status == s))
                .cloned()
                .collect();
            matches.sort_by_key(|b| (b.date, b.start_time));

            let total = matches.len() as i64;
            let limit = if filters.limit > 0 { filters.limit } else { 50 };
            let page = matches
                .into_iter()
                .skip(usize::try_from(filters.offset).unwrap_or(0))
                .take(usize::try_from(limit).unwrap_or(50))
                .collect();
            Ok((page, total))
        })
    }

    fn find_occupying<'a>(
        &'a self,
        venue_id: VenueId,
        table_ids: &'a [TableId],
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> BoxFuture<'a, Result<HashSet<TableId>, BookingError>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .bookings
                .values()
                .filter(|b| {
                    b.venue_id == venue_id
                        && table_ids.contains(&b.table_id)
                        && b.date == date
                        && b.occupies()
                        && b.overlaps(start, end)
                })
                .map(|b| b.table_id)
                .collect())
        })
    }

    fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Booking>, BookingError>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            let mut expired: Vec<Booking> = inner
                .bookings
                .values()
                .filter(|b| {
                    b.status == BookingStatus::Held && b.expires_at.is_some_and(|at| at < now)
                })
                .cloned()
                .collect();
            expired.sort_by_key(|b| b.expires_at);
            Ok(expired)
        })
    }

    fn list_pending_outbox(
        &self,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<OutboxRow>, BookingError>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .outbox
                .iter()
                .filter(|row| row.status == OutboxStatus::Pending)
                .take(usize::try_from(limit).unwrap_or(0))
                .cloned()
                .collect())
        })
    }

    fn update_outbox_status(
        &self,
        id: OutboxId,
        status: OutboxStatus,
        retry_count: i32,
    ) -> BoxFuture<'_, Result<(), BookingError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if let Some(row) = inner.outbox.iter_mut().find(|row| row.id == id) {
                row.status = status;
                row.retry_count = retry_count;
            }
            Ok(())
        })
    }

    fn find_by_idempotency_key<'a>(
        &'a self,
        admin_id: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<BookingId>, BookingError>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .idempotency
                .get(&(admin_id.to_string(), key.to_string()))
                .map(|(id, _)| *id))
        })
    }

    fn purge_idempotency_keys(
        &self,
        before: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, BookingError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            let before_len = inner.idempotency.len();
            inner.idempotency.retain(|_, (_, created)| *created >= before);
            Ok((before_len - inner.idempotency.len()) as u64)
        })
    }
}

// ============================================================================
// Hold registry
// ============================================================================

struct HoldEntry {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// In-memory hold registry whose TTLs expire against an injected clock.
pub struct MemoryHoldRegistry<C: Clock> {
    clock: std::sync::Arc<C>,
    holds: Mutex<HashMap<String, HoldEntry>>,
}

impl<C: Clock> MemoryHoldRegistry<C> {
    /// Create a registry reading time from `clock`.
    #[must_use]
    pub fn new(clock: std::sync::Arc<C>) -> Self {
        Self {
            clock,
            holds: Mutex::new(HashMap::new()),
        }
    }

    fn purge_expired(&self, holds: &mut HashMap<String, HoldEntry>) {
        let now = self.clock.now();
        holds.retain(|_, entry| entry.expires_at > now);
    }
}

impl<C: Clock> HoldRegistry for MemoryHoldRegistry<C> {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        owner: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<bool, BookingError>> {
        Box::pin(async move {
            let mut holds = self.holds.lock().unwrap();
            self.purge_expired(&mut holds);

            if holds.contains_key(key) {
                return Ok(false);
            }

            let expires_at = self.clock.now()
                + ChronoDuration::from_std(ttl)
                    .map_err(|e| BookingError::Internal(e.to_string()))?;
            holds.insert(
                key.to_string(),
                HoldEntry {
                    owner: owner.to_string(),
                    expires_at,
                },
            );
            Ok(true)
        })
    }

    fn release<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BookingError>> {
        Box::pin(async move {
            self.holds.lock().unwrap().remove(key);
            Ok(())
        })
    }

    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, BookingError>> {
        Box::pin(async move {
            let mut holds = self.holds.lock().unwrap();
            self.purge_expired(&mut holds);
            Ok(holds.get(key).map(|entry| entry.owner.clone()))
        })
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// One message recorded by [`CapturingPublisher`].
#[derive(Clone, Debug)]
pub struct PublishedMessage {
    /// Destination topic
    pub topic: String,
    /// Routing key
    pub key: String,
    /// Raw payload bytes
    pub payload: Vec<u8>,
    /// Propagated trace id
    pub trace_id: String,
}

/// Publisher double that records every publish and can be scripted to fail.
#[derive(Default)]
pub struct CapturingPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    failures_remaining: AtomicU32,
}

impl CapturingPublisher {
    /// Create a publisher that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` publish attempts with a broker error.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Everything published so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }
}

impl EventPublisher for CapturingPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        key: &'a str,
        payload: &'a [u8],
        trace_id: &'a str,
    ) -> BoxFuture<'a, Result<(), PublishError>> {
        Box::pin(async move {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(PublishError::Failed {
                    topic: topic.to_string(),
                    reason: "scripted failure".to_string(),
                });
            }

            self.published.lock().unwrap().push(PublishedMessage {
                topic: topic.to_string(),
                key: key.to_string(),
                payload: payload.to_vec(),
                trace_id: trace_id.to_string(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booker_core::EventPayload;
    use std::sync::Arc;

    fn booking(venue: VenueId, table: TableId, start: (u32, u32), end: (u32, u32)) -> Booking {
        let now = Utc::now();
        Booking {
            id: BookingId::new(),
            venue_id: venue,
            table_id: table,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            party_size: 2,
            customer_name: "Ada".to_string(),
            customer_phone: "+34600000000".to_string(),
            status: BookingStatus::Held,
            comment: String::new(),
            admin_id: "admin-1".to_string(),
            created_at: now,
            updated_at: now,
            expires_at: Some(now + ChronoDuration::minutes(10)),
        }
    }

    fn envelope(b: &Booking) -> EventEnvelope {
        EventEnvelope::new(
            b.id,
            "trace",
            Utc::now(),
            EventPayload::Held {
                expires_at: b.expires_at.unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn memory_store_enforces_occupancy() {
        let store = MemoryBookingStore::new();
        let venue = VenueId::new();
        let table = TableId::new();

        let first = booking(venue, table, (19, 0), (21, 0));
        store
            .create_booking(&first, &envelope(&first), None)
            .await
            .unwrap();

        let overlapping = booking(venue, table, (20, 0), (22, 0));
        let err = store
            .create_booking(&overlapping, &envelope(&overlapping), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::OccupancyConflict));

        // Back-to-back is fine.
        let adjacent = booking(venue, table, (21, 0), (22, 0));
        store
            .create_booking(&adjacent, &envelope(&adjacent), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn manual_clock_drives_hold_expiry() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = MemoryHoldRegistry::new(clock.clone());

        assert!(registry
            .acquire("hold:a", "b1", Duration::from_secs(600))
            .await
            .unwrap());
        assert!(!registry
            .acquire("hold:a", "b2", Duration::from_secs(600))
            .await
            .unwrap());

        clock.advance(ChronoDuration::minutes(11));

        assert_eq!(registry.read("hold:a").await.unwrap(), None);
        assert!(registry
            .acquire("hold:a", "b2", Duration::from_secs(600))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn capturing_publisher_scripts_failures() {
        let publisher = CapturingPublisher::new();
        publisher.fail_next(1);

        let err = publisher.publish("t", "k", b"p", "tr").await.unwrap_err();
        assert!(matches!(err, PublishError::Failed { .. }));

        publisher.publish("t", "k", b"p", "tr").await.unwrap();
        assert_eq!(publisher.published().len(), 1);
    }
}
