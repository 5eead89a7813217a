//! Coordinator lifecycle tests over the in-memory seams.
//!
//! Exercises the create choreography (idempotency, hold acquisition, release
//! on failure), the state machine, hold expiry, and the per-booking outbox
//! ordering, all without Postgres, Redis, or a broker.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use booker_core::{
    BookingError, BookingStatus, BookingStore, Clock, EventEnvelope, OutboxStatus, TableId, VenueId,
};
use booker_server::workers::HoldExpiryWorker;
use booker_server::{Coordinator, CreateBooking};
use booker_testing::{ManualClock, MemoryBookingStore, MemoryHoldRegistry};

const HOLD_TTL: Duration = Duration::from_secs(600);

struct Harness {
    store: Arc<MemoryBookingStore>,
    holds: Arc<MemoryHoldRegistry<ManualClock>>,
    clock: Arc<ManualClock>,
    coordinator: Coordinator,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryBookingStore::new());
    let holds = Arc::new(MemoryHoldRegistry::new(clock.clone()));

    let coordinator = Coordinator::new(
        store.clone() as Arc<dyn BookingStore>,
        holds.clone(),
        clock.clone() as Arc<dyn Clock>,
        HOLD_TTL,
    );

    Harness {
        store,
        holds,
        clock,
        coordinator,
    }
}

fn request(venue: VenueId, table: TableId, start: (u32, u32), duration: i64) -> CreateBooking {
    CreateBooking {
        venue_id: venue,
        table_id: table,
        date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
        duration_minutes: duration,
        party_size: 4,
        customer_name: "Ada Lovelace".to_string(),
        customer_phone: "+34600000000".to_string(),
        comment: String::new(),
        admin_id: "admin-1".to_string(),
        idempotency_key: None,
    }
}

#[tokio::test]
async fn happy_path_create_then_confirm() {
    let h = harness();
    let venue = VenueId::new();
    let table = TableId::new();

    let booking = h
        .coordinator
        .create(request(venue, table, (19, 0), 120), "trace-1")
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Held);
    assert_eq!(booking.end_time, NaiveTime::from_hms_opt(21, 0, 0).unwrap());
    assert_eq!(
        booking.expires_at,
        Some(h.clock.now() + ChronoDuration::minutes(10))
    );

    let confirmed = h
        .coordinator
        .confirm(booking.id, "admin-1", "trace-2")
        .await
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.expires_at, None, "confirm clears the deadline");

    // Two outbox rows, held before confirmed, both keyed by the booking id.
    let rows = h.store.outbox_rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].topic, "booking.held");
    assert_eq!(rows[1].topic, "booking.confirmed");
    assert!(rows.iter().all(|r| r.key == booking.id.to_string()));
    assert!(rows.iter().all(|r| r.status == OutboxStatus::Pending));

    // Envelopes carry the originating trace ids.
    let held = EventEnvelope::decode(&rows[0].payload).unwrap();
    let confirm = EventEnvelope::decode(&rows[1].payload).unwrap();
    assert_eq!(held.trace_id, "trace-1");
    assert_eq!(confirm.trace_id, "trace-2");
}

#[tokio::test]
async fn concurrent_creates_yield_exactly_one_winner() {
    let h = harness();
    let venue = VenueId::new();
    let table = TableId::new();

    let (first, second) = tokio::join!(
        h.coordinator
            .create(request(venue, table, (19, 0), 120), "trace-a"),
        h.coordinator
            .create(request(venue, table, (19, 0), 120), "trace-b"),
    );

    let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one create wins the slot");

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(
        loser.unwrap_err(),
        BookingError::SlotHeld | BookingError::SlotUnavailable
    ));

    // The occupancy set for the slot has cardinality 1.
    let occupied = h
        .store
        .find_occupying(
            venue,
            &[table],
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(occupied.len(), 1);
}

#[tokio::test]
async fn back_to_back_windows_do_not_conflict() {
    let h = harness();
    let venue = VenueId::new();
    let table = TableId::new();

    h.coordinator
        .create(request(venue, table, (19, 0), 60), "t")
        .await
        .unwrap();
    h.coordinator
        .create(request(venue, table, (20, 0), 60), "t")
        .await
        .unwrap();

    // [19:30, 20:30) overlaps both; the pre-check rejects it.
    let err = h
        .coordinator
        .create(request(venue, table, (19, 30), 60), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SlotUnavailable));
}

#[tokio::test]
async fn cross_midnight_windows_are_rejected() {
    let h = harness();

    let err = h
        .coordinator
        .create(request(VenueId::new(), TableId::new(), (23, 30), 60), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));

    let err = h
        .coordinator
        .create(request(VenueId::new(), TableId::new(), (19, 0), 0), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));
}

#[tokio::test]
async fn store_failure_after_acquire_releases_the_hold() {
    let h = harness();
    let venue = VenueId::new();
    let table = TableId::new();

    h.store.fail_next_create(1);
    let err = h
        .coordinator
        .create(request(venue, table, (19, 0), 120), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Transient(_)));

    // The hold did not outlive the failed create: a retry wins the slot.
    let booking = h
        .coordinator
        .create(request(venue, table, (19, 0), 120), "t")
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Held);
}

#[tokio::test]
async fn idempotency_key_replays_the_original_booking() {
    let h = harness();
    let venue = VenueId::new();
    let table = TableId::new();

    let mut req = request(venue, table, (19, 0), 120);
    req.idempotency_key = Some("retry-key-1".to_string());

    let first = h.coordinator.create(req.clone(), "t").await.unwrap();
    let replay = h.coordinator.create(req, "t").await.unwrap();
    assert_eq!(first.id, replay.id);

    // The replay wrote nothing new.
    assert_eq!(h.store.outbox_rows().len(), 1);
    assert_eq!(h.store.journal().len(), 1);
}

#[tokio::test]
async fn reissued_transition_is_a_noop_success() {
    let h = harness();
    let booking = h
        .coordinator
        .create(request(VenueId::new(), TableId::new(), (19, 0), 120), "t")
        .await
        .unwrap();

    let first = h
        .coordinator
        .confirm(booking.id, "admin-1", "t")
        .await
        .unwrap();
    let second = h
        .coordinator
        .confirm(booking.id, "admin-1", "t")
        .await
        .unwrap();

    assert_eq!(first, second);
    // held + confirmed only; the reissue produced no additional outbox row.
    assert_eq!(h.store.outbox_rows().len(), 2);
}

#[tokio::test]
async fn conflicting_transitions_are_rejected() {
    let h = harness();
    let booking = h
        .coordinator
        .create(request(VenueId::new(), TableId::new(), (19, 0), 120), "t")
        .await
        .unwrap();

    // seat straight from held is not an edge
    let err = h
        .coordinator
        .seat(booking.id, "admin-1", "t")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: BookingStatus::Held,
            to: BookingStatus::Seated,
        }
    ));

    // cancel is terminal; nothing leaves it
    h.coordinator
        .cancel(booking.id, "admin-1", Some("guest called".to_string()), "t")
        .await
        .unwrap();
    let err = h
        .coordinator
        .confirm(booking.id, "admin-1", "t")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::InvalidTransition {
            from: BookingStatus::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
async fn full_visit_reaches_finished() {
    let h = harness();
    let booking = h
        .coordinator
        .create(request(VenueId::new(), TableId::new(), (19, 0), 120), "t")
        .await
        .unwrap();

    h.coordinator
        .confirm(booking.id, "admin-1", "t")
        .await
        .unwrap();
    h.coordinator.seat(booking.id, "admin-1", "t").await.unwrap();
    let finished = h
        .coordinator
        .finish(booking.id, "admin-1", "t")
        .await
        .unwrap();
    assert_eq!(finished.status, BookingStatus::Finished);

    let topics: Vec<String> = h
        .store
        .outbox_rows()
        .into_iter()
        .map(|r| r.topic)
        .collect();
    assert_eq!(
        topics,
        vec![
            "booking.held",
            "booking.confirmed",
            "booking.seated",
            "booking.finished"
        ]
    );
}

#[tokio::test]
async fn missing_booking_is_not_found() {
    let h = harness();
    let err = h
        .coordinator
        .confirm(booker_core::BookingId::new(), "admin-1", "t")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn expired_hold_frees_the_slot_for_a_fresh_create() {
    let h = harness();
    let venue = VenueId::new();
    let table = TableId::new();

    let booking = h
        .coordinator
        .create(request(venue, table, (19, 0), 120), "t")
        .await
        .unwrap();

    // While held, the slot is defended.
    let err = h
        .coordinator
        .create(request(venue, table, (19, 0), 120), "t")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::SlotUnavailable | BookingError::SlotHeld
    ));

    // No confirm within the TTL; the sweeper expires the hold.
    h.clock.advance(ChronoDuration::minutes(11));
    let worker = HoldExpiryWorker::new(
        h.store.clone() as Arc<dyn BookingStore>,
        h.holds.clone(),
        h.clock.clone() as Arc<dyn Clock>,
        Duration::from_secs(60),
    );
    let expired = worker.sweep().await;
    assert_eq!(expired, 1);

    let after = h.store.get(booking.id).await.unwrap().unwrap();
    assert_eq!(after.status, BookingStatus::Expired);

    let expired_row = h.store.outbox_rows().pop().unwrap();
    assert_eq!(expired_row.topic, "booking.expired");

    // A fresh create for the same slot now succeeds.
    let fresh = h
        .coordinator
        .create(request(venue, table, (19, 0), 120), "t")
        .await
        .unwrap();
    assert_eq!(fresh.status, BookingStatus::Held);
    assert_ne!(fresh.id, booking.id);
}

#[tokio::test]
async fn sweep_is_idempotent_under_reruns() {
    let h = harness();
    h.coordinator
        .create(request(VenueId::new(), TableId::new(), (19, 0), 120), "t")
        .await
        .unwrap();

    h.clock.advance(ChronoDuration::minutes(11));
    let worker = HoldExpiryWorker::new(
        h.store.clone() as Arc<dyn BookingStore>,
        h.holds.clone(),
        h.clock.clone() as Arc<dyn Clock>,
        Duration::from_secs(60),
    );

    assert_eq!(worker.sweep().await, 1);
    // A second sweep (or a concurrent instance) finds nothing left in held.
    assert_eq!(worker.sweep().await, 0);
    // One expired event only.
    let expired_rows = h
        .store
        .outbox_rows()
        .into_iter()
        .filter(|r| r.topic == "booking.expired")
        .count();
    assert_eq!(expired_rows, 1);
}
