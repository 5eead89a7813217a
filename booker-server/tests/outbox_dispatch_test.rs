//! Outbox dispatcher tests over the in-memory seams.
//!
//! Covers the retry/DLQ schedule, the dual-format decode path, per-booking
//! ordering, and the failed-row terminal state.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use booker_core::{
    BookingStore, Clock, EventEnvelope, OutboxStatus, TableId, VenueId,
};
use booker_server::workers::OutboxDispatcher;
use booker_server::{Coordinator, CreateBooking};
use booker_testing::{CapturingPublisher, ManualClock, MemoryBookingStore, MemoryHoldRegistry};

const HOLD_TTL: Duration = Duration::from_secs(600);
const BATCH: i64 = 10;
const MAX_RETRIES: i32 = 3;

struct Harness {
    store: Arc<MemoryBookingStore>,
    publisher: Arc<CapturingPublisher>,
    coordinator: Coordinator,
    dispatcher: OutboxDispatcher,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryBookingStore::new());
    let holds = Arc::new(MemoryHoldRegistry::new(clock.clone()));
    let publisher = Arc::new(CapturingPublisher::new());

    let coordinator = Coordinator::new(
        store.clone() as Arc<dyn BookingStore>,
        holds,
        clock as Arc<dyn Clock>,
        HOLD_TTL,
    );
    let dispatcher = OutboxDispatcher::new(
        store.clone() as Arc<dyn BookingStore>,
        publisher.clone(),
        BATCH,
        MAX_RETRIES,
        Duration::from_secs(5),
    );

    Harness {
        store,
        publisher,
        coordinator,
        dispatcher,
    }
}

async fn create_booking(h: &Harness) -> booker_core::Booking {
    h.coordinator
        .create(
            CreateBooking {
                venue_id: VenueId::new(),
                table_id: TableId::new(),
                date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                start_time: chrono::NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
                duration_minutes: 120,
                party_size: 4,
                customer_name: "Ada Lovelace".to_string(),
                customer_phone: "+34600000000".to_string(),
                comment: String::new(),
                admin_id: "admin-1".to_string(),
                idempotency_key: None,
            },
            "trace-1",
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn pending_rows_publish_in_creation_order_per_booking() {
    let h = harness();
    let booking = create_booking(&h).await;
    h.coordinator
        .confirm(booking.id, "admin-1", "trace-2")
        .await
        .unwrap();

    let sent = h.dispatcher.dispatch_batch().await;
    assert_eq!(sent, 2);

    let published = h.publisher.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].topic, "booking.held");
    assert_eq!(published[1].topic, "booking.confirmed");
    assert!(published.iter().all(|m| m.key == booking.id.to_string()));
    assert_eq!(published[0].trace_id, "trace-1");
    assert_eq!(published[1].trace_id, "trace-2");

    // Everything marked sent; the next tick finds nothing.
    assert!(h
        .store
        .outbox_rows()
        .iter()
        .all(|row| row.status == OutboxStatus::Sent && row.retry_count == 0));
    assert_eq!(h.dispatcher.dispatch_batch().await, 0);
}

#[tokio::test]
async fn publish_failures_retry_then_dead_letter() {
    let h = harness();
    create_booking(&h).await;

    // Four consecutive broker failures: three retries, then DLQ on the
    // fourth attempt.
    h.publisher.fail_next(4);

    for expected_retry in 1..=3 {
        assert_eq!(h.dispatcher.dispatch_batch().await, 0);
        let row = &h.store.outbox_rows()[0];
        assert_eq!(row.status, OutboxStatus::Pending);
        assert_eq!(row.retry_count, expected_retry);
    }

    assert_eq!(h.dispatcher.dispatch_batch().await, 0);
    let row = &h.store.outbox_rows()[0];
    assert_eq!(row.status, OutboxStatus::Dlq);
    assert_eq!(row.retry_count, 4);

    // Dead-lettered rows leave the pending scan for good.
    assert_eq!(h.dispatcher.dispatch_batch().await, 0);
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn success_on_second_attempt_keeps_the_retry_count() {
    let h = harness();
    create_booking(&h).await;

    h.publisher.fail_next(1);
    assert_eq!(h.dispatcher.dispatch_batch().await, 0);
    assert_eq!(h.dispatcher.dispatch_batch().await, 1);

    let row = &h.store.outbox_rows()[0];
    assert_eq!(row.status, OutboxStatus::Sent);
    assert_eq!(row.retry_count, 1);
}

#[tokio::test]
async fn legacy_json_rows_are_upgraded_on_the_wire() {
    let h = harness();
    create_booking(&h).await;

    // Rewrite the pending row as the legacy JSON encoding, as a row written
    // before the encoding change would look.
    let row = h.store.outbox_rows().pop().unwrap();
    let envelope = EventEnvelope::decode(&row.payload).unwrap();
    let legacy = serde_json::to_vec(&envelope).unwrap();
    h.store.set_outbox_payload(row.id, legacy);

    assert_eq!(h.dispatcher.dispatch_batch().await, 1);

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    // The wire payload is the current encoding again.
    let decoded = EventEnvelope::decode(&published[0].payload).unwrap();
    assert_eq!(decoded, envelope);
    assert!(bincode::deserialize::<EventEnvelope>(&published[0].payload).is_ok());
}

#[tokio::test]
async fn undecodable_rows_are_marked_failed_and_abandoned() {
    let h = harness();
    create_booking(&h).await;

    let row = h.store.outbox_rows().pop().unwrap();
    h.store
        .set_outbox_payload(row.id, b"{not an envelope".to_vec());

    assert_eq!(h.dispatcher.dispatch_batch().await, 0);

    let row = &h.store.outbox_rows()[0];
    assert_eq!(row.status, OutboxStatus::Failed);
    assert_eq!(row.retry_count, 1);

    // failed is terminal: the row is never picked up again.
    assert_eq!(h.dispatcher.dispatch_batch().await, 0);
    assert!(h.publisher.published().is_empty());
}

#[tokio::test]
async fn batch_size_bounds_each_tick() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(MemoryBookingStore::new());
    let holds = Arc::new(MemoryHoldRegistry::new(clock.clone()));
    let publisher = Arc::new(CapturingPublisher::new());
    let coordinator = Coordinator::new(
        store.clone() as Arc<dyn BookingStore>,
        holds,
        clock as Arc<dyn Clock>,
        HOLD_TTL,
    );
    let dispatcher = OutboxDispatcher::new(
        store.clone() as Arc<dyn BookingStore>,
        publisher.clone(),
        2, // batch of two
        MAX_RETRIES,
        Duration::from_secs(5),
    );

    for _ in 0..3 {
        coordinator
            .create(
                CreateBooking {
                    venue_id: VenueId::new(),
                    table_id: TableId::new(),
                    date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    start_time: chrono::NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
                    duration_minutes: 60,
                    party_size: 2,
                    customer_name: "Grace".to_string(),
                    customer_phone: String::new(),
                    comment: String::new(),
                    admin_id: "admin-1".to_string(),
                    idempotency_key: None,
                },
                "t",
            )
            .await
            .unwrap();
    }

    assert_eq!(dispatcher.dispatch_batch().await, 2);
    assert_eq!(dispatcher.dispatch_batch().await, 1);
    assert_eq!(publisher.published().len(), 3);
}
