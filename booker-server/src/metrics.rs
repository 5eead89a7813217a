//! Business metrics for the booking engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `booker_bookings_created_total` - Bookings created in `held`
//! - `booker_transitions_total{status}` - Lifecycle transitions by target status
//! - `booker_holds_contended_total` - Creates that lost the hold race
//! - `booker_holds_expired_total` - Holds moved to `expired` by the sweeper
//! - `booker_outbox_dispatch_total{result}` - Dispatch outcomes
//!   (sent, retry, dlq, failed)

use metrics::describe_counter;

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are
/// recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "booker_bookings_created_total",
        "Total number of bookings created in held status"
    );
    describe_counter!(
        "booker_transitions_total",
        "Total number of lifecycle transitions by target status"
    );
    describe_counter!(
        "booker_holds_contended_total",
        "Total number of creates that lost the hold race"
    );
    describe_counter!(
        "booker_holds_expired_total",
        "Total number of holds expired by the sweeper"
    );
    describe_counter!(
        "booker_outbox_dispatch_total",
        "Total number of outbox dispatch outcomes (sent, retry, dlq, failed)"
    );

    tracing::info!("Business metrics registered");
}

/// Record a booking created in `held`.
pub fn record_booking_created() {
    metrics::counter!("booker_bookings_created_total").increment(1);
}

/// Record a lifecycle transition into `status`.
pub fn record_transition(status: &'static str) {
    metrics::counter!("booker_transitions_total", "status" => status).increment(1);
}

/// Record a create that lost the hold race.
pub fn record_hold_contended() {
    metrics::counter!("booker_holds_contended_total").increment(1);
}

/// Record a hold expired by the sweeper.
pub fn record_hold_expired() {
    metrics::counter!("booker_holds_expired_total").increment(1);
}

/// Record one outbox dispatch outcome.
pub fn record_outbox_dispatch(result: &'static str) {
    metrics::counter!("booker_outbox_dispatch_total", "result" => result).increment(1);
}
