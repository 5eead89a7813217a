//! HTTP API for the booking engine.
//!
//! One route per lifecycle transition plus read endpoints, the availability
//! query, and the venue catalogue basics. Framing is plain HTTP+JSON; the
//! semantics live in the coordinator. Admin identity arrives in request
//! bodies and is trusted; authenticating it is the gateway's job.

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::AppState;

pub mod availability;
pub mod bookings;
pub mod health;
pub mod venues;

/// Build the full application router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/bookings/:id/confirm", post(bookings::confirm_booking))
        .route("/api/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/api/bookings/:id/seat", post(bookings::seat_booking))
        .route("/api/bookings/:id/finish", post(bookings::finish_booking))
        .route("/api/bookings/:id/no-show", post(bookings::no_show_booking))
        .route("/api/availability", get(availability::check_availability))
        .route(
            "/api/venues",
            post(venues::create_venue).get(venues::list_venues),
        )
        .route(
            "/api/venues/:id/rooms",
            post(venues::create_room).get(venues::list_rooms),
        )
        .route("/api/venues/:id/tables", get(venues::list_tables))
        .route("/api/rooms/:id/tables", post(venues::create_table))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Trace id for a request: the gateway's `x-request-id` when present, a
/// fresh id otherwise. Propagated into every event envelope the request
/// produces.
pub(crate) fn trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
