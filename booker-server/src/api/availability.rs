//! Availability endpoint.
//!
//! GET /api/availability - candidate tables (or merged pairs) for a party at
//! a slot. A pure read over the catalogue and the booking store; takes no
//! holds, so a returned candidate can still be lost to a concurrent create.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use booker_core::VenueId;

use crate::api::bookings::parse_time;
use crate::coordinator::Coordinator;
use crate::error::AppError;
use crate::planner::{plan_candidates, TableCandidate};
use crate::state::AppState;

/// Query parameters for the availability check.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Venue to search
    pub venue_id: Uuid,
    /// Calendar date, `YYYY-MM-DD`
    pub date: NaiveDate,
    /// Start of the window, `HH:MM`
    pub start_time: String,
    /// Duration in minutes
    pub duration_minutes: i64,
    /// Number of guests
    pub party_size: i32,
}

/// Candidates for the requested slot.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    /// Every viable seating, singletons first when any exist
    pub candidates: Vec<TableCandidate>,
}

/// Compute seating candidates for a party at a slot.
pub async fn check_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    if query.party_size <= 0 {
        return Err(AppError::bad_request("party size must be positive"));
    }

    let start = parse_time(&query.start_time)?;
    let end = Coordinator::compute_window(start, query.duration_minutes)?;

    let venue_id = VenueId::from_uuid(query.venue_id);
    let tables = state.catalog.list_tables(venue_id).await?;
    if tables.is_empty() {
        return Ok(Json(AvailabilityResponse { candidates: vec![] }));
    }

    let table_ids: Vec<_> = tables.iter().map(|t| t.id).collect();
    let occupied = state
        .store
        .find_occupying(venue_id, &table_ids, query.date, start, end)
        .await?;

    let candidates = plan_candidates(&tables, &occupied, query.party_size);
    Ok(Json(AvailabilityResponse { candidates }))
}
