//! Venue catalogue endpoints.
//!
//! A thin CRUD surface over venues, rooms, and tables: enough to seed a
//! deployment and feed the availability planner. The booking engine itself
//! only reads the catalogue.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use booker_core::{RoomId, TableInfo, VenueId};
use booker_postgres::{Room, Venue};

use crate::error::AppError;
use crate::state::AppState;

/// Request to create a venue.
#[derive(Debug, Deserialize)]
pub struct CreateVenueRequest {
    /// Display name
    pub name: String,
    /// IANA timezone name
    pub timezone: String,
    /// Street address
    #[serde(default)]
    pub address: String,
}

/// Request to create a room.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    /// Display name
    pub name: String,
}

/// Request to create a table in a room.
#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    /// Display name
    pub name: String,
    /// Seats at the table
    pub capacity: i32,
    /// Whether the table may merge with a neighbour
    #[serde(default)]
    pub can_merge: bool,
    /// Floor zone
    #[serde(default)]
    pub zone: String,
}

/// Pagination for the venue list.
#[derive(Debug, Deserialize)]
pub struct ListVenuesQuery {
    /// Page size
    pub limit: Option<i64>,
    /// Page offset
    pub offset: Option<i64>,
}

/// Venue list page.
#[derive(Debug, Serialize)]
pub struct ListVenuesResponse {
    /// The page
    pub venues: Vec<Venue>,
}

/// POST /api/venues
pub async fn create_venue(
    State(state): State<AppState>,
    Json(request): Json<CreateVenueRequest>,
) -> Result<(StatusCode, Json<Venue>), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("venue name must not be empty"));
    }

    let venue = state
        .catalog
        .create_venue(&request.name, &request.timezone, &request.address)
        .await?;
    Ok((StatusCode::CREATED, Json(venue)))
}

/// GET /api/venues
pub async fn list_venues(
    State(state): State<AppState>,
    Query(query): Query<ListVenuesQuery>,
) -> Result<Json<ListVenuesResponse>, AppError> {
    let venues = state
        .catalog
        .list_venues(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(ListVenuesResponse { venues }))
}

/// POST /api/venues/:id/rooms
pub async fn create_room(
    State(state): State<AppState>,
    Path(venue_id): Path<Uuid>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    let venue_id = VenueId::from_uuid(venue_id);
    if state.catalog.get_venue(venue_id).await?.is_none() {
        return Err(AppError::not_found("Venue", venue_id));
    }

    let room = state.catalog.create_room(venue_id, &request.name).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/venues/:id/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    Path(venue_id): Path<Uuid>,
) -> Result<Json<Vec<Room>>, AppError> {
    let rooms = state
        .catalog
        .list_rooms(VenueId::from_uuid(venue_id))
        .await?;
    Ok(Json(rooms))
}

/// POST /api/rooms/:id/tables
pub async fn create_table(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<TableInfo>), AppError> {
    if request.capacity <= 0 {
        return Err(AppError::bad_request("table capacity must be positive"));
    }

    let table = state
        .catalog
        .create_table(
            RoomId::from_uuid(room_id),
            &request.name,
            request.capacity,
            request.can_merge,
            &request.zone,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(table)))
}

/// GET /api/venues/:id/tables
pub async fn list_tables(
    State(state): State<AppState>,
    Path(venue_id): Path<Uuid>,
) -> Result<Json<Vec<TableInfo>>, AppError> {
    let tables = state
        .catalog
        .list_tables(VenueId::from_uuid(venue_id))
        .await?;
    Ok(Json(tables))
}
