//! Booking lifecycle endpoints.
//!
//! - POST /api/bookings - Create a booking (claims a hold on the slot)
//! - GET /api/bookings - List bookings with filters
//! - GET /api/bookings/:id - Fetch one booking
//! - POST /api/bookings/:id/confirm|cancel|seat|finish|no-show - Transitions

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use booker_core::{Booking, BookingFilters, BookingId, BookingStatus, TableId, VenueId};

use crate::api::trace_id;
use crate::coordinator::CreateBooking;
use crate::error::AppError;
use crate::state::AppState;

/// Parse a wall-clock time accepting both `HH:MM` and `HH:MM:SS`.
pub(crate) fn parse_time(value: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::bad_request(format!("invalid time {value:?}, expected HH:MM")))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a new booking.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Target venue
    pub venue_id: Uuid,
    /// Target table
    pub table_id: Uuid,
    /// Calendar date, `YYYY-MM-DD`
    pub date: NaiveDate,
    /// Start of the window, `HH:MM`
    pub start_time: String,
    /// Duration in minutes
    pub duration_minutes: i64,
    /// Number of guests
    pub party_size: i32,
    /// Customer display name
    pub customer_name: String,
    /// Customer contact string
    #[serde(default)]
    pub customer_phone: String,
    /// Free-form comment
    #[serde(default)]
    pub comment: String,
    /// Acting admin identifier
    #[serde(default)]
    pub admin_id: String,
    /// Optional idempotency key, scoped to the acting admin
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Body shared by the transition endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct TransitionRequest {
    /// Acting admin identifier
    #[serde(default)]
    pub admin_id: String,
    /// Reason, used by cancel
    #[serde(default)]
    pub reason: Option<String>,
}

/// Booking representation returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    /// Booking identifier
    pub id: Uuid,
    /// Venue identifier
    pub venue_id: Uuid,
    /// Table identifier
    pub table_id: Uuid,
    /// Calendar date
    pub date: NaiveDate,
    /// Start of the window
    pub start_time: NaiveTime,
    /// End of the window (exclusive)
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
    /// Acting admin identifier
    pub admin_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Hold deadline, present only while held
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: *b.id.as_uuid(),
            venue_id: *b.venue_id.as_uuid(),
            table_id: *b.table_id.as_uuid(),
            date: b.date,
            start_time: b.start_time,
            end_time: b.end_time,
            party_size: b.party_size,
            customer_name: b.customer_name,
            customer_phone: b.customer_phone,
            status: b.status,
            comment: b.comment,
            admin_id: b.admin_id,
            created_at: b.created_at,
            updated_at: b.updated_at,
            expires_at: b.expires_at,
        }
    }
}

/// Filters for the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    /// Restrict to one venue
    pub venue_id: Option<Uuid>,
    /// Restrict to one table
    pub table_id: Option<Uuid>,
    /// Restrict to one date
    pub date: Option<NaiveDate>,
    /// Restrict to one status
    pub status: Option<String>,
    /// Page size
    pub limit: Option<i64>,
    /// Page offset
    pub offset: Option<i64>,
}

/// Page of bookings plus the total match count.
#[derive(Debug, Serialize)]
pub struct ListBookingsResponse {
    /// The page
    pub bookings: Vec<BookingResponse>,
    /// Total matches across all pages
    pub total: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new booking. Returns 201 with the booking in `held`, or 409 when
/// the slot is occupied or held by a concurrent create.
pub async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let start_time = parse_time(&request.start_time)?;
    let trace = trace_id(&headers);

    let booking = state
        .coordinator
        .create(
            CreateBooking {
                venue_id: VenueId::from_uuid(request.venue_id),
                table_id: TableId::from_uuid(request.table_id),
                date: request.date,
                start_time,
                duration_minutes: request.duration_minutes,
                party_size: request.party_size,
                customer_name: request.customer_name,
                customer_phone: request.customer_phone,
                comment: request.comment,
                admin_id: request.admin_id,
                idempotency_key: request.idempotency_key,
            },
            &trace,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// List bookings with optional filters.
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<ListBookingsResponse>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::bad_request(format!("unknown status {s:?}")))
        })
        .transpose()?;

    let filters = BookingFilters {
        venue_id: query.venue_id.map(VenueId::from_uuid),
        table_id: query.table_id.map(TableId::from_uuid),
        date: query.date,
        status,
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
    };

    let (bookings, total) = state.store.list(&filters).await?;
    Ok(Json(ListBookingsResponse {
        bookings: bookings.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// Fetch one booking.
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let id = BookingId::from_uuid(id);
    let booking = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking", id))?;
    Ok(Json(booking.into()))
}

/// Confirm a held booking.
pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let trace = trace_id(&headers);
    let booking = state
        .coordinator
        .confirm(BookingId::from_uuid(id), &request.admin_id, &trace)
        .await?;
    Ok(Json(booking.into()))
}

/// Cancel a held or confirmed booking.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let trace = trace_id(&headers);
    let booking = state
        .coordinator
        .cancel(
            BookingId::from_uuid(id),
            &request.admin_id,
            request.reason,
            &trace,
        )
        .await?;
    Ok(Json(booking.into()))
}

/// Seat the guests of a confirmed booking.
pub async fn seat_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let trace = trace_id(&headers);
    let booking = state
        .coordinator
        .seat(BookingId::from_uuid(id), &request.admin_id, &trace)
        .await?;
    Ok(Json(booking.into()))
}

/// Finish a seated booking.
pub async fn finish_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let trace = trace_id(&headers);
    let booking = state
        .coordinator
        .finish(BookingId::from_uuid(id), &request.admin_id, &trace)
        .await?;
    Ok(Json(booking.into()))
}

/// Mark a seated booking as a no-show.
pub async fn no_show_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let trace = trace_id(&headers);
    let booking = state
        .coordinator
        .no_show(BookingId::from_uuid(id), &request.admin_id, &trace)
        .await?;
    Ok(Json(booking.into()))
}
