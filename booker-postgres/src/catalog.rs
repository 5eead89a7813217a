//! Venue catalogue: venues, rooms, and tables.
//!
//! A dumb CRUD store. The booking engine only reads it (the availability
//! planner needs each table's room, capacity, merge flag, and zone), but
//! create operations exist so a deployment can be seeded over the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use booker_core::{BookingError, RoomId, TableId, TableInfo, VenueId};

/// A venue: one physical location with rooms and tables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Venue {
    /// Venue identifier
    pub id: VenueId,
    /// Display name
    pub name: String,
    /// IANA timezone name, e.g. "Europe/Madrid"
    pub timezone: String,
    /// Street address
    pub address: String,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of last update
    pub updated_at: DateTime<Utc>,
}

/// A room within a venue. Tables can only merge within one room.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    /// Room identifier
    pub id: RoomId,
    /// Owning venue
    pub venue_id: VenueId,
    /// Display name
    pub name: String,
}

fn transient(e: sqlx::Error) -> BookingError {
    BookingError::Transient(e.to_string())
}

/// Read/write access to the venue catalogue.
#[derive(Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Create a catalogue over an existing pool (shared with the booking
    /// store).
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a venue.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    pub async fn create_venue(
        &self,
        name: &str,
        timezone: &str,
        address: &str,
    ) -> Result<Venue, BookingError> {
        let id = VenueId::new();
        let row: (DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO venues (id, name, timezone, address)
             VALUES ($1, $2, $3, $4)
             RETURNING created_at, updated_at",
        )
        .bind(id.as_uuid())
        .bind(name)
        .bind(timezone)
        .bind(address)
        .fetch_one(&self.pool)
        .await
        .map_err(transient)?;

        tracing::info!(venue_id = %id, name, "Venue created");

        Ok(Venue {
            id,
            name: name.to_string(),
            timezone: timezone.to_string(),
            address: address.to_string(),
            created_at: row.0,
            updated_at: row.1,
        })
    }

    /// Fetch one venue.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    pub async fn get_venue(&self, id: VenueId) -> Result<Option<Venue>, BookingError> {
        let row: Option<(Uuid, String, String, String, DateTime<Utc>, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, name, timezone, address, created_at, updated_at
                 FROM venues WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;

        Ok(row.map(|(id, name, timezone, address, created_at, updated_at)| Venue {
            id: VenueId::from_uuid(id),
            name,
            timezone,
            address,
            created_at,
            updated_at,
        }))
    }

    /// List venues, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    pub async fn list_venues(&self, limit: i64, offset: i64) -> Result<Vec<Venue>, BookingError> {
        let rows: Vec<(Uuid, String, String, String, DateTime<Utc>, DateTime<Utc>)> =
            sqlx::query_as(
                "SELECT id, name, timezone, address, created_at, updated_at
                 FROM venues ORDER BY created_at LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(transient)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, timezone, address, created_at, updated_at)| Venue {
                id: VenueId::from_uuid(id),
                name,
                timezone,
                address,
                created_at,
                updated_at,
            })
            .collect())
    }

    /// Create a room in a venue.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure (including
    /// an unknown venue id).
    pub async fn create_room(&self, venue_id: VenueId, name: &str) -> Result<Room, BookingError> {
        let id = RoomId::new();
        sqlx::query("INSERT INTO rooms (id, venue_id, name) VALUES ($1, $2, $3)")
            .bind(id.as_uuid())
            .bind(venue_id.as_uuid())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(transient)?;

        Ok(Room {
            id,
            venue_id,
            name: name.to_string(),
        })
    }

    /// List rooms of a venue.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    pub async fn list_rooms(&self, venue_id: VenueId) -> Result<Vec<Room>, BookingError> {
        let rows: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
            "SELECT id, venue_id, name FROM rooms WHERE venue_id = $1 ORDER BY created_at",
        )
        .bind(venue_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        Ok(rows
            .into_iter()
            .map(|(id, venue_id, name)| Room {
                id: RoomId::from_uuid(id),
                venue_id: VenueId::from_uuid(venue_id),
                name,
            })
            .collect())
    }

    /// Create a table in a room. The owning venue is derived from the room.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`]-free variants only: unknown rooms
    /// surface as [`BookingError::InvalidInput`]; I/O failures as
    /// [`BookingError::Transient`].
    pub async fn create_table(
        &self,
        room_id: RoomId,
        name: &str,
        capacity: i32,
        can_merge: bool,
        zone: &str,
    ) -> Result<TableInfo, BookingError> {
        let venue_id: Option<Uuid> = sqlx::query_scalar("SELECT venue_id FROM rooms WHERE id = $1")
            .bind(room_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;

        let Some(venue_id) = venue_id else {
            return Err(BookingError::InvalidInput(format!(
                "room {room_id} does not exist"
            )));
        };

        let id = TableId::new();
        sqlx::query(
            "INSERT INTO venue_tables (id, room_id, venue_id, name, capacity, can_merge, zone)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id.as_uuid())
        .bind(room_id.as_uuid())
        .bind(venue_id)
        .bind(name)
        .bind(capacity)
        .bind(can_merge)
        .bind(zone)
        .execute(&self.pool)
        .await
        .map_err(transient)?;

        tracing::info!(table_id = %id, room_id = %room_id, capacity, "Table created");

        Ok(TableInfo {
            id,
            room_id,
            name: name.to_string(),
            capacity,
            can_merge,
            zone: zone.to_string(),
        })
    }

    /// All tables of a venue, the planner's working set.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend I/O failure.
    pub async fn list_tables(&self, venue_id: VenueId) -> Result<Vec<TableInfo>, BookingError> {
        let rows: Vec<(Uuid, Uuid, String, i32, bool, String)> = sqlx::query_as(
            "SELECT id, room_id, name, capacity, can_merge, zone
             FROM venue_tables WHERE venue_id = $1 ORDER BY name",
        )
        .bind(venue_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        Ok(rows
            .into_iter()
            .map(|(id, room_id, name, capacity, can_merge, zone)| TableInfo {
                id: TableId::from_uuid(id),
                room_id: RoomId::from_uuid(room_id),
                name,
                capacity,
                can_merge,
                zone,
            })
            .collect())
    }
}
