//! `PostgreSQL` implementation of the booking store.
//!
//! Every mutating operation runs in one transaction spanning the booking row,
//! the journal append, and the outbox insert. The occupancy invariant is
//! enforced twice inside `create_booking`: an overlap re-check query inside
//! the transaction, and the `bookings_no_overlap` exclusion constraint as the
//! last line of defense against anything that slips past the re-check.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use booker_core::{
    Booking, BookingError, BookingFilters, BookingId, BookingStatus, BoxFuture, EventEnvelope,
    OutboxId, OutboxRow, OutboxStatus, TableId, VenueId,
};
use booker_core::store::{BookingStore, IdempotencyKey};

/// `PostgreSQL`-backed booking store.
pub struct PostgresBookingStore {
    pool: PgPool,
}

const BOOKING_COLUMNS: &str = "id, venue_id, table_id, date, start_time, end_time, party_size, \
     customer_name, customer_phone, status, comment, admin_id, created_at, updated_at, expires_at";

/// Row shape shared by every booking query.
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    venue_id: Uuid,
    table_id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    party_size: i32,
    customer_name: String,
    customer_phone: String,
    status: String,
    comment: String,
    admin_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, BookingError> {
        let status = BookingStatus::parse(&self.status).ok_or_else(|| {
            BookingError::Internal(format!(
                "booking {} has unknown status {:?} in database",
                self.id, self.status
            ))
        })?;

        Ok(Booking {
            id: BookingId::from_uuid(self.id),
            venue_id: VenueId::from_uuid(self.venue_id),
            table_id: TableId::from_uuid(self.table_id),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            party_size: self.party_size,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            status,
            comment: self.comment,
            admin_id: self.admin_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
        })
    }
}

fn transient(e: sqlx::Error) -> BookingError {
    BookingError::Transient(e.to_string())
}

/// Map an insert failure, distinguishing the occupancy guard from plain I/O
/// trouble. 23P01 is `exclusion_violation`.
fn map_insert_err(e: sqlx::Error) -> BookingError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.code().as_deref() == Some("23P01") {
            return BookingError::OccupancyConflict;
        }
    }
    transient(e)
}

impl PostgresBookingStore {
    /// Create a store from a database URL.
    ///
    /// This creates a connection pool with default settings (max 5
    /// connections). For custom pooling, build a [`PgPool`] and use
    /// [`Self::from_pool`].
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] if the database is unreachable.
    pub async fn new(database_url: &str) -> Result<Self, BookingError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(transient)?;

        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool.
    ///
    /// Useful when the pool is shared with the venue catalogue.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run all pending SQL migrations from the workspace `migrations/`
    /// directory. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] if a migration fails to execute.
    pub async fn run_migrations(&self) -> Result<(), BookingError> {
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BookingError::Transient(format!("migration failed: {e}")))?;

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }

    async fn insert_journal_and_outbox(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        envelope: &EventEnvelope,
    ) -> Result<(), BookingError> {
        let journal_payload = serde_json::to_value(&envelope.payload)
            .map_err(|e| BookingError::Internal(format!("journal payload encoding: {e}")))?;

        sqlx::query(
            "INSERT INTO booking_events (id, booking_id, type, payload, ts)
             VALUES ($1, $2, $3, $4, now())",
        )
        .bind(envelope.event_id)
        .bind(envelope.booking_id.as_uuid())
        .bind(envelope.kind.as_str())
        .bind(&journal_payload)
        .execute(&mut **tx)
        .await
        .map_err(transient)?;

        let wire_payload = envelope
            .encode()
            .map_err(|e| BookingError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO outbox (id, topic, key, payload, status, retry_count, created_at)
             VALUES ($1, $2, $3, $4, 'pending', 0, now())",
        )
        .bind(Uuid::new_v4())
        .bind(envelope.topic())
        .bind(envelope.booking_id.to_string())
        .bind(&wire_payload)
        .execute(&mut **tx)
        .await
        .map_err(transient)?;

        Ok(())
    }
}

impl BookingStore for PostgresBookingStore {
    fn create_booking<'a>(
        &'a self,
        booking: &'a Booking,
        envelope: &'a EventEnvelope,
        idempotency: Option<&'a IdempotencyKey>,
    ) -> BoxFuture<'a, Result<(), BookingError>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(transient)?;

            // Overlap re-check inside the transaction. The exclusion
            // constraint would also catch this, but the re-check produces a
            // clean error instead of a constraint violation in the common
            // bypass case.
            let occupied: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM bookings
                 WHERE venue_id = $1 AND table_id = $2 AND date = $3
                   AND status IN ('held', 'confirmed', 'seated')
                   AND start_time < $5 AND $4 < end_time",
            )
            .bind(booking.venue_id.as_uuid())
            .bind(booking.table_id.as_uuid())
            .bind(booking.date)
            .bind(booking.start_time)
            .bind(booking.end_time)
            .fetch_one(&mut *tx)
            .await
            .map_err(transient)?;

            if occupied > 0 {
                tracing::warn!(
                    booking_id = %booking.id,
                    venue_id = %booking.venue_id,
                    table_id = %booking.table_id,
                    "Overlap re-check rejected insert; hold layer was bypassed"
                );
                return Err(BookingError::OccupancyConflict);
            }

            sqlx::query(
                "INSERT INTO bookings (id, venue_id, table_id, date, start_time, end_time,
                     party_size, customer_name, customer_phone, status, comment, admin_id,
                     created_at, updated_at, expires_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            )
            .bind(booking.id.as_uuid())
            .bind(booking.venue_id.as_uuid())
            .bind(booking.table_id.as_uuid())
            .bind(booking.date)
            .bind(booking.start_time)
            .bind(booking.end_time)
            .bind(booking.party_size)
            .bind(&booking.customer_name)
            .bind(&booking.customer_phone)
            .bind(booking.status.as_str())
            .bind(&booking.comment)
            .bind(&booking.admin_id)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .bind(booking.expires_at)
            .execute(&mut *tx)
            .await
            .map_err(map_insert_err)?;

            Self::insert_journal_and_outbox(&mut tx, envelope).await?;

            if let Some(idem) = idempotency {
                sqlx::query(
                    "INSERT INTO idempotency_keys (admin_id, key, booking_id, created_at)
                     VALUES ($1, $2, $3, now())",
                )
                .bind(&idem.admin_id)
                .bind(&idem.key)
                .bind(booking.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(transient)?;
            }

            tx.commit().await.map_err(map_insert_err)?;

            tracing::debug!(
                booking_id = %booking.id,
                venue_id = %booking.venue_id,
                table_id = %booking.table_id,
                "Booking inserted with journal event and outbox row"
            );

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
            let mut tx = self.pool.begin().await.map_err(transient)?;

            let expected: Vec<String> = expected_from
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();

            let sql = format!(
                "UPDATE bookings
                 SET status = $2,
                     updated_at = now(),
                     expires_at = CASE WHEN $3 THEN NULL ELSE expires_at END
                 WHERE id = $1 AND status = ANY($4)
                 RETURNING {BOOKING_COLUMNS}"
            );

            let row: Option<BookingRow> = sqlx::query_as(&sql)
                .bind(id.as_uuid())
                .bind(to.as_str())
                .bind(to.clears_expiry())
                .bind(&expected)
                .fetch_optional(&mut *tx)
                .await
                .map_err(transient)?;

            let Some(row) = row else {
                // Nothing matched: the booking is gone or its status moved
                // underneath the caller. Leave no trace.
                return Ok(None);
            };

            Self::insert_journal_and_outbox(&mut tx, envelope).await?;

            tx.commit().await.map_err(transient)?;

            let booking = row.into_booking()?;
            tracing::debug!(
                booking_id = %id,
                status = %to,
                "Booking transitioned with journal event and outbox row"
            );

            Ok(Some(booking))
        })
    }

    fn get(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>, BookingError>> {
        Box::pin(async move {
            let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
            let row: Option<BookingRow> = sqlx::query_as(&sql)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(transient)?;

            row.map(BookingRow::into_booking).transpose()
        })
    }

    fn list<'a>(
        &'a self,
        filters: &'a BookingFilters,
    ) -> BoxFuture<'a, Result<(Vec<Booking>, i64), BookingError>> {
        Box::pin(async move {
            let venue = filters.venue_id.map(|v| *v.as_uuid());
            let table = filters.table_id.map(|t| *t.as_uuid());
            let status = filters.status.map(|s| s.as_str().to_string());
            let limit = if filters.limit > 0 { filters.limit } else { 50 };

            const WHERE_CLAUSE: &str = "($1::uuid IS NULL OR venue_id = $1)
                   AND ($2::uuid IS NULL OR table_id = $2)
                   AND ($3::date IS NULL OR date = $3)
                   AND ($4::text IS NULL OR status = $4)";

            let total: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM bookings WHERE {WHERE_CLAUSE}"
            ))
            .bind(venue)
            .bind(table)
            .bind(filters.date)
            .bind(&status)
            .fetch_one(&self.pool)
            .await
            .map_err(transient)?;

            let rows: Vec<BookingRow> = sqlx::query_as(&format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE {WHERE_CLAUSE}
                 ORDER BY date, start_time
                 LIMIT $5 OFFSET $6"
            ))
            .bind(venue)
            .bind(table)
            .bind(filters.date)
            .bind(&status)
            .bind(limit)
            .bind(filters.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(transient)?;

            let bookings = rows
                .into_iter()
                .map(BookingRow::into_booking)
                .collect::<Result<Vec<_>, _>>()?;

            Ok((bookings, total))
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
            if table_ids.is_empty() {
                return Ok(HashSet::new());
            }

            let ids: Vec<Uuid> = table_ids.iter().map(|t| *t.as_uuid()).collect();

            let occupied: Vec<Uuid> = sqlx::query_scalar(
                "SELECT DISTINCT table_id FROM bookings
                 WHERE venue_id = $1 AND table_id = ANY($2) AND date = $3
                   AND status IN ('held', 'confirmed', 'seated')
                   AND start_time < $5 AND $4 < end_time",
            )
            .bind(venue_id.as_uuid())
            .bind(&ids)
            .bind(date)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(transient)?;

            Ok(occupied.into_iter().map(TableId::from_uuid).collect())
        })
    }

    fn list_expired_holds(
        &self,
        now: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Booking>, BookingError>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE status = 'held' AND expires_at < $1
                 ORDER BY expires_at"
            );
            let rows: Vec<BookingRow> = sqlx::query_as(&sql)
                .bind(now)
                .fetch_all(&self.pool)
                .await
                .map_err(transient)?;

            rows.into_iter().map(BookingRow::into_booking).collect()
        })
    }

    fn list_pending_outbox(
        &self,
        limit: i64,
    ) -> BoxFuture<'_, Result<Vec<OutboxRow>, BookingError>> {
        Box::pin(async move {
            let rows: Vec<(Uuid, String, String, Vec<u8>, String, i32, DateTime<Utc>)> =
                sqlx::query_as(
                    "SELECT id, topic, key, payload, status, retry_count, created_at
                     FROM outbox
                     WHERE status = 'pending'
                     ORDER BY created_at, seq
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(transient)?;

            rows.into_iter()
                .map(|(id, topic, key, payload, status, retry_count, created_at)| {
                    let status = OutboxStatus::parse(&status).ok_or_else(|| {
                        BookingError::Internal(format!(
                            "outbox row {id} has unknown status {status:?}"
                        ))
                    })?;
                    Ok(OutboxRow {
                        id: OutboxId::from_uuid(id),
                        topic,
                        key,
                        payload,
                        status,
                        retry_count,
                        created_at,
                    })
                })
                .collect()
        })
    }

    fn update_outbox_status(
        &self,
        id: OutboxId,
        status: OutboxStatus,
        retry_count: i32,
    ) -> BoxFuture<'_, Result<(), BookingError>> {
        Box::pin(async move {
            sqlx::query("UPDATE outbox SET status = $2, retry_count = $3 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(status.as_str())
                .bind(retry_count)
                .execute(&self.pool)
                .await
                .map_err(transient)?;

            Ok(())
        })
    }

    fn find_by_idempotency_key<'a>(
        &'a self,
        admin_id: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<BookingId>, BookingError>> {
        Box::pin(async move {
            let booking_id: Option<Uuid> = sqlx::query_scalar(
                "SELECT booking_id FROM idempotency_keys WHERE admin_id = $1 AND key = $2",
            )
            .bind(admin_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;

            Ok(booking_id.map(BookingId::from_uuid))
        })
    }

    fn purge_idempotency_keys(
        &self,
        before: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<u64, BookingError>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM idempotency_keys WHERE created_at < $1")
                .bind(before)
                .execute(&self.pool)
                .await
                .map_err(transient)?;

            Ok(result.rows_affected())
        })
    }
}
