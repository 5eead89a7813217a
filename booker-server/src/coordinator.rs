//! Lifecycle coordinator: drives bookings through the state machine.
//!
//! Create choreography: idempotency lookup → window computation → availability
//! pre-check → hold acquisition in the registry → one store transaction
//! (booking + journal event + outbox row + idempotency mapping). A store
//! failure after the hold was acquired always releases the hold before
//! returning.
//!
//! Transitions validate against the automaton, write through the store's
//! conditional update (so a concurrent transition cannot slip between read
//! and write), and release the hold afterwards. Re-issuing a transition whose
//! target equals the current status is a no-op success that enqueues nothing.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime};
use std::sync::Arc;
use std::time::Duration;

use booker_core::store::IdempotencyKey;
use booker_core::{
    hold_key, Booking, BookingError, BookingId, BookingStatus, BookingStore, Clock, EventEnvelope,
    EventPayload, HoldRegistry, TableId, VenueId,
};

use crate::metrics;

/// Inputs for a booking creation.
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// Target venue
    pub venue_id: VenueId,
    /// Target table
    pub table_id: TableId,
    /// Calendar date of the window
    pub date: NaiveDate,
    /// Start of the window
    pub start_time: NaiveTime,
    /// Requested duration in minutes; the stored end is `start + duration`
    pub duration_minutes: i64,
    /// Number of guests
    pub party_size: i32,
    /// Customer display name
    pub customer_name: String,
    /// Customer contact string
    pub customer_phone: String,
    /// Free-form comment
    pub comment: String,
    /// Acting admin identifier
    pub admin_id: String,
    /// Optional idempotency key, scoped to the acting admin
    pub idempotency_key: Option<String>,
}

/// Orchestrates lifecycle commands across the hold registry and the store.
pub struct Coordinator {
    store: Arc<dyn BookingStore>,
    holds: Arc<dyn HoldRegistry>,
    clock: Arc<dyn Clock>,
    hold_ttl: Duration,
}

impl Coordinator {
    /// Assemble a coordinator.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        holds: Arc<dyn HoldRegistry>,
        clock: Arc<dyn Clock>,
        hold_ttl: Duration,
    ) -> Self {
        Self {
            store,
            holds,
            clock,
            hold_ttl,
        }
    }

    /// Compute the half-open window for a create request.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidInput`] for non-positive durations and
    /// for windows that would cross midnight; advancing the date is the
    /// caller's move, a single booking never spans days.
    pub fn compute_window(
        start: NaiveTime,
        duration_minutes: i64,
    ) -> Result<NaiveTime, BookingError> {
        if duration_minutes <= 0 {
            return Err(BookingError::InvalidInput(
                "duration must be at least one minute".to_string(),
            ));
        }

        let (end, wrapped) =
            start.overflowing_add_signed(ChronoDuration::minutes(duration_minutes));
        if wrapped != 0 || end <= start {
            return Err(BookingError::InvalidInput(
                "booking window must not cross midnight".to_string(),
            ));
        }

        Ok(end)
    }

    /// Create a booking in `held`, claiming the slot.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidInput`] for malformed requests
    /// - [`BookingError::SlotUnavailable`] when the pre-check finds the table
    ///   occupied
    /// - [`BookingError::SlotHeld`] when the hold race is lost
    /// - [`BookingError::OccupancyConflict`] when the store constraint fires
    /// - [`BookingError::Transient`] on backend failure
    pub async fn create(
        &self,
        req: CreateBooking,
        trace_id: &str,
    ) -> Result<Booking, BookingError> {
        if req.party_size <= 0 {
            return Err(BookingError::InvalidInput(
                "party size must be positive".to_string(),
            ));
        }
        if req.customer_name.trim().is_empty() {
            return Err(BookingError::InvalidInput(
                "customer name must not be empty".to_string(),
            ));
        }

        // Idempotent replay: same admin, same key, same booking back.
        if let Some(key) = &req.idempotency_key {
            if let Some(existing_id) = self
                .store
                .find_by_idempotency_key(&req.admin_id, key)
                .await?
            {
                if let Some(existing) = self.store.get(existing_id).await? {
                    tracing::debug!(
                        booking_id = %existing_id,
                        admin_id = %req.admin_id,
                        "Create replayed via idempotency key"
                    );
                    return Ok(existing);
                }
                return Err(BookingError::Internal(format!(
                    "idempotency key maps to missing booking {existing_id}"
                )));
            }
        }

        let end_time = Self::compute_window(req.start_time, req.duration_minutes)?;

        // Fail fast while the slot is visibly taken; the hold and the store
        // constraint still guard the race below.
        let occupied = self
            .store
            .find_occupying(
                req.venue_id,
                &[req.table_id],
                req.date,
                req.start_time,
                end_time,
            )
            .await?;
        if !occupied.is_empty() {
            return Err(BookingError::SlotUnavailable);
        }

        let booking_id = BookingId::new();
        let key = hold_key(req.venue_id, req.table_id, req.date, req.start_time);

        let acquired = self
            .holds
            .acquire(&key, &booking_id.to_string(), self.hold_ttl)
            .await?;
        if !acquired {
            metrics::record_hold_contended();
            tracing::debug!(hold_key = %key, "Create lost the hold race");
            return Err(BookingError::SlotHeld);
        }

        let now = self.clock.now();
        let expires_at = now
            + ChronoDuration::from_std(self.hold_ttl)
                .map_err(|e| BookingError::Internal(e.to_string()))?;

        let booking = Booking {
            id: booking_id,
            venue_id: req.venue_id,
            table_id: req.table_id,
            date: req.date,
            start_time: req.start_time,
            end_time,
            party_size: req.party_size,
            customer_name: req.customer_name,
            customer_phone: req.customer_phone,
            status: BookingStatus::Held,
            comment: req.comment,
            admin_id: req.admin_id.clone(),
            created_at: now,
            updated_at: now,
            expires_at: Some(expires_at),
        };

        let envelope =
            EventEnvelope::new(booking_id, trace_id, now, EventPayload::Held { expires_at });
        let idempotency = req.idempotency_key.map(|k| IdempotencyKey {
            admin_id: req.admin_id,
            key: k,
        });

        if let Err(err) = self
            .store
            .create_booking(&booking, &envelope, idempotency.as_ref())
            .await
        {
            // The hold must never outlive a failed create.
            if let Err(release_err) = self.holds.release(&key).await {
                tracing::warn!(
                    hold_key = %key,
                    error = %release_err,
                    "Failed to release hold after create failure; it will expire on its own"
                );
            }
            return Err(err);
        }

        metrics::record_booking_created();
        tracing::info!(
            booking_id = %booking_id,
            venue_id = %booking.venue_id,
            table_id = %booking.table_id,
            date = %booking.date,
            expires_at = %expires_at,
            "Booking created in held status"
        );

        Ok(booking)
    }

    /// Confirm a held booking; clears the expiry deadline.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_to`].
    pub async fn confirm(
        &self,
        id: BookingId,
        admin_id: &str,
        trace_id: &str,
    ) -> Result<Booking, BookingError> {
        self.transition_to(
            id,
            BookingStatus::Confirmed,
            EventPayload::Confirmed {
                admin_id: admin_id.to_string(),
            },
            trace_id,
        )
        .await
    }

    /// Cancel a held or confirmed booking.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_to`].
    pub async fn cancel(
        &self,
        id: BookingId,
        admin_id: &str,
        reason: Option<String>,
        trace_id: &str,
    ) -> Result<Booking, BookingError> {
        self.transition_to(
            id,
            BookingStatus::Cancelled,
            EventPayload::Cancelled {
                admin_id: admin_id.to_string(),
                reason,
            },
            trace_id,
        )
        .await
    }

    /// Seat the guests of a confirmed booking.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_to`].
    pub async fn seat(
        &self,
        id: BookingId,
        admin_id: &str,
        trace_id: &str,
    ) -> Result<Booking, BookingError> {
        self.transition_to(
            id,
            BookingStatus::Seated,
            EventPayload::Seated {
                admin_id: admin_id.to_string(),
            },
            trace_id,
        )
        .await
    }

    /// Finish a seated booking.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_to`].
    pub async fn finish(
        &self,
        id: BookingId,
        admin_id: &str,
        trace_id: &str,
    ) -> Result<Booking, BookingError> {
        self.transition_to(
            id,
            BookingStatus::Finished,
            EventPayload::Finished {
                admin_id: admin_id.to_string(),
            },
            trace_id,
        )
        .await
    }

    /// Mark a seated booking as a no-show.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_to`].
    pub async fn no_show(
        &self,
        id: BookingId,
        admin_id: &str,
        trace_id: &str,
    ) -> Result<Booking, BookingError> {
        self.transition_to(
            id,
            BookingStatus::NoShow,
            EventPayload::NoShow {
                admin_id: admin_id.to_string(),
            },
            trace_id,
        )
        .await
    }

    /// Drive one booking along an edge of the automaton.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] when the booking does not exist
    /// - [`BookingError::InvalidTransition`] when the edge is absent
    /// - [`BookingError::Transient`] on backend failure
    async fn transition_to(
        &self,
        id: BookingId,
        to: BookingStatus,
        payload: EventPayload,
        trace_id: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self
            .store
            .get(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        // Re-issuing the transition a booking already took is a no-op
        // success: no journal entry, no outbox row.
        if booking.status == to {
            return Ok(booking);
        }

        if !booking.status.can_transition_to(to) {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to,
            });
        }

        let envelope = EventEnvelope::new(id, trace_id, self.clock.now(), payload);
        let updated = self
            .store
            .transition(id, BookingStatus::valid_sources(to), to, &envelope)
            .await?;

        match updated {
            Some(updated) => {
                self.release_hold(&updated).await;
                metrics::record_transition(to.as_str());
                tracing::info!(
                    booking_id = %id,
                    from = %booking.status,
                    to = %to,
                    "Booking transitioned"
                );
                Ok(updated)
            }
            None => {
                // The status moved between our read and the conditional
                // update. Re-read so the answer reflects what actually won.
                let current = self
                    .store
                    .get(id)
                    .await?
                    .ok_or(BookingError::NotFound(id))?;
                if current.status == to {
                    Ok(current)
                } else {
                    Err(BookingError::InvalidTransition {
                        from: current.status,
                        to,
                    })
                }
            }
        }
    }

    /// Best-effort hold release after a successful transition. Redis failures
    /// are logged, never propagated: the record expires on its own.
    async fn release_hold(&self, booking: &Booking) {
        let key = hold_key(
            booking.venue_id,
            booking.table_id,
            booking.date,
            booking.start_time,
        );
        if let Err(err) = self.holds.release(&key).await {
            tracing::warn!(
                hold_key = %key,
                booking_id = %booking.id,
                error = %err,
                "Failed to release hold; it will expire on its own"
            );
        }
    }
}
