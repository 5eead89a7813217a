//! The hold registry seam: a keyed ephemeral store with atomic
//! "acquire slot or fail" semantics and automatic reclamation.
//!
//! The production implementation lives in `booker-redis`; an in-memory double
//! lives in `booker-testing`. TTL expiry is best-effort: the registry may
//! retain a key slightly past its deadline, which is why the booking store's
//! occupancy constraint is the authoritative guard.

use chrono::NaiveDate;
use chrono::NaiveTime;
use std::time::Duration;

use crate::error::BookingError;
use crate::types::{TableId, VenueId};
use crate::BoxFuture;

/// Deterministic fingerprint of a reservable slot.
///
/// Minute resolution on the start time; the end time does not participate
/// because two creates for the same start are by definition contenders.
#[must_use]
pub fn hold_key(venue_id: VenueId, table_id: TableId, date: NaiveDate, start: NaiveTime) -> String {
    format!(
        "hold:{venue_id}:{table_id}:{date}:{}",
        start.format("%H:%M")
    )
}

/// Arbiter of "who holds slot S right now".
pub trait HoldRegistry: Send + Sync {
    /// Atomically bind `owner` to `key` with the given TTL.
    ///
    /// Returns `Ok(true)` iff no value existed for `key`; `Ok(false)` means
    /// the race was lost. Idempotency is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] when the backend is unreachable;
    /// acquisition must fail loudly so the coordinator aborts the create.
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        owner: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<bool, BookingError>>;

    /// Remove `key`. Idempotent; does not check ownership, the coordinator
    /// ensures only the current owner calls this.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend failure. Callers log
    /// and ignore it: the record will expire on its own.
    fn release<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BookingError>>;

    /// Current owner of `key`, for diagnostics and idempotency checks.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] on backend failure.
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, BookingError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn key_is_minute_resolution() {
        let venue = VenueId::new();
        let table = TableId::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let start = NaiveTime::from_hms_opt(19, 0, 0).unwrap();

        let key = hold_key(venue, table, date, start);
        assert_eq!(key, format!("hold:{venue}:{table}:2024-01-15:19:00"));
    }

    #[test]
    fn key_is_deterministic() {
        let venue = VenueId::new();
        let table = TableId::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let start = NaiveTime::from_hms_opt(12, 30, 0).unwrap();

        assert_eq!(
            hold_key(venue, table, date, start),
            hold_key(venue, table, date, start)
        );
    }
}
