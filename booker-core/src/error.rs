//! Error types surfaced by the booking engine.

use crate::status::BookingStatus;
use crate::types::BookingId;
use thiserror::Error;

/// Errors that can occur during booking lifecycle operations.
#[derive(Error, Debug)]
pub enum BookingError {
    /// The availability pre-check found the table busy for the slot.
    #[error("table is not available for the requested slot")]
    SlotUnavailable,

    /// Hold acquisition lost the race: another create holds the slot.
    #[error("slot is currently held by another booking attempt")]
    SlotHeld,

    /// The store's exclusion constraint rejected the insert. Rare; means the
    /// hold layer was bypassed (expired hold, registry outage).
    #[error("occupancy conflict: an overlapping booking already exists")]
    OccupancyConflict,

    /// The requested transition is not an edge of the lifecycle automaton.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Status the booking was observed in.
        from: BookingStatus,
        /// Status the caller asked for.
        to: BookingStatus,
    },

    /// Referenced booking does not exist.
    #[error("booking {0} not found")]
    NotFound(BookingId),

    /// The request itself is malformed (zero duration, cross-midnight window,
    /// non-positive party size).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Backend I/O failure; the caller may retry.
    #[error("transient backend error: {0}")]
    Transient(String),

    /// Invariant violation. Should never occur; logged with a diagnostic.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
