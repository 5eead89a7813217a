//! `PostgreSQL` persistence for the booker reservation engine.
//!
//! Two units live here:
//!
//! - [`PostgresBookingStore`]: the transactional booking store covering
//!   bookings, journal events, the outbox, and idempotency keys, all mutated
//!   in single transactions. Implements `booker_core::BookingStore`.
//! - [`PostgresCatalog`]: the venue catalogue (venues, rooms, tables), a
//!   plain CRUD store the availability planner reads.
//!
//! Schema migrations are embedded from the workspace `migrations/` directory
//! and applied with [`PostgresBookingStore::run_migrations`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod store;

pub use catalog::{PostgresCatalog, Room, Venue};
pub use store::PostgresBookingStore;
