//! Booking lifecycle engine.
//!
//! The stateful subsystem that mediates concurrent attempts to reserve a
//! table via a short-lived distributed hold, drives each reservation through
//! its lifecycle, expires stale holds, and guarantees
//! exactly-once-effective event delivery through a transactional outbox:
//!
//! - [`coordinator::Coordinator`]: create and transition commands
//! - [`planner`]: availability candidates, including merged pairs
//! - [`workers::HoldExpiryWorker`]: sweeps lapsed holds to `expired`
//! - [`workers::OutboxDispatcher`]: publishes pending outbox rows
//! - [`api`]: the HTTP command surface
//!
//! The engine is assembled from the seams in `booker-core`; production wiring
//! (Postgres, Redis, Redpanda) happens in the `server` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod planner;
pub mod state;
pub mod workers;

pub use config::Config;
pub use coordinator::{Coordinator, CreateBooking};
pub use state::AppState;
