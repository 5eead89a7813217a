//! Application state shared across all HTTP handlers.
//!
//! Holds the dependencies the API endpoints need: the coordinator for
//! lifecycle commands, the store for reads, and the catalogue for the
//! availability planner. Cloned (cheaply via Arc) for each request.

use std::sync::Arc;

use booker_core::BookingStore;
use booker_postgres::PostgresCatalog;

use crate::config::Config;
use crate::coordinator::Coordinator;

/// Shared handler dependencies.
#[derive(Clone)]
pub struct AppState {
    /// Configuration (for accessing settings in handlers)
    pub config: Arc<Config>,
    /// Lifecycle coordinator for create and transition commands
    pub coordinator: Arc<Coordinator>,
    /// Booking store for read queries
    pub store: Arc<dyn BookingStore>,
    /// Venue catalogue for the availability planner
    pub catalog: Arc<PostgresCatalog>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        coordinator: Arc<Coordinator>,
        store: Arc<dyn BookingStore>,
        catalog: Arc<PostgresCatalog>,
    ) -> Self {
        Self {
            config,
            coordinator,
            store,
            catalog,
        }
    }
}
