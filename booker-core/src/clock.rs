//! Clock abstraction so time-dependent logic stays deterministic in tests.

use chrono::{DateTime, Utc};

/// Source of server time.
///
/// The coordinator and the background workers read time through this trait;
/// tests substitute a manual clock to drive hold expiry deterministically.
pub trait Clock: Send + Sync {
    /// Current server time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
