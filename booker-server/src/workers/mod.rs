//! Background workers: hold expiry and outbox dispatch.
//!
//! Both run forever on timers, share no in-process state with the request
//! path, and stop via a `watch` shutdown channel.

pub mod expiry;
pub mod outbox;

pub use expiry::HoldExpiryWorker;
pub use outbox::OutboxDispatcher;
