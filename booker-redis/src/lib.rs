//! Redis-backed hold registry for the booker reservation engine.
//!
//! Holds are plain string keys with a TTL; acquisition is a single
//! `SET key owner NX EX ttl`, which is atomic on the server and therefore a
//! correct arbiter under concurrent creates. Reclamation is Redis key expiry.
//!
//! TTL expiry is best-effort: a key may outlive its deadline slightly, and a
//! crashed owner's key lingers until it lapses. Neither case threatens the
//! occupancy invariant; the booking store's exclusion constraint is the
//! authoritative check.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use booker_core::{BookingError, BoxFuture, HoldRegistry};

/// Hold registry backed by a shared Redis connection.
///
/// `ConnectionManager` multiplexes and reconnects internally, so one instance
/// is cloned freely across the coordinator and the expiry worker.
#[derive(Clone)]
pub struct RedisHoldRegistry {
    conn_manager: ConnectionManager,
}

impl RedisHoldRegistry {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Transient`] if the client cannot be created or
    /// the initial connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, BookingError> {
        let client = Client::open(redis_url)
            .map_err(|e| BookingError::Transient(format!("failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            BookingError::Transient(format!("failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }
}

impl HoldRegistry for RedisHoldRegistry {
    fn acquire<'a>(
        &'a self,
        key: &'a str,
        owner: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<bool, BookingError>> {
        let mut conn = self.conn_manager.clone();

        Box::pin(async move {
            let ttl_seconds = ttl.as_secs().max(1);

            // SET NX EX is atomic on the server; Nil means the key exists.
            let outcome: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(owner)
                .arg("NX")
                .arg("EX")
                .arg(ttl_seconds)
                .query_async(&mut conn)
                .await
                .map_err(|e| BookingError::Transient(format!("hold acquire failed: {e}")))?;

            let acquired = outcome.is_some();
            tracing::debug!(
                hold_key = key,
                owner = owner,
                ttl_seconds,
                acquired,
                "Hold acquisition attempted"
            );

            Ok(acquired)
        })
    }

    fn release<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), BookingError>> {
        let mut conn = self.conn_manager.clone();

        Box::pin(async move {
            let _: () = conn
                .del(key)
                .await
                .map_err(|e| BookingError::Transient(format!("hold release failed: {e}")))?;

            tracing::debug!(hold_key = key, "Hold released");
            Ok(())
        })
    }

    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, BookingError>> {
        let mut conn = self.conn_manager.clone();

        Box::pin(async move {
            let owner: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| BookingError::Transient(format!("hold read failed: {e}")))?;

            Ok(owner)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: docker run -d -p 6379:6379 redis:7-alpine

    fn test_key() -> String {
        format!("hold:test:{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn acquire_then_contend_then_release() {
        let registry = RedisHoldRegistry::new("redis://127.0.0.1:6379")
            .await
            .unwrap();
        let key = test_key();

        let won = registry
            .acquire(&key, "booking-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(won);

        // Second acquisition on a live key must lose.
        let lost = registry
            .acquire(&key, "booking-2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!lost);

        let owner = registry.read(&key).await.unwrap();
        assert_eq!(owner.as_deref(), Some("booking-1"));

        registry.release(&key).await.unwrap();
        assert_eq!(registry.read(&key).await.unwrap(), None);

        // Release is idempotent.
        registry.release(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn key_expires_on_its_own() {
        let registry = RedisHoldRegistry::new("redis://127.0.0.1:6379")
            .await
            .unwrap();
        let key = test_key();

        registry
            .acquire(&key, "booking-1", Duration::from_secs(1))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(registry.read(&key).await.unwrap(), None);
        let rewon = registry
            .acquire(&key, "booking-2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(rewon);

        registry.release(&key).await.unwrap();
    }
}
