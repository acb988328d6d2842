//! Redis-backed counter store for multi-process deployments.
//!
//! `INCRBYFLOAT` gives the same atomic increment-and-read the in-memory
//! store provides, shared across every gateway instance pointing at the
//! same Redis.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use super::ledger::CounterStore;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct RedisCounterStore {
    client: redis::Client,
}

impl RedisCounterStore {
    /// Connect lazily; the client holds connection parameters only.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Ledger(e.to_string()))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Ledger(e.to_string()))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr_by(&self, key: &str, amount: f64) -> Result<f64> {
        let mut conn = self.connection().await?;
        conn.incr(key, amount)
            .await
            .map_err(|e| Error::Ledger(e.to_string()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        // NX: keep the TTL set by the first writer of the month.
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .arg("NX")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| Error::Ledger(e.to_string()))
    }
}
