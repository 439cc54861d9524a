//! Durable open counter.
//!
//! The counter is only ever changed through [`CounterStore::increment`],
//! which must be a single atomic operation in the backing store.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use thiserror::Error;
use tracing::info;

/// Failures of the tracker's backing stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("counter store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("counter store lock poisoned")]
    Poisoned,

    #[error("invalid blob key '{0}'")]
    InvalidKey(String),

    #[error("blob '{0}' not found")]
    BlobNotFound(String),

    #[error("blob '{key}' could not be read: {source}")]
    BlobRead {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// Atomic counter storage.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Add one to the counter at `key` and return the new value.
    /// A missing counter starts at zero.
    async fn increment(&self, key: &str) -> Result<u64, StorageError>;

    /// Current value of the counter at `key`; zero when it was never set.
    async fn get(&self, key: &str) -> Result<u64, StorageError>;
}

// =============================================================================
// Redis
// =============================================================================

/// Redis-backed counter using `INCR`, which is atomic on the server.
///
/// The connection manager reconnects on its own and is cheap to clone, so one
/// store is created at startup and shared by every request.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    /// Connect to Redis at `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        info!("redis_counter_store_connected");

        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, StorageError> {
        let mut conn = self.conn.clone();
        let value: u64 = conn.incr(key, 1u64).await?;
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<u64, StorageError> {
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local counter store for tests and single-instance runs.
///
/// Increments happen under one lock, so concurrent callers never lose updates.
/// Values do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, StorageError> {
        let mut counters = self.counters.lock().map_err(|_| StorageError::Poisoned)?;
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn get(&self, key: &str) -> Result<u64, StorageError> {
        let counters = self.counters.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(counters.get(key).copied().unwrap_or(0))
    }
}
