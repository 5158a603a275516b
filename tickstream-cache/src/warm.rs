//! Warm tier client: a thin adapter over a shared, TTL-native key-value
//! store.
//!
//! The orchestrator only sees the [`WarmStore`] trait. Production uses
//! [`RedisWarmStore`]; tests and development use [`MemoryWarmStore`], which
//! emulates TTL expiry in-process.

use crate::error::{CacheError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Backing store for the warm tier. Values are opaque envelope bytes; TTL
/// enforcement is the store's job. Transport failures surface as
/// [`CacheError::WarmTierUnavailable`], never as a plain miss.
#[async_trait]
pub trait WarmStore: Send + Sync {
    /// Get a value by key.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value with a TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;
}

/// Redis-backed warm store using a multiplexed connection manager.
pub struct RedisWarmStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisWarmStore {
    /// Connect to Redis. The connection manager reconnects on its own, so
    /// transient outages surface as per-call errors rather than a dead
    /// client.
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url, "connecting warm tier (redis)");
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Config(format!("invalid redis url: {e}")))?;
        let manager = client.get_connection_manager().await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl WarmStore for RedisWarmStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.manager.clone();
        let pattern = format!("{}*", escape_glob(prefix));
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await?;
                removed += deleted;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix, removed, "warm prefix delete");
        Ok(removed)
    }
}

/// Escape redis glob metacharacters so a literal prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// In-memory warm store with emulated TTL expiry, for tests and
/// development without a Redis.
#[derive(Default)]
pub struct MemoryWarmStore {
    data: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryWarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.read().values().filter(|(_, exp)| *exp > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store raw bytes directly, bypassing the codec. Test hook for
    /// simulating corrupt entries.
    pub fn put_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.data
            .write()
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    /// Whether the key currently holds a live value.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.data
            .read()
            .get(key)
            .is_some_and(|(_, exp)| *exp > now)
    }
}

#[async_trait]
impl WarmStore for MemoryWarmStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let expired = {
            let data = self.data.read();
            match data.get(key) {
                Some((_, exp)) if *exp <= now => true,
                Some((value, _)) => return Ok(Some(value.clone())),
                None => return Ok(None),
            }
        };
        if expired {
            self.data.write().remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.data
            .write()
            .insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut data = self.data.write();
        let doomed: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            data.remove(key);
        }
        Ok(doomed.len() as u64)
    }
}
