//! Cache orchestrator: the read/write façade the rest of the system
//! consumes.
//!
//! Reads walk hot -> warm -> miss, promoting warm hits into the hot tier.
//! Writes ask the freshness policy for a TTL, then dual-write: the warm
//! tier is the tier of record, the hot tier is conditional on the
//! admission rule. The two writes are independent and not transactional;
//! staleness from a partial failure self-heals within one TTL window.

use crate::codec::Codec;
use crate::config::CacheConfig;
use crate::error::{CodecError, Result};
use crate::hot::HotTier;
use crate::policy::FreshnessPolicy;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::types::{
    CacheHit, CacheTier, DataKind, MarketSession, QuotePayload, WarmEnvelope, WriteOutcome,
};
use crate::warm::{RedisWarmStore, WarmStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Multi-tier quote cache.
///
/// Hot tier operations are in-process and never fail; warm tier operations
/// can fail and are treated as soft failures unless strict mode is
/// configured. Every failure mode degrades to a miss rather than
/// propagating into the request path.
pub struct QuoteCache {
    hot: HotTier,
    warm: Arc<dyn WarmStore>,
    codec: Codec,
    policy: FreshnessPolicy,
    stats: CacheStats,
    config: CacheConfig,
}

impl QuoteCache {
    /// Build a cache over an already-constructed warm store.
    pub fn new(warm: Arc<dyn WarmStore>, config: CacheConfig) -> Self {
        info!(
            hot_capacity = config.hot.capacity,
            sweep_interval_secs = config.sweep_interval_secs,
            "initializing quote cache"
        );
        Self {
            hot: HotTier::new(config.hot.capacity),
            codec: Codec::new(config.codec.compression_threshold_bytes),
            policy: FreshnessPolicy::new(config.freshness.clone()),
            stats: CacheStats::default(),
            warm,
            config,
        }
    }

    /// Connect to the configured Redis warm tier and start the background
    /// sweep.
    pub async fn connect(config: CacheConfig) -> Result<Arc<Self>> {
        let warm = Arc::new(RedisWarmStore::connect(&config.warm.url).await?);
        let cache = Arc::new(Self::new(warm, config));
        cache.spawn_sweeper();
        Ok(cache)
    }

    /// Read a key: hot tier first, then warm with promotion, else miss.
    pub async fn get(&self, key: &str) -> Result<Option<CacheHit>> {
        if let Some((payload, stored_at)) = self.hot.get(key) {
            self.stats.record_hot_hit();
            debug!(key, "hot hit");
            return Ok(Some(CacheHit {
                payload,
                age_ms: age_since(stored_at),
                tier: CacheTier::Hot,
            }));
        }
        self.stats.record_hot_miss();
        self.read_through_warm(key).await
    }

    /// Read many keys. Hot hits are collected first; the remainder fan out
    /// to the warm tier concurrently. Keys not found anywhere are simply
    /// absent from the result.
    pub async fn get_batch(&self, keys: &[&str]) -> Result<HashMap<String, QuotePayload>> {
        let mut found = HashMap::with_capacity(keys.len());
        let mut misses = Vec::new();

        for &key in keys {
            if let Some((payload, _)) = self.hot.get(key) {
                self.stats.record_hot_hit();
                found.insert(key.to_string(), payload);
            } else {
                self.stats.record_hot_miss();
                misses.push(key);
            }
        }

        let fetches = misses
            .into_iter()
            .map(|key| async move { (key, self.read_through_warm(key).await) });
        for (key, result) in futures::future::join_all(fetches).await {
            match result {
                Ok(Some(hit)) => {
                    found.insert(key.to_string(), hit.payload);
                }
                Ok(None) => {}
                // Only strict mode lets warm failures surface this far.
                Err(err) => return Err(err),
            }
        }

        Ok(found)
    }

    /// Write a value. The freshness policy picks the TTL from the data
    /// kind and market session; the warm tier is written unconditionally,
    /// the hot tier only when the admission rule accepts the value.
    pub async fn set(
        &self,
        key: &str,
        payload: QuotePayload,
        kind: DataKind,
        session: MarketSession,
    ) -> Result<()> {
        let ttl = self.policy.compute_ttl(kind, session);
        let stored_at = Utc::now();

        let encoded = self.codec.encode(&payload)?;
        self.stats
            .record_encode(encoded.uncompressed_len as u64, encoded.bytes.len() as u64);

        let admitted = self.admits_hot(&payload, encoded.bytes.len());
        let envelope = WarmEnvelope {
            stored_at_ms: stored_at.timestamp_millis(),
            ttl_ms: ttl.as_millis() as u64,
            compressed: encoded.compressed,
            uncompressed_len: encoded.uncompressed_len,
            payload: encoded.bytes,
        };
        let packed = self.codec.pack_envelope(&envelope)?;

        if admitted {
            let hot_ttl = ttl.min(self.config.hot.max_ttl());
            if self.hot.insert(key, payload, hot_ttl, stored_at).is_some() {
                self.stats.record_eviction();
            }
        } else {
            debug!(key, "value refused hot admission, warm only");
        }

        match self.warm.set(&self.warm_key(key), &packed, ttl).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.stats.record_warm_error();
                if self.config.strict_warm_errors || !admitted {
                    return Err(err);
                }
                warn!(key, %err, "warm write failed, value cached hot-only");
                Ok(())
            }
        }
    }

    /// Write only if the new value differs significantly from the cached
    /// one, per the field-priority change rules. Skipped writes leave both
    /// tiers untouched.
    pub async fn set_if_changed(
        &self,
        key: &str,
        payload: QuotePayload,
        kind: DataKind,
        session: MarketSession,
    ) -> Result<WriteOutcome> {
        if let Some(previous) = self.current_payload(key).await {
            if !self.policy.payload_changed(&previous, &payload) {
                self.stats.record_unchanged_skip();
                debug!(key, "change below significance thresholds, skipping write");
                return Ok(WriteOutcome::Unchanged);
            }
        }
        self.set(key, payload, kind, session).await?;
        Ok(WriteOutcome::Written)
    }

    /// Remove a key from both tiers. A warm-side failure propagates: an
    /// invalidation the tier of record did not see is not a soft event.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        self.hot.remove(key);
        self.warm.delete(&self.warm_key(key)).await
    }

    /// Remove every key starting with `prefix` from both tiers.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        let removed_hot = self.hot.remove_prefix(prefix);
        let removed_warm = self.warm.delete_prefix(&self.warm_key(prefix)).await?;
        debug!(prefix, removed_hot, removed_warm, "invalidated by prefix");
        Ok(())
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot(self.hot.len())
    }

    /// Start the periodic hot tier sweep. The task holds only a weak
    /// handle, so it winds down once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config.sweep_interval();
        let batch = self.config.hot.sweep_batch;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else { break };
                let removed = cache.hot.sweep_expired(batch);
                if removed > 0 {
                    debug!(removed, "sweep removed expired hot entries");
                    cache.stats.record_expired(removed);
                }
            }
        })
    }

    /// The warm half of the read path: fetch, validate, decode, promote.
    async fn read_through_warm(&self, key: &str) -> Result<Option<CacheHit>> {
        let bytes = match self.warm.get(&self.warm_key(key)).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.stats.record_warm_error();
                if self.config.strict_warm_errors {
                    return Err(err);
                }
                warn!(key, %err, "warm tier unavailable, treating as miss");
                return Ok(None);
            }
        };

        let Some(bytes) = bytes else {
            self.stats.record_warm_miss();
            return Ok(None);
        };

        let envelope = match self.codec.unpack_envelope(&bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.quarantine(key, &err).await;
                return Ok(None);
            }
        };

        let now = Utc::now();
        // The store's native TTL should have expired this already; check
        // anyway so a lagging store never makes us serve stale data.
        let Some(remaining_ms) = envelope.remaining_ttl_ms(now) else {
            self.stats.record_warm_miss();
            return Ok(None);
        };

        let payload = match self.codec.decode_envelope(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                self.quarantine(key, &err).await;
                return Ok(None);
            }
        };

        self.stats.record_warm_hit();

        if self.admits_hot(&payload, envelope.payload.len()) {
            // Promote with the remaining TTL; promotion never extends the
            // original expiry. Access stats restart fresh.
            let hot_ttl = Duration::from_millis(remaining_ms).min(self.config.hot.max_ttl());
            if self
                .hot
                .insert(key, payload.clone(), hot_ttl, envelope.stored_at())
                .is_some()
            {
                self.stats.record_eviction();
            }
            debug!(key, "promoted warm hit into hot tier");
        }

        let age_ms = now
            .timestamp_millis()
            .saturating_sub(envelope.stored_at_ms)
            .max(0) as u64;
        Ok(Some(CacheHit {
            payload,
            age_ms,
            tier: CacheTier::Warm,
        }))
    }

    /// Current live value for change comparison, without promotion or
    /// stats side effects. Any warm-side trouble reads as "no previous
    /// value", which makes the conditional write fall through to a full
    /// overwrite.
    async fn current_payload(&self, key: &str) -> Option<QuotePayload> {
        if let Some(payload) = self.hot.peek(key) {
            return Some(payload);
        }
        let bytes = self.warm.get(&self.warm_key(key)).await.ok().flatten()?;
        let envelope = self.codec.unpack_envelope(&bytes).ok()?;
        envelope.remaining_ttl_ms(Utc::now())?;
        self.codec.decode_envelope(&envelope).ok()
    }

    /// A stored entry failed to decode: count it, log it, delete it so it
    /// cannot poison future reads.
    async fn quarantine(&self, key: &str, err: &CodecError) {
        self.stats.record_codec_error();
        warn!(key, %err, "corrupt warm entry, deleting");
        if let Err(del_err) = self.warm.delete(&self.warm_key(key)).await {
            debug!(key, %del_err, "failed to delete corrupt warm entry");
        }
    }

    fn admits_hot(&self, payload: &QuotePayload, encoded_len: usize) -> bool {
        encoded_len <= self.config.hot.max_value_bytes
            && payload.item_count() <= self.config.hot.max_batch_items
    }

    fn warm_key(&self, key: &str) -> String {
        format!("{}{}", self.config.warm.key_prefix, key)
    }
}

fn age_since(stored_at: DateTime<Utc>) -> u64 {
    (Utc::now() - stored_at).num_milliseconds().max(0) as u64
}
