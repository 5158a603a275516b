//! Hot tier: bounded in-process store with lazy TTL expiry and
//! access-frequency eviction.
//!
//! A single coarse mutex guards the map and its bookkeeping; every critical
//! section is O(1) map access except eviction and prefix removal, which
//! scan a tier that is bounded in the low thousands of entries. The
//! background sweep takes the same lock in small batches so it never stalls
//! request-path reads for a full-table scan.

use crate::types::QuotePayload;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One cached value with its expiry and access bookkeeping.
#[derive(Debug, Clone)]
struct HotEntry {
    payload: QuotePayload,
    /// Wall-clock write time, used for age reporting.
    stored_at: DateTime<Utc>,
    /// Monotonic expiry deadline.
    expires_at: Instant,
    access_count: u64,
    last_access: Instant,
    /// Insertion sequence, the deterministic final eviction tie-break.
    seq: u64,
}

struct HotInner {
    entries: HashMap<String, HotEntry>,
    next_seq: u64,
}

/// Bounded in-process cache tier.
pub struct HotTier {
    inner: Mutex<HotInner>,
    capacity: usize,
}

impl HotTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HotInner {
                entries: HashMap::with_capacity(capacity.min(4096)),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Look up a key, expiring it lazily and bumping access stats on a hit.
    pub fn get(&self, key: &str) -> Option<(QuotePayload, DateTime<Utc>)> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_access = now;
        Some((entry.payload.clone(), entry.stored_at))
    }

    /// Look up without touching access stats. Used by conditional writes
    /// so comparison reads do not distort eviction ordering.
    pub fn peek(&self, key: &str) -> Option<QuotePayload> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }

        inner.entries.get(key).map(|e| e.payload.clone())
    }

    /// Insert or overwrite an entry. Evicts exactly one entry first when a
    /// brand-new key would push the tier over capacity. Returns the evicted
    /// key, if any.
    ///
    /// Access stats always restart from zero, for promotions as well as
    /// fresh writes.
    pub fn insert(
        &self,
        key: &str,
        payload: QuotePayload,
        ttl: Duration,
        stored_at: DateTime<Utc>,
    ) -> Option<String> {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        let mut evicted = None;
        if !inner.entries.contains_key(key) && inner.entries.len() >= self.capacity {
            if let Some(victim) = eviction_victim(&inner.entries) {
                inner.entries.remove(&victim);
                evicted = Some(victim);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.to_string(),
            HotEntry {
                payload,
                stored_at,
                expires_at: now + ttl,
                access_count: 0,
                last_access: now,
                seq,
            },
        );

        evicted
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    /// Remove every key starting with `prefix`. Linear scan; the tier is
    /// bounded so this stays cheap. Returns the number removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            inner.entries.remove(key);
        }
        doomed.len()
    }

    /// Proactively remove expired entries, at most `batch` per lock
    /// acquisition, releasing the lock between batches. Returns the total
    /// removed.
    pub fn sweep_expired(&self, batch: usize) -> usize {
        let batch = batch.max(1);
        let mut removed = 0;

        loop {
            let mut inner = self.inner.lock();
            let now = Instant::now();
            let doomed: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .take(batch)
                .map(|(k, _)| k.clone())
                .collect();

            for key in &doomed {
                inner.entries.remove(key);
            }
            removed += doomed.len();

            if doomed.len() < batch {
                return removed;
            }
            // Drop the lock before the next batch so readers interleave.
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

/// Pick the entry to evict: lowest access count first, then the older
/// `last_access`, then the lower insertion sequence. The sequence fallback
/// keeps eviction deterministic even under clock-resolution collisions.
fn eviction_victim(entries: &HashMap<String, HotEntry>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, e)| (e.access_count, e.last_access, e.seq))
        .map(|(k, _)| k.clone())
}
