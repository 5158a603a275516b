//! Cache statistics: per-tier hit/miss counters, eviction and error
//! counts, and codec size accounting for the compression ratio.

use std::sync::atomic::{AtomicU64, Ordering};

/// Internal atomic counters. Relaxed ordering throughout; these are
/// monitoring numbers, not synchronization.
#[derive(Default)]
pub(crate) struct CacheStats {
    hot_hits: AtomicU64,
    hot_misses: AtomicU64,
    warm_hits: AtomicU64,
    warm_misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
    codec_errors: AtomicU64,
    warm_errors: AtomicU64,
    unchanged_skips: AtomicU64,
    bytes_uncompressed: AtomicU64,
    bytes_stored: AtomicU64,
}

impl CacheStats {
    pub fn record_hot_hit(&self) {
        self.hot_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hot_miss(&self) {
        self.hot_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warm_hit(&self) {
        self.warm_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warm_miss(&self) {
        self.warm_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        self.expired_removals.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_codec_error(&self) {
        self.codec_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warm_error(&self) {
        self.warm_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unchanged_skip(&self) {
        self.unchanged_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode(&self, uncompressed: u64, stored: u64) {
        self.bytes_uncompressed.fetch_add(uncompressed, Ordering::Relaxed);
        self.bytes_stored.fetch_add(stored, Ordering::Relaxed);
    }

    pub fn snapshot(&self, hot_size: usize) -> CacheStatsSnapshot {
        let hot_hits = self.hot_hits.load(Ordering::Relaxed);
        let hot_misses = self.hot_misses.load(Ordering::Relaxed);
        let warm_hits = self.warm_hits.load(Ordering::Relaxed);
        let warm_misses = self.warm_misses.load(Ordering::Relaxed);
        let bytes_uncompressed = self.bytes_uncompressed.load(Ordering::Relaxed);
        let bytes_stored = self.bytes_stored.load(Ordering::Relaxed);

        let total_gets = hot_hits + hot_misses;
        let hit_rate = if total_gets > 0 {
            (hot_hits + warm_hits) as f64 / total_gets as f64
        } else {
            0.0
        };
        let compression_ratio = if bytes_stored > 0 {
            bytes_uncompressed as f64 / bytes_stored as f64
        } else {
            1.0
        };

        CacheStatsSnapshot {
            hot_hits,
            hot_misses,
            warm_hits,
            warm_misses,
            hot_size,
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_removals: self.expired_removals.load(Ordering::Relaxed),
            codec_errors: self.codec_errors.load(Ordering::Relaxed),
            warm_errors: self.warm_errors.load(Ordering::Relaxed),
            unchanged_skips: self.unchanged_skips.load(Ordering::Relaxed),
            hit_rate,
            compression_ratio,
        }
    }
}

/// Point-in-time view of cache activity.
#[derive(Debug, Clone, Copy)]
pub struct CacheStatsSnapshot {
    pub hot_hits: u64,
    pub hot_misses: u64,
    pub warm_hits: u64,
    pub warm_misses: u64,
    pub hot_size: usize,
    pub evictions: u64,
    pub expired_removals: u64,
    pub codec_errors: u64,
    pub warm_errors: u64,
    pub unchanged_skips: u64,
    /// Fraction of gets served by either tier.
    pub hit_rate: f64,
    /// Uncompressed bytes over stored bytes across all encodes; 1.0 when
    /// nothing has been compressed.
    pub compression_ratio: f64,
}
