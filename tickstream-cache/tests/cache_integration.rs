//! End-to-end tests for the multi-tier quote cache over an in-memory warm
//! store. Two caches sharing one warm store stand in for two processes
//! sharing a Redis.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tickstream_cache::prelude::*;
use tickstream_cache::{FreshnessConfig, WarmTierConfig};

fn quote(symbol: &str, price: f64) -> QuotePayload {
    QuotePayload::Single(record(symbol, price))
}

fn record(symbol: &str, price: f64) -> QuoteRecord {
    QuoteRecord {
        symbol: symbol.to_string(),
        price,
        bid: Some(price - 0.05),
        ask: Some(price + 0.05),
        change: Some(0.5),
        change_percent: Some(0.33),
        volume: Some(1_000_000),
        prev_close: Some(price - 0.5),
        exchange: Some("XNAS".to_string()),
        currency: Some("USD".to_string()),
        updated_at: Utc::now(),
    }
}

fn config() -> CacheConfig {
    CacheConfig::default()
}

#[tokio::test]
async fn test_live_quote_served_hot_with_near_zero_age() {
    let cache = QuoteCache::new(Arc::new(MemoryWarmStore::new()), config());

    cache
        .set(
            "quote:AAPL",
            quote("AAPL", 150.0),
            DataKind::LiveTick,
            MarketSession::Open,
        )
        .await
        .unwrap();

    let hit = cache.get("quote:AAPL").await.unwrap().unwrap();
    assert_eq!(hit.tier, CacheTier::Hot);
    assert!(hit.age_ms < 500, "age_ms was {}", hit.age_ms);
    match hit.payload {
        QuotePayload::Single(r) => assert_eq!(r.price, 150.0),
        _ => panic!("expected single quote"),
    }
}

#[tokio::test]
async fn test_hot_eviction_prefers_less_accessed_key() {
    let mut config = config();
    config.hot.capacity = 2;
    let warm = Arc::new(MemoryWarmStore::new());
    let cache = QuoteCache::new(warm, config);

    cache
        .set("quote:K1", quote("K1", 1.0), DataKind::LiveTick, MarketSession::Open)
        .await
        .unwrap();
    cache
        .set("quote:K2", quote("K2", 2.0), DataKind::LiveTick, MarketSession::Open)
        .await
        .unwrap();

    // K1 read once more than K2
    cache.get("quote:K1").await.unwrap();
    cache.get("quote:K1").await.unwrap();
    cache.get("quote:K2").await.unwrap();

    cache
        .set("quote:K3", quote("K3", 3.0), DataKind::LiveTick, MarketSession::Open)
        .await
        .unwrap();

    let stats = cache.stats();
    assert_eq!(stats.hot_size, 2);
    assert_eq!(stats.evictions, 1);

    // K1 and K3 remain hot; check them before any promotion can re-evict
    let k1 = cache.get("quote:K1").await.unwrap().unwrap();
    assert_eq!(k1.tier, CacheTier::Hot);
    let k3 = cache.get("quote:K3").await.unwrap().unwrap();
    assert_eq!(k3.tier, CacheTier::Hot);

    // K2 was the eviction victim; it comes back from the warm tier
    let k2 = cache.get("quote:K2").await.unwrap().unwrap();
    assert_eq!(k2.tier, CacheTier::Warm);
}

#[tokio::test]
async fn test_large_batch_round_trips_through_compression() {
    let warm = Arc::new(MemoryWarmStore::new());
    let writer = QuoteCache::new(warm.clone(), config());
    let reader = QuoteCache::new(warm, config());

    // Well above the 1 KiB threshold, below the 100-item admission limit
    let records: Vec<QuoteRecord> = (0..80)
        .map(|i| record(&format!("LONGSYMBOL{i:04}.EXCHANGE"), 100.0 + i as f64))
        .collect();
    let batch = QuotePayload::Batch(records);

    writer
        .set("snapshot:sp500", batch.clone(), DataKind::Intraday, MarketSession::Open)
        .await
        .unwrap();
    assert!(writer.stats().compression_ratio > 1.0);

    // Cold reader pulls the compressed bytes from the warm tier
    let hit = reader.get("snapshot:sp500").await.unwrap().unwrap();
    assert_eq!(hit.tier, CacheTier::Warm);
    assert_eq!(hit.payload, batch);
}

#[tokio::test]
async fn test_promotion_happens_once_per_cold_period() {
    let warm = Arc::new(MemoryWarmStore::new());
    let writer = QuoteCache::new(warm.clone(), config());
    let reader = QuoteCache::new(warm, config());

    writer
        .set(
            "quote:MSFT",
            quote("MSFT", 410.0),
            DataKind::Intraday,
            MarketSession::Open,
        )
        .await
        .unwrap();

    // First read on the cold cache promotes
    let first = reader.get("quote:MSFT").await.unwrap().unwrap();
    assert_eq!(first.tier, CacheTier::Warm);

    // Subsequent reads are hot hits; the warm tier is not consulted again
    for _ in 0..5 {
        let hit = reader.get("quote:MSFT").await.unwrap().unwrap();
        assert_eq!(hit.tier, CacheTier::Hot);
    }

    let stats = reader.stats();
    assert_eq!(stats.warm_hits, 1);
    assert_eq!(stats.hot_hits, 5);
}

#[tokio::test]
async fn test_promoted_entry_age_reflects_original_write() {
    let warm = Arc::new(MemoryWarmStore::new());
    let writer = QuoteCache::new(warm.clone(), config());
    let reader = QuoteCache::new(warm, config());

    writer
        .set(
            "quote:NVDA",
            quote("NVDA", 900.0),
            DataKind::Intraday,
            MarketSession::Open,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    // Promotion keeps the original stored_at, so age keeps growing
    let warm_hit = reader.get("quote:NVDA").await.unwrap().unwrap();
    assert!(warm_hit.age_ms >= 100, "age_ms was {}", warm_hit.age_ms);

    let hot_hit = reader.get("quote:NVDA").await.unwrap().unwrap();
    assert_eq!(hot_hit.tier, CacheTier::Hot);
    assert!(hot_hit.age_ms >= warm_hit.age_ms);
}

#[tokio::test]
async fn test_expired_entry_never_served() {
    let mut config = config();
    config.freshness = FreshnessConfig {
        live_tick_ttl_secs: 1,
        ..FreshnessConfig::default()
    };
    let cache = QuoteCache::new(Arc::new(MemoryWarmStore::new()), config);

    cache
        .set(
            "quote:TSLA",
            quote("TSLA", 250.0),
            DataKind::LiveTick,
            MarketSession::Open,
        )
        .await
        .unwrap();
    assert!(cache.get("quote:TSLA").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert!(cache.get("quote:TSLA").await.unwrap().is_none());
}

#[tokio::test]
async fn test_background_sweep_clears_expired_without_reads() {
    let mut config = config();
    config.sweep_interval_secs = 1;
    config.freshness = FreshnessConfig {
        live_tick_ttl_secs: 1,
        ..FreshnessConfig::default()
    };
    let cache = Arc::new(QuoteCache::new(Arc::new(MemoryWarmStore::new()), config));
    cache.spawn_sweeper();

    for i in 0..10 {
        cache
            .set(
                &format!("quote:SYM{i}"),
                quote(&format!("SYM{i}"), 1.0),
                DataKind::LiveTick,
                MarketSession::Open,
            )
            .await
            .unwrap();
    }
    assert_eq!(cache.stats().hot_size, 10);

    // No reads; the sweep alone reclaims the tier
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let stats = cache.stats();
    assert_eq!(stats.hot_size, 0);
    assert_eq!(stats.expired_removals, 10);
}

#[tokio::test]
async fn test_get_batch_mixes_tiers_and_omits_missing() {
    let warm = Arc::new(MemoryWarmStore::new());
    let writer = QuoteCache::new(warm.clone(), config());
    let reader = QuoteCache::new(warm, config());

    writer
        .set("quote:WARM", quote("WARM", 10.0), DataKind::Intraday, MarketSession::Open)
        .await
        .unwrap();
    reader
        .set("quote:HOT", quote("HOT", 20.0), DataKind::Intraday, MarketSession::Open)
        .await
        .unwrap();

    let result = reader
        .get_batch(&["quote:HOT", "quote:WARM", "quote:GONE"])
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.contains_key("quote:HOT"));
    assert!(result.contains_key("quote:WARM"));
    assert!(!result.contains_key("quote:GONE"));
}

#[tokio::test]
async fn test_prefix_invalidation_clears_both_tiers() {
    let warm = Arc::new(MemoryWarmStore::new());
    let cache = QuoteCache::new(warm.clone(), config());

    for symbol in ["AAPL", "MSFT"] {
        cache
            .set(
                &format!("quote:{symbol}"),
                quote(symbol, 100.0),
                DataKind::LiveTick,
                MarketSession::Open,
            )
            .await
            .unwrap();
    }
    cache
        .set("agg:AAPL", quote("AAPL", 100.0), DataKind::Analytical, MarketSession::Open)
        .await
        .unwrap();

    cache.invalidate_prefix("quote:").await.unwrap();

    assert!(cache.get("quote:AAPL").await.unwrap().is_none());
    assert!(cache.get("quote:MSFT").await.unwrap().is_none());
    assert!(cache.get("agg:AAPL").await.unwrap().is_some());
    assert!(!warm.contains("tickcache:quote:AAPL"));
    assert!(warm.contains("tickcache:agg:AAPL"));
}

#[tokio::test]
async fn test_corrupt_warm_entry_is_quarantined() {
    let warm = Arc::new(MemoryWarmStore::new());
    let cache = QuoteCache::new(warm.clone(), config());

    warm.put_raw(
        "tickcache:quote:BAD",
        b"definitely not an envelope".to_vec(),
        Duration::from_secs(60),
    );

    // Served as a miss, not an error
    assert!(cache.get("quote:BAD").await.unwrap().is_none());
    assert_eq!(cache.stats().codec_errors, 1);

    // And deleted so it cannot poison future reads
    assert!(!warm.contains("tickcache:quote:BAD"));
}

/// Warm store that fails every call, simulating a network partition.
struct UnavailableWarmStore;

#[async_trait]
impl WarmStore for UnavailableWarmStore {
    async fn get(&self, _key: &str) -> tickstream_cache::Result<Option<Vec<u8>>> {
        Err(CacheError::WarmTierUnavailable("simulated outage".into()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: &[u8],
        _ttl: Duration,
    ) -> tickstream_cache::Result<()> {
        Err(CacheError::WarmTierUnavailable("simulated outage".into()))
    }

    async fn delete(&self, _key: &str) -> tickstream_cache::Result<()> {
        Err(CacheError::WarmTierUnavailable("simulated outage".into()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> tickstream_cache::Result<u64> {
        Err(CacheError::WarmTierUnavailable("simulated outage".into()))
    }
}

#[tokio::test]
async fn test_degrades_to_hot_only_when_warm_is_down() {
    let cache = QuoteCache::new(Arc::new(UnavailableWarmStore), config());

    // Read of an unknown key: miss, not an error
    assert!(cache.get("quote:AAPL").await.unwrap().is_none());

    // Write still succeeds via the hot tier
    cache
        .set(
            "quote:AAPL",
            quote("AAPL", 150.0),
            DataKind::LiveTick,
            MarketSession::Open,
        )
        .await
        .unwrap();

    let hit = cache.get("quote:AAPL").await.unwrap().unwrap();
    assert_eq!(hit.tier, CacheTier::Hot);
    assert!(cache.stats().warm_errors >= 2);
}

#[tokio::test]
async fn test_strict_mode_surfaces_warm_failures() {
    let mut config = config();
    config.strict_warm_errors = true;
    let cache = QuoteCache::new(Arc::new(UnavailableWarmStore), config);

    let err = cache.get("quote:AAPL").await.unwrap_err();
    assert!(matches!(err, CacheError::WarmTierUnavailable(_)));
}

#[tokio::test]
async fn test_warm_only_write_fails_when_warm_is_down() {
    // A value refused hot admission has nowhere to go when the warm tier
    // is unreachable; that write fails.
    let cache = QuoteCache::new(Arc::new(UnavailableWarmStore), config());

    let records: Vec<QuoteRecord> = (0..500).map(|i| record(&format!("S{i}"), 1.0)).collect();
    let err = cache
        .set(
            "batch:universe",
            QuotePayload::Batch(records),
            DataKind::Intraday,
            MarketSession::Open,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::WarmTierUnavailable(_)));
}

#[tokio::test]
async fn test_custom_key_prefix_namespaces_warm_keys() {
    let warm = Arc::new(MemoryWarmStore::new());
    let mut config = config();
    config.warm = WarmTierConfig {
        key_prefix: "md:quotes:".to_string(),
        ..WarmTierConfig::default()
    };
    let cache = QuoteCache::new(warm.clone(), config);

    cache
        .set("quote:AAPL", quote("AAPL", 150.0), DataKind::LiveTick, MarketSession::Open)
        .await
        .unwrap();

    assert!(warm.contains("md:quotes:quote:AAPL"));
}
