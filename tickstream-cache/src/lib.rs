//! Multi-tier caching for real-time financial quote data.
//!
//! This crate sits between upstream provider fetches and API responses:
//! a bounded in-process hot tier backed by a shared Redis warm tier, with
//! market-aware freshness policies and field-level change detection.
//!
//! # Architecture
//!
//! - **Hot tier**: bounded in-process map with lazy TTL expiry and
//!   access-frequency eviction, for sub-millisecond reads
//! - **Warm tier**: shared, TTL-native Redis store behind a trait seam,
//!   the tier of record
//! - **Codec**: bincode encoding with size-triggered gzip compression
//! - **Freshness policy**: `DataKind x MarketSession` TTL table plus
//!   per-field-class change significance rules
//! - **Orchestrator**: hot -> warm -> miss reads with promotion,
//!   dual-tier writes, background expiry sweep
//!
//! # Example
//!
//! ```no_run
//! use tickstream_cache::prelude::*;
//! use chrono::Utc;
//!
//! # async fn example() -> tickstream_cache::Result<()> {
//! let cache = QuoteCache::connect(CacheConfig::default()).await?;
//!
//! let quote = QuotePayload::Single(QuoteRecord {
//!     symbol: "AAPL".to_string(),
//!     price: 150.0,
//!     bid: Some(149.95),
//!     ask: Some(150.05),
//!     change: Some(1.2),
//!     change_percent: Some(0.81),
//!     volume: Some(1_000_000),
//!     prev_close: Some(148.8),
//!     exchange: Some("XNAS".to_string()),
//!     currency: Some("USD".to_string()),
//!     updated_at: Utc::now(),
//! });
//!
//! cache
//!     .set("quote:AAPL", quote, DataKind::LiveTick, MarketSession::Open)
//!     .await?;
//!
//! if let Some(hit) = cache.get("quote:AAPL").await? {
//!     println!("{:?} served in {}ms-old state", hit.tier, hit.age_ms);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod hot;
pub mod policy;
pub mod stats;
pub mod types;
pub mod warm;

pub use cache::QuoteCache;
pub use codec::{Codec, Encoded};
pub use config::{
    CacheConfig, ChangeThresholds, CodecConfig, FreshnessConfig, HotTierConfig, WarmTierConfig,
};
pub use error::{CacheError, CodecError, Result};
pub use hot::HotTier;
pub use policy::FreshnessPolicy;
pub use stats::CacheStatsSnapshot;
pub use types::{
    CacheHit, CacheTier, DataKind, MarketSession, QuotePayload, QuoteRecord, WarmEnvelope,
    WriteOutcome,
};
pub use warm::{MemoryWarmStore, RedisWarmStore, WarmStore};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::QuoteCache;
    pub use crate::config::CacheConfig;
    pub use crate::error::{CacheError, Result};
    pub use crate::stats::CacheStatsSnapshot;
    pub use crate::types::{
        CacheHit, CacheTier, DataKind, MarketSession, QuotePayload, QuoteRecord, WriteOutcome,
    };
    pub use crate::warm::{MemoryWarmStore, WarmStore};
}
