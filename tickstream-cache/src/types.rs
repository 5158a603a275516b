//! Core types shared across the cache tiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single real-time quote as received from an upstream provider.
///
/// Field groupings matter for change detection (see [`crate::policy`]):
/// `price`/`bid`/`ask` are the price class, `change`/`change_percent` the
/// computed-change class, `volume` the volume class, and
/// `prev_close`/`exchange`/`currency` the slow-moving reference class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Canonical symbol, e.g. `AAPL`.
    pub symbol: String,
    /// Last traded price.
    pub price: f64,
    /// Best bid, if the provider reports one.
    pub bid: Option<f64>,
    /// Best ask, if the provider reports one.
    pub ask: Option<f64>,
    /// Absolute change versus previous close.
    pub change: Option<f64>,
    /// Percentage change versus previous close.
    pub change_percent: Option<f64>,
    /// Cumulative session volume.
    pub volume: Option<u64>,
    /// Previous session close.
    pub prev_close: Option<f64>,
    /// Listing exchange code.
    pub exchange: Option<String>,
    /// Quote currency code.
    pub currency: Option<String>,
    /// Provider-reported quote time.
    pub updated_at: DateTime<Utc>,
}

/// The unit of storage in the cache: one quote or a composite batch.
///
/// Batches exist so callers can cache multi-symbol snapshots under one key;
/// the hot tier's admission rule screens oversized batches out of in-process
/// storage by item count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuotePayload {
    Single(QuoteRecord),
    Batch(Vec<QuoteRecord>),
}

impl QuotePayload {
    /// Number of quote records carried by this payload.
    pub fn item_count(&self) -> usize {
        match self {
            QuotePayload::Single(_) => 1,
            QuotePayload::Batch(records) => records.len(),
        }
    }
}

/// What kind of data a cached value holds. Drives the base TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Streaming last-trade ticks; stale within seconds.
    LiveTick,
    /// Intraday aggregates (OHLC bars, session stats).
    Intraday,
    /// Computed analytics and summaries.
    Analytical,
    /// Slow-moving reference data (listings, instrument metadata).
    Reference,
}

/// Market activity context at write time, supplied by the caller's
/// market-calendar service. Drives the TTL multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSession {
    Open,
    Extended,
    Closed,
    Holiday,
}

/// Which tier served a successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Hot,
    Warm,
}

/// A successful cache read: the payload plus its age and origin tier.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub payload: QuotePayload,
    /// Milliseconds since the value was originally stored.
    pub age_ms: u64,
    pub tier: CacheTier,
}

/// Result of a conditional write (`set_if_changed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value differed significantly and was written to the tiers.
    Written,
    /// The cached value was already equivalent; nothing was written.
    Unchanged,
}

/// Wire record stored in the warm tier: codec metadata plus the encoded
/// payload, framed with enough timing information to report age and to
/// promote with the remaining (never extended) TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmEnvelope {
    /// Wall-clock write time, epoch milliseconds.
    pub stored_at_ms: i64,
    /// TTL assigned at write time, milliseconds.
    pub ttl_ms: u64,
    /// Whether `payload` is gzip-compressed.
    pub compressed: bool,
    /// Payload size before compression, for integrity checking.
    pub uncompressed_len: u32,
    /// Bincode-encoded (and possibly compressed) payload bytes.
    pub payload: Vec<u8>,
}

impl WarmEnvelope {
    /// Wall-clock write time as a `DateTime`.
    pub fn stored_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.stored_at_ms).unwrap_or_else(Utc::now)
    }

    /// Milliseconds of TTL left as of `now`, or `None` once expired.
    pub fn remaining_ttl_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        let age = now.timestamp_millis().saturating_sub(self.stored_at_ms);
        if age < 0 {
            // Clock skew between writer and reader; treat as freshly written.
            return Some(self.ttl_ms);
        }
        let remaining = self.ttl_ms as i64 - age;
        if remaining > 0 { Some(remaining as u64) } else { None }
    }
}
