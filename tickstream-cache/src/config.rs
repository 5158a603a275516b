//! Configuration for the quote cache.
//!
//! All settings have defaults good enough for development against a local
//! Redis. Production deployments load a TOML file and/or set the
//! `TICKSTREAM_*` environment variables, which override file values.

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Environment variable names
pub const ENV_REDIS_URL: &str = "TICKSTREAM_CACHE_REDIS_URL";
pub const ENV_HOT_CAPACITY: &str = "TICKSTREAM_CACHE_HOT_CAPACITY";
pub const ENV_STRICT_WARM: &str = "TICKSTREAM_CACHE_STRICT_WARM";

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub hot: HotTierConfig,
    pub warm: WarmTierConfig,
    pub codec: CodecConfig,
    pub freshness: FreshnessConfig,
    /// How often the background sweep scans the hot tier for expired
    /// entries, in seconds.
    pub sweep_interval_secs: u64,
    /// When true, warm tier transport failures surface as errors instead
    /// of degrading to a miss.
    pub strict_warm_errors: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot: HotTierConfig::default(),
            warm: WarmTierConfig::default(),
            codec: CodecConfig::default(),
            freshness: FreshnessConfig::default(),
            sweep_interval_secs: 30,
            strict_warm_errors: false,
        }
    }
}

impl CacheConfig {
    /// Parse a TOML configuration string. Missing sections fall back to
    /// defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| CacheError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CacheError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&raw)
    }

    /// Apply `TICKSTREAM_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_REDIS_URL) {
            self.warm.url = url;
        }
        if let Ok(capacity) = std::env::var(ENV_HOT_CAPACITY) {
            if let Ok(capacity) = capacity.parse() {
                self.hot.capacity = capacity;
            }
        }
        if let Ok(strict) = std::env::var(ENV_STRICT_WARM) {
            self.strict_warm_errors = matches!(strict.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Hot tier (in-process) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotTierConfig {
    /// Maximum number of entries. Exceeding it evicts exactly one entry
    /// per insert.
    pub capacity: usize,
    /// Cap on any single entry's hot TTL, in seconds. The freshness policy
    /// can assign long warm TTLs; the hot copy re-validates sooner.
    pub max_ttl_secs: u64,
    /// Values whose encoded size exceeds this are warm-tier-only.
    pub max_value_bytes: usize,
    /// Batch payloads with more records than this are warm-tier-only.
    pub max_batch_items: usize,
    /// How many expired entries one sweep pass removes per lock
    /// acquisition.
    pub sweep_batch: usize,
}

impl Default for HotTierConfig {
    fn default() -> Self {
        Self {
            capacity: 2_000,
            max_ttl_secs: 300,
            max_value_bytes: 64 * 1024,
            max_batch_items: 100,
            sweep_batch: 128,
        }
    }
}

impl HotTierConfig {
    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs)
    }
}

/// Warm tier (networked store) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmTierConfig {
    /// Redis connection URL.
    pub url: String,
    /// Prefix applied to every warm key, namespacing this subsystem inside
    /// a shared store.
    pub key_prefix: String,
}

impl Default for WarmTierConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "tickcache:".to_string(),
        }
    }
}

/// Codec settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Payloads at or below this encoded size are stored uncompressed.
    pub compression_threshold_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compression_threshold_bytes: 1024,
        }
    }
}

/// Freshness policy settings: the `DataKind x MarketSession` TTL table and
/// the per-field-class change thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Base TTLs per data kind, in seconds (open-market values).
    pub live_tick_ttl_secs: u64,
    pub intraday_ttl_secs: u64,
    pub analytical_ttl_secs: u64,
    pub reference_ttl_secs: u64,
    /// Session multipliers. Must be non-decreasing from open through
    /// holiday; the holiday multiplier is at least 10x open.
    pub open_multiplier: u32,
    pub extended_multiplier: u32,
    pub closed_multiplier: u32,
    pub holiday_multiplier: u32,
    pub thresholds: ChangeThresholds,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            live_tick_ttl_secs: 5,
            intraday_ttl_secs: 60,
            analytical_ttl_secs: 300,
            reference_ttl_secs: 3_600,
            open_multiplier: 1,
            extended_multiplier: 3,
            closed_multiplier: 10,
            holiday_multiplier: 20,
            thresholds: ChangeThresholds::default(),
        }
    }
}

/// Per-field-class change significance thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeThresholds {
    /// Price-class fields fire on any move larger than this epsilon
    /// (guards against float noise, not a real threshold).
    pub price_epsilon: f64,
    /// Computed-change fields fire on an absolute delta at or above this.
    pub change_abs: f64,
    /// Volume fires on a relative move of at least this many percent
    /// (inclusive).
    pub volume_pct: f64,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            price_epsilon: 1e-9,
            change_abs: 0.01,
            volume_pct: 5.0,
        }
    }
}
