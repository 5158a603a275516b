//! Freshness policy: TTL computation and field-level change detection.
//!
//! Both halves are pure functions over their inputs so they can be tested
//! against literal before/after records. TTLs come from an explicit
//! `DataKind x MarketSession` table rather than per-kind strategy objects.

use crate::config::{ChangeThresholds, FreshnessConfig};
use crate::types::{DataKind, MarketSession, QuotePayload, QuoteRecord};
use std::time::Duration;

/// Computes context-dependent TTLs and judges change significance.
#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    config: FreshnessConfig,
}

impl FreshnessPolicy {
    pub fn new(config: FreshnessConfig) -> Self {
        Self { config }
    }

    pub fn thresholds(&self) -> &ChangeThresholds {
        &self.config.thresholds
    }

    /// TTL for a value of `kind` written under `session`.
    ///
    /// Base seconds per kind, scaled by the session multiplier. The
    /// multiplier table is non-decreasing from open through holiday, so
    /// TTLs only lengthen as the market quiets down. Always positive.
    pub fn compute_ttl(&self, kind: DataKind, session: MarketSession) -> Duration {
        let base_secs = match kind {
            DataKind::LiveTick => self.config.live_tick_ttl_secs,
            DataKind::Intraday => self.config.intraday_ttl_secs,
            DataKind::Analytical => self.config.analytical_ttl_secs,
            DataKind::Reference => self.config.reference_ttl_secs,
        };
        let multiplier = match session {
            MarketSession::Open => self.config.open_multiplier,
            MarketSession::Extended => self.config.extended_multiplier,
            MarketSession::Closed => self.config.closed_multiplier,
            MarketSession::Holiday => self.config.holiday_multiplier,
        };
        Duration::from_secs((base_secs * multiplier as u64).max(1))
    }

    /// Whether `curr` differs from `prev` enough to be worth re-serving.
    ///
    /// Field classes are checked in priority order and the first firing
    /// rule short-circuits: price moves (cheapest check, highest priority),
    /// then computed-change deltas, then the relative volume rule, then
    /// reference fields.
    pub fn is_significant_change(&self, prev: &QuoteRecord, curr: &QuoteRecord) -> bool {
        let t = &self.config.thresholds;
        price_class_changed(prev, curr, t)
            || change_class_changed(prev, curr, t)
            || volume_class_changed(prev, curr, t)
            || reference_class_changed(prev, curr, t)
    }

    /// Payload-level change test. Batches are significant when their shape
    /// differs or any positionally-paired record is significant.
    pub fn payload_changed(&self, prev: &QuotePayload, curr: &QuotePayload) -> bool {
        match (prev, curr) {
            (QuotePayload::Single(p), QuotePayload::Single(c)) => {
                self.is_significant_change(p, c)
            }
            (QuotePayload::Batch(p), QuotePayload::Batch(c)) => {
                p.len() != c.len()
                    || p.iter()
                        .zip(c.iter())
                        .any(|(p, c)| self.is_significant_change(p, c))
            }
            // Shape change is always significant.
            _ => true,
        }
    }
}

/// Price class: `price`, `bid`, `ask`. Any change fires.
fn price_class_changed(prev: &QuoteRecord, curr: &QuoteRecord, t: &ChangeThresholds) -> bool {
    float_moved(Some(prev.price), Some(curr.price), t.price_epsilon)
        || float_moved(prev.bid, curr.bid, t.price_epsilon)
        || float_moved(prev.ask, curr.ask, t.price_epsilon)
}

/// Computed-change class: `change`, `change_percent`. Absolute-delta rule.
fn change_class_changed(prev: &QuoteRecord, curr: &QuoteRecord, t: &ChangeThresholds) -> bool {
    float_delta_at_least(prev.change, curr.change, t.change_abs)
        || float_delta_at_least(prev.change_percent, curr.change_percent, t.change_abs)
}

/// Volume class: relative percentage rule, inclusive at the threshold.
fn volume_class_changed(prev: &QuoteRecord, curr: &QuoteRecord, t: &ChangeThresholds) -> bool {
    match (prev.volume, curr.volume) {
        (Some(p), Some(c)) => {
            if p == 0 {
                return c != 0;
            }
            let pct = (c as f64 - p as f64).abs() / p as f64 * 100.0;
            pct >= t.volume_pct
        }
        (None, None) => false,
        // Presence flip
        _ => true,
    }
}

/// Reference class: `prev_close`, `exchange`, `currency`. Slow-moving, so
/// any change fires.
fn reference_class_changed(prev: &QuoteRecord, curr: &QuoteRecord, t: &ChangeThresholds) -> bool {
    float_moved(prev.prev_close, curr.prev_close, t.price_epsilon)
        || prev.exchange != curr.exchange
        || prev.currency != curr.currency
}

fn float_moved(prev: Option<f64>, curr: Option<f64>, epsilon: f64) -> bool {
    match (prev, curr) {
        (Some(p), Some(c)) => (p - c).abs() > epsilon,
        (None, None) => false,
        _ => true,
    }
}

fn float_delta_at_least(prev: Option<f64>, curr: Option<f64>, threshold: f64) -> bool {
    match (prev, curr) {
        (Some(p), Some(c)) => (p - c).abs() >= threshold,
        (None, None) => false,
        _ => true,
    }
}
