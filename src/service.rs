//! Supply read service
//!
//! Read-through façade over the aggregator and the single-flight cache.
//! All three figures come out of one cache entry under one key, so callers
//! can never observe `total` from one aggregation cycle and `circulating`
//! from another.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStatsSnapshot, SharedResult, SingleFlight};
use crate::supply::{Aggregator, SupplyReport};

/// The one cache key all three supply reads share
const SUPPLY_KEY: &str = "supplies";

/// Cached, consistent access to the supply figures
pub struct SupplyService {
    aggregator: Arc<Aggregator>,
    cache: SingleFlight<SupplyReport>,
}

impl SupplyService {
    /// Create a service that caches aggregation results for `ttl`
    pub fn new(aggregator: Aggregator, ttl: Duration) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            cache: SingleFlight::new(ttl),
        }
    }

    /// The current supply report, recomputed through the cache as needed
    pub async fn report(&self) -> SharedResult<SupplyReport> {
        let aggregator = Arc::clone(&self.aggregator);
        self.cache
            .get_or_compute(SUPPLY_KEY, move || {
                let aggregator = Arc::clone(&aggregator);
                async move { aggregator.compute().await }
            })
            .await
    }

    /// Total supply (max supply minus burned tokens)
    pub async fn total(&self) -> SharedResult<f64> {
        Ok(self.report().await?.total)
    }

    /// Circulating supply (total minus vesting and project balances)
    pub async fn circulating(&self) -> SharedResult<f64> {
        Ok(self.report().await?.circulating)
    }

    /// Max supply as reported by the token contract
    pub async fn max_supply(&self) -> SharedResult<f64> {
        Ok(self.report().await?.max)
    }

    /// Cache counters for the health endpoint
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }
}
