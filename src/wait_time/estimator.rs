//! Per-customer service-duration estimation
//!
//! The estimate is a plain moving average over a counter's most recent
//! completed visits, with no weighting and no outlier rejection. Below the sample
//! threshold a fixed default applies. Results may be served from a short
//! TTL cache that is never invalidated by new history writes; estimates can
//! lag true recent performance by up to the TTL.

use crate::config::QueueSettings;
use crate::error::{QueueError, Result};
use crate::store::QueueStore;
use crate::types::CounterId;
use crate::wait_time::cache::TtlCache;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for wait-time estimation
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// How many most-recent samples are averaged
    pub sample_window: usize,
    /// Minimum samples before the average is trusted. The two source
    /// variants disagreed ("more than 5" vs "at least 1"); this resolves to
    /// one explicit threshold, defaulting to the window size.
    pub min_samples: usize,
    /// Fallback per-customer estimate in seconds
    pub default_seconds: u64,
    /// TTL for cached per-counter estimates
    pub cache_ttl: Duration,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_window: 5,
            min_samples: 5,
            default_seconds: 180, // 3 minutes
            cache_ttl: Duration::from_secs(60),
        }
    }
}

impl EstimatorConfig {
    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self {
            sample_window: settings.sample_window,
            min_samples: settings.min_samples,
            default_seconds: settings.default_wait_seconds,
            cache_ttl: Duration::from_secs(settings.estimate_cache_ttl_seconds),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.sample_window == 0 {
            return Err(QueueError::Validation {
                reason: "sample_window must be greater than 0".to_string(),
            }
            .into());
        }
        if self.min_samples < self.sample_window {
            return Err(QueueError::Validation {
                reason: "min_samples must not be below sample_window".to_string(),
            }
            .into());
        }
        if self.default_seconds == 0 {
            return Err(QueueError::Validation {
                reason: "default_seconds must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Trait for estimating per-customer service durations
#[async_trait]
pub trait WaitTimeEstimator: Send + Sync {
    /// Expected seconds one customer spends at the given counter.
    async fn per_customer_seconds(&self, counter_id: CounterId) -> Result<u64>;
}

/// Scale a per-customer estimate to a queue slot. Every slot ahead is
/// assumed to take the same average duration.
pub fn estimate_for_position(slots: u32, per_customer_seconds: u64) -> u64 {
    u64::from(slots) * per_customer_seconds
}

/// Moving-average estimator backed by the history table
pub struct RollingAverageEstimator {
    store: Arc<dyn QueueStore>,
    config: EstimatorConfig,
    cache: TtlCache<CounterId, u64>,
}

impl RollingAverageEstimator {
    pub fn new(store: Arc<dyn QueueStore>, config: EstimatorConfig) -> Result<Self> {
        config.validate()?;
        let cache = TtlCache::new(config.cache_ttl);
        Ok(Self {
            store,
            config,
            cache,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    fn mean_seconds(samples: &[u64]) -> u64 {
        let sum: u64 = samples.iter().sum();
        ((sum as f64) / (samples.len() as f64)).round() as u64
    }
}

#[async_trait]
impl WaitTimeEstimator for RollingAverageEstimator {
    async fn per_customer_seconds(&self, counter_id: CounterId) -> Result<u64> {
        if let Some(cached) = self.cache.get(&counter_id) {
            return Ok(cached);
        }

        let samples = self
            .store
            .recent_wait_samples(counter_id, self.config.sample_window)
            .await?;

        let estimate = if samples.len() >= self.config.min_samples {
            let mean = Self::mean_seconds(&samples);
            debug!(
                "Computed rolling average for counter {}: {}s over {} samples",
                counter_id,
                mean,
                samples.len()
            );
            mean
        } else {
            debug!(
                "Counter {} has {} of {} required samples, using default {}s",
                counter_id,
                samples.len(),
                self.config.min_samples,
                self.config.default_seconds
            );
            self.config.default_seconds
        };

        self.cache.insert(counter_id, estimate);
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryQueueStore;
    use crate::types::{CustomerStatus, HistoryRecord};
    use crate::utils::{current_timestamp, generate_id};

    async fn seed_samples(store: &InMemoryQueueStore, counter_id: CounterId, waits: &[u64]) {
        for &wait in waits {
            store
                .append_history(HistoryRecord {
                    id: generate_id(),
                    company_id: generate_id(),
                    counter_id,
                    counter_number: 1,
                    otp: "000000".to_string(),
                    join_time: current_timestamp(),
                    served_time: Some(current_timestamp()),
                    wait_seconds: Some(wait),
                    status: CustomerStatus::Served,
                    delays: 0,
                })
                .await
                .unwrap();
        }
    }

    fn estimator(store: Arc<InMemoryQueueStore>) -> RollingAverageEstimator {
        RollingAverageEstimator::new(store, EstimatorConfig::default()).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(EstimatorConfig::default().validate().is_ok());

        let config = EstimatorConfig {
            sample_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EstimatorConfig {
            sample_window: 5,
            min_samples: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_default_below_threshold() {
        let store = Arc::new(InMemoryQueueStore::new());
        let counter_id = generate_id();
        seed_samples(&store, counter_id, &[100, 120, 140, 160]).await;

        let estimator = estimator(store);
        assert_eq!(
            estimator.per_customer_seconds(counter_id).await.unwrap(),
            180
        );
    }

    #[tokio::test]
    async fn test_mean_of_recent_window() {
        let store = Arc::new(InMemoryQueueStore::new());
        let counter_id = generate_id();
        seed_samples(&store, counter_id, &[100, 120, 140, 160, 180]).await;

        let estimator = estimator(store);
        assert_eq!(
            estimator.per_customer_seconds(counter_id).await.unwrap(),
            140
        );
    }

    #[tokio::test]
    async fn test_window_slides_past_old_samples() {
        let store = Arc::new(InMemoryQueueStore::new());
        let counter_id = generate_id();
        // The first two fall outside the 5-sample window
        seed_samples(&store, counter_id, &[1000, 1000, 100, 100, 100, 100, 100]).await;

        let estimator = estimator(store);
        assert_eq!(
            estimator.per_customer_seconds(counter_id).await.unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn test_cached_estimate_ignores_new_history() {
        let store = Arc::new(InMemoryQueueStore::new());
        let counter_id = generate_id();
        seed_samples(&store, counter_id, &[100, 100, 100, 100, 100]).await;

        let estimator = estimator(store.clone());
        assert_eq!(
            estimator.per_customer_seconds(counter_id).await.unwrap(),
            100
        );

        // New history does not invalidate the cache; the stale value holds
        // until the TTL lapses.
        seed_samples(&store, counter_id, &[500, 500, 500, 500, 500]).await;
        assert_eq!(
            estimator.per_customer_seconds(counter_id).await.unwrap(),
            100
        );
    }

    #[test]
    fn test_position_scaling() {
        assert_eq!(estimate_for_position(0, 180), 0);
        assert_eq!(estimate_for_position(1, 180), 180);
        assert_eq!(estimate_for_position(4, 140), 560);
    }
}
