//! Counter/queue state persistence port
//!
//! The source system carried two parallel persistence backends (relational
//! and document-oriented) implementing the same behavior. Here that is a
//! single port trait with one canonical implementation; everything above it
//! depends only on the trait.

pub mod memory;

pub use memory::InMemoryQueueStore;

use crate::config::StorageSettings;
use crate::error::{QueueError, Result};
use crate::types::{
    Company, CompanyId, Counter, CounterId, Customer, HistoryRecord, OwnerId,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Persistence capabilities the assigner, estimator, and HTTP layer rely on.
///
/// Mutating calls are individually atomic; multi-step read-then-write flows
/// are serialized above this trait (see the queue manager's per-company
/// locks), so implementations do not need snapshot isolation.
#[async_trait]
pub trait QueueStore: Send + Sync {
    // Companies
    async fn insert_company(&self, company: Company) -> Result<()>;
    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>>;
    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>>;
    async fn company_code_in_use(&self, code: &str) -> Result<bool>;
    async fn companies_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Company>>;

    // Counters
    async fn insert_counter(&self, counter: Counter) -> Result<()>;
    async fn find_counter(&self, id: CounterId) -> Result<Option<Counter>>;
    /// Active counters for a company, sorted by counter number ascending.
    /// The sort order is load-bearing: assignment tie-breaks depend on it.
    async fn active_counters(&self, company_id: CompanyId) -> Result<Vec<Counter>>;
    /// All counters for a company, active or not, sorted by counter number.
    async fn counters_for_company(&self, company_id: CompanyId) -> Result<Vec<Counter>>;
    async fn set_counter_active(&self, id: CounterId, is_active: bool) -> Result<Counter>;

    // Customers
    async fn insert_customer(&self, customer: Customer) -> Result<()>;
    async fn update_customer(&self, customer: &Customer) -> Result<()>;
    async fn find_customer_by_otp(&self, otp: &str) -> Result<Option<Customer>>;
    /// Whether any customer record (live or concluded) holds this OTP.
    async fn otp_in_use(&self, otp: &str) -> Result<bool>;
    /// Live customers (waiting/serving/delayed) at a counter, position order.
    async fn live_customers(&self, counter_id: CounterId) -> Result<Vec<Customer>>;
    async fn live_customer_count(&self, counter_id: CounterId) -> Result<usize>;
    /// Every customer record at a counter, position order.
    async fn counter_customers(&self, counter_id: CounterId) -> Result<Vec<Customer>>;

    // History
    async fn append_history(&self, record: HistoryRecord) -> Result<()>;
    /// Recorded wait durations for a counter, most recent first, capped at
    /// `limit`. Records without a measured wait are skipped.
    async fn recent_wait_samples(&self, counter_id: CounterId, limit: usize) -> Result<Vec<u64>>;
    async fn company_history(&self, company_id: CompanyId) -> Result<Vec<HistoryRecord>>;
}

/// Bounded retry policy for store calls on the request path
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self {
            max_attempts: settings.max_retry_attempts,
            base_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }
}

/// Run a store operation with bounded exponential backoff.
///
/// Only transient failures (`QueueError::Unavailable`) are retried; domain
/// errors propagate immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = policy.base_delay;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let transient = e
                    .downcast_ref::<QueueError>()
                    .map(QueueError::is_transient)
                    .unwrap_or(false);

                if !transient || attempt >= policy.max_attempts {
                    return Err(e);
                }

                warn!(
                    "Store call failed transiently (attempt {}/{}): {}. Retrying in {:?}",
                    attempt, policy.max_attempts, e, delay
                );

                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(Duration::from_secs(5));
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: Result<u32> = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(QueueError::Unavailable {
                        message: "flaky".to_string(),
                    }
                    .into())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: Result<u32> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(QueueError::Unavailable {
                    message: "down".to_string(),
                }
                .into())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_domain_errors() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<u32> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(QueueError::CompanyNotFound {
                    code: "ABCDEF".to_string(),
                }
                .into())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
