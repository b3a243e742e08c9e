//! Shared fixtures for integration tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use waitline::error::{QueueError, Result};
use waitline::store::{InMemoryQueueStore, QueueStore};
use waitline::types::{
    Company, CompanyId, Counter, CounterId, Customer, HistoryRecord, OwnerId,
};

/// Store wrapper that fails a set number of calls with a transient error
/// before delegating to a real in-memory store. Used to exercise the
/// bounded-retry path end to end.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryQueueStore,
    failures_left: AtomicU32,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` store calls fail with `Unavailable`
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<()> {
        let fired = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fired {
            Err(QueueError::Unavailable {
                message: "injected outage".to_string(),
            }
            .into())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn insert_company(&self, company: Company) -> Result<()> {
        self.maybe_fail()?;
        self.inner.insert_company(company).await
    }

    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>> {
        self.maybe_fail()?;
        self.inner.find_company(id).await
    }

    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        self.maybe_fail()?;
        self.inner.find_company_by_code(code).await
    }

    async fn company_code_in_use(&self, code: &str) -> Result<bool> {
        self.maybe_fail()?;
        self.inner.company_code_in_use(code).await
    }

    async fn companies_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Company>> {
        self.maybe_fail()?;
        self.inner.companies_for_owner(owner_id).await
    }

    async fn insert_counter(&self, counter: Counter) -> Result<()> {
        self.maybe_fail()?;
        self.inner.insert_counter(counter).await
    }

    async fn find_counter(&self, id: CounterId) -> Result<Option<Counter>> {
        self.maybe_fail()?;
        self.inner.find_counter(id).await
    }

    async fn active_counters(&self, company_id: CompanyId) -> Result<Vec<Counter>> {
        self.maybe_fail()?;
        self.inner.active_counters(company_id).await
    }

    async fn counters_for_company(&self, company_id: CompanyId) -> Result<Vec<Counter>> {
        self.maybe_fail()?;
        self.inner.counters_for_company(company_id).await
    }

    async fn set_counter_active(&self, id: CounterId, is_active: bool) -> Result<Counter> {
        self.maybe_fail()?;
        self.inner.set_counter_active(id, is_active).await
    }

    async fn insert_customer(&self, customer: Customer) -> Result<()> {
        self.maybe_fail()?;
        self.inner.insert_customer(customer).await
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        self.maybe_fail()?;
        self.inner.update_customer(customer).await
    }

    async fn find_customer_by_otp(&self, otp: &str) -> Result<Option<Customer>> {
        self.maybe_fail()?;
        self.inner.find_customer_by_otp(otp).await
    }

    async fn otp_in_use(&self, otp: &str) -> Result<bool> {
        self.maybe_fail()?;
        self.inner.otp_in_use(otp).await
    }

    async fn live_customers(&self, counter_id: CounterId) -> Result<Vec<Customer>> {
        self.maybe_fail()?;
        self.inner.live_customers(counter_id).await
    }

    async fn live_customer_count(&self, counter_id: CounterId) -> Result<usize> {
        self.maybe_fail()?;
        self.inner.live_customer_count(counter_id).await
    }

    async fn counter_customers(&self, counter_id: CounterId) -> Result<Vec<Customer>> {
        self.maybe_fail()?;
        self.inner.counter_customers(counter_id).await
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<()> {
        self.maybe_fail()?;
        self.inner.append_history(record).await
    }

    async fn recent_wait_samples(&self, counter_id: CounterId, limit: usize) -> Result<Vec<u64>> {
        self.maybe_fail()?;
        self.inner.recent_wait_samples(counter_id, limit).await
    }

    async fn company_history(&self, company_id: CompanyId) -> Result<Vec<HistoryRecord>> {
        self.maybe_fail()?;
        self.inner.company_history(company_id).await
    }
}
