//! Canonical in-memory implementation of the queue store
//!
//! Plain `RwLock<HashMap>` tables. History is an append-only vector, so
//! recency queries read it back to front.

use crate::error::{QueueError, Result};
use crate::store::QueueStore;
use crate::types::{
    Company, CompanyId, Counter, CounterId, Customer, CustomerId, HistoryRecord, OwnerId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    companies: HashMap<CompanyId, Company>,
    counters: HashMap<CounterId, Counter>,
    customers: HashMap<CustomerId, Customer>,
    history: Vec<HistoryRecord>,
}

/// In-memory queue store
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    tables: RwLock<Tables>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| {
            QueueError::Internal {
                message: "Failed to acquire store read lock".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| {
            QueueError::Internal {
                message: "Failed to acquire store write lock".to_string(),
            }
            .into()
        })
    }
}

fn sorted_by_position(mut customers: Vec<Customer>) -> Vec<Customer> {
    customers.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.join_time.cmp(&b.join_time))
    });
    customers
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn insert_company(&self, company: Company) -> Result<()> {
        let mut tables = self.write()?;
        tables.companies.insert(company.id, company);
        Ok(())
    }

    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>> {
        Ok(self.read()?.companies.get(&id).cloned())
    }

    async fn find_company_by_code(&self, code: &str) -> Result<Option<Company>> {
        let tables = self.read()?;
        Ok(tables.companies.values().find(|c| c.code == code).cloned())
    }

    async fn company_code_in_use(&self, code: &str) -> Result<bool> {
        let tables = self.read()?;
        Ok(tables.companies.values().any(|c| c.code == code))
    }

    async fn companies_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Company>> {
        let tables = self.read()?;
        let mut companies: Vec<Company> = tables
            .companies
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        companies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(companies)
    }

    async fn insert_counter(&self, counter: Counter) -> Result<()> {
        let mut tables = self.write()?;
        tables.counters.insert(counter.id, counter);
        Ok(())
    }

    async fn find_counter(&self, id: CounterId) -> Result<Option<Counter>> {
        Ok(self.read()?.counters.get(&id).cloned())
    }

    async fn active_counters(&self, company_id: CompanyId) -> Result<Vec<Counter>> {
        let tables = self.read()?;
        let mut counters: Vec<Counter> = tables
            .counters
            .values()
            .filter(|c| c.company_id == company_id && c.is_active)
            .cloned()
            .collect();
        counters.sort_by_key(|c| c.number);
        Ok(counters)
    }

    async fn counters_for_company(&self, company_id: CompanyId) -> Result<Vec<Counter>> {
        let tables = self.read()?;
        let mut counters: Vec<Counter> = tables
            .counters
            .values()
            .filter(|c| c.company_id == company_id)
            .cloned()
            .collect();
        counters.sort_by_key(|c| c.number);
        Ok(counters)
    }

    async fn set_counter_active(&self, id: CounterId, is_active: bool) -> Result<Counter> {
        let mut tables = self.write()?;
        let counter = tables
            .counters
            .get_mut(&id)
            .ok_or_else(|| QueueError::CounterNotFound {
                counter_id: id.to_string(),
            })?;
        counter.is_active = is_active;
        Ok(counter.clone())
    }

    async fn insert_customer(&self, customer: Customer) -> Result<()> {
        let mut tables = self.write()?;
        tables.customers.insert(customer.id, customer);
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<()> {
        let mut tables = self.write()?;
        match tables.customers.get_mut(&customer.id) {
            Some(existing) => {
                *existing = customer.clone();
                Ok(())
            }
            None => Err(QueueError::TicketNotFound {
                otp: customer.otp.clone(),
            }
            .into()),
        }
    }

    async fn find_customer_by_otp(&self, otp: &str) -> Result<Option<Customer>> {
        let tables = self.read()?;
        Ok(tables.customers.values().find(|c| c.otp == otp).cloned())
    }

    async fn otp_in_use(&self, otp: &str) -> Result<bool> {
        let tables = self.read()?;
        Ok(tables.customers.values().any(|c| c.otp == otp))
    }

    async fn live_customers(&self, counter_id: CounterId) -> Result<Vec<Customer>> {
        let tables = self.read()?;
        let live: Vec<Customer> = tables
            .customers
            .values()
            .filter(|c| c.counter_id == counter_id && c.status.is_live())
            .cloned()
            .collect();
        Ok(sorted_by_position(live))
    }

    async fn live_customer_count(&self, counter_id: CounterId) -> Result<usize> {
        let tables = self.read()?;
        Ok(tables
            .customers
            .values()
            .filter(|c| c.counter_id == counter_id && c.status.is_live())
            .count())
    }

    async fn counter_customers(&self, counter_id: CounterId) -> Result<Vec<Customer>> {
        let tables = self.read()?;
        let customers: Vec<Customer> = tables
            .customers
            .values()
            .filter(|c| c.counter_id == counter_id)
            .cloned()
            .collect();
        Ok(sorted_by_position(customers))
    }

    async fn append_history(&self, record: HistoryRecord) -> Result<()> {
        let mut tables = self.write()?;
        tables.history.push(record);
        Ok(())
    }

    async fn recent_wait_samples(&self, counter_id: CounterId, limit: usize) -> Result<Vec<u64>> {
        let tables = self.read()?;
        Ok(tables
            .history
            .iter()
            .rev()
            .filter(|r| r.counter_id == counter_id)
            .filter_map(|r| r.wait_seconds)
            .take(limit)
            .collect())
    }

    async fn company_history(&self, company_id: CompanyId) -> Result<Vec<HistoryRecord>> {
        let tables = self.read()?;
        Ok(tables
            .history
            .iter()
            .filter(|r| r.company_id == company_id)
            .cloned()
            .collect())
    }
}
