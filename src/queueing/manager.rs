//! Queue manager implementation coordinating counters, tickets, and events
//!
//! This module provides the core QueueManager that orchestrates company
//! creation, counter assignment, ticket lifecycle transitions, and the
//! broadcast events observers rely on.

use crate::config::QueueSettings;
use crate::error::{QueueError, Result};
use crate::metrics::MetricsCollector;
use crate::notify::Notifier;
use crate::queueing::assigner::{CounterAssigner, CounterLoad, ShortestQueueAssigner};
use crate::store::{with_retry, QueueStore, RetryPolicy};
use crate::types::{
    Company, CompanyCode, CompanyId, CompanyStats, Counter, CounterId, CounterQueue,
    CounterStatusChange, Customer, CustomerStatus, CustomerTurn, DelayOutcome, DelayResult,
    HistoryRecord, JoinReceipt, Otp, OwnerId, QueueEntry, ServeOutcome, TicketStatus,
};
use crate::utils::{
    current_timestamp, generate_company_code, generate_id, generate_otp, is_valid_company_code,
    is_valid_otp,
};
use crate::wait_time::{estimate_for_position, TtlCache, WaitTimeEstimator};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Statistics about queue manager operations
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    /// Total customers that joined a queue
    pub customers_joined: u64,
    /// Total customers served to completion
    pub customers_served: u64,
    /// Total delay operations applied
    pub customers_delayed: u64,
    /// Total customers removed, including delay-limit removals
    pub customers_removed: u64,
    /// Total companies created
    pub companies_created: u64,
    /// Total customer_turn events broadcast
    pub turn_events: u64,
}

/// The main queue manager
pub struct QueueManager {
    store: Arc<dyn QueueStore>,
    estimator: Arc<dyn WaitTimeEstimator>,
    notifier: Arc<dyn Notifier>,
    /// Strategy picking the counter a joining customer lands on
    assigner: Arc<dyn CounterAssigner>,
    settings: QueueSettings,
    retry: RetryPolicy,
    /// Company lookups by code; writes to companies are rare
    company_cache: TtlCache<CompanyCode, Company>,
    /// Per-company counter loads; invalidated on every queue mutation
    load_cache: TtlCache<CompanyId, Vec<CounterLoad>>,
    /// One async mutex per company serializes read-then-write queue flows
    company_locks: Mutex<HashMap<CompanyId, Arc<AsyncMutex<()>>>>,
    stats: RwLock<QueueStats>,
    metrics: Arc<MetricsCollector>,
}

impl QueueManager {
    /// Create a new queue manager with its own metrics registry
    pub fn new(
        store: Arc<dyn QueueStore>,
        estimator: Arc<dyn WaitTimeEstimator>,
        notifier: Arc<dyn Notifier>,
        settings: QueueSettings,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        Ok(Self::with_metrics(store, estimator, notifier, settings, metrics))
    }

    /// Create a new queue manager recording into an existing collector
    pub fn with_metrics(
        store: Arc<dyn QueueStore>,
        estimator: Arc<dyn WaitTimeEstimator>,
        notifier: Arc<dyn Notifier>,
        settings: QueueSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let company_cache = TtlCache::new(Duration::from_secs(settings.company_cache_ttl_seconds));
        let load_cache =
            TtlCache::new(Duration::from_secs(settings.queue_length_cache_ttl_seconds));

        Self {
            store,
            estimator,
            notifier,
            assigner: Arc::new(ShortestQueueAssigner::new()),
            settings,
            retry: RetryPolicy::default(),
            company_cache,
            load_cache,
            company_locks: Mutex::new(HashMap::new()),
            stats: RwLock::new(QueueStats::default()),
            metrics,
        }
    }

    /// Replace the retry policy applied to store reads
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the counter assignment strategy
    pub fn with_assigner(mut self, assigner: Arc<dyn CounterAssigner>) -> Self {
        self.assigner = assigner;
        self
    }

    /// Register a new company and its initial set of active counters
    pub async fn create_company(
        &self,
        owner_id: OwnerId,
        name: &str,
        service_type: &str,
        num_counters: u32,
    ) -> Result<Company> {
        let name = name.trim();
        let service_type = service_type.trim();
        if name.is_empty() {
            return Err(QueueError::Validation {
                reason: "Company name must not be empty".to_string(),
            }
            .into());
        }
        if service_type.is_empty() {
            return Err(QueueError::Validation {
                reason: "Service type must not be empty".to_string(),
            }
            .into());
        }
        if num_counters == 0 || num_counters > self.settings.max_counters_per_company {
            return Err(QueueError::Validation {
                reason: format!(
                    "Counter count must be between 1 and {}",
                    self.settings.max_counters_per_company
                ),
            }
            .into());
        }

        let code = self.generate_unique_company_code().await?;
        let company = Company {
            id: generate_id(),
            code: code.clone(),
            name: name.to_string(),
            service_type: service_type.to_string(),
            owner_id,
            created_at: current_timestamp(),
        };
        self.store.insert_company(company.clone()).await?;

        for number in 1..=num_counters {
            let counter = Counter {
                id: generate_id(),
                company_id: company.id,
                number,
                is_active: true,
            };
            self.store.insert_counter(counter).await?;
        }

        {
            let mut stats = self.stats_mut()?;
            stats.companies_created += 1;
        }

        info!(
            "Created company '{}' ({}) with {} counters",
            company.name, company.code, num_counters
        );

        Ok(company)
    }

    /// Companies owned by the given account
    pub async fn companies_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Company>> {
        with_retry(&self.retry, || self.store.companies_for_owner(owner_id)).await
    }

    /// All counters of a company the caller owns, active or not
    pub async fn company_counters(
        &self,
        company_id: CompanyId,
        owner_id: OwnerId,
    ) -> Result<Vec<Counter>> {
        self.authorized_company(company_id, owner_id).await?;
        with_retry(&self.retry, || self.store.counters_for_company(company_id)).await
    }

    /// Join the shortest queue of the company behind `company_code`.
    ///
    /// The customer is assigned to the active counter with the fewest live
    /// customers, ties broken by the lowest counter number. A customer who
    /// lands at the front starts in `Serving` and triggers a turn event
    /// immediately.
    pub async fn join_queue(&self, company_code: &str) -> Result<JoinReceipt> {
        let timer = self.metrics.join_duration_seconds.start_timer();
        let company = self.company_by_code(company_code).await?;

        let lock = self.company_lock(company.id)?;
        let _guard = lock.lock().await;

        let loads = self.counter_loads(&company).await?;
        let chosen = self
            .assigner
            .assign(&loads)
            .ok_or_else(|| QueueError::NoCapacity {
                code: company.code.clone(),
            })?;
        let counter = chosen.counter.clone();

        // Cached lengths drive selection; the position itself comes from the
        // store under the company lock so it stays collision-free.
        let ahead = with_retry(&self.retry, || self.store.live_customer_count(counter.id)).await?;
        let position = ahead as u32 + 1;
        let is_front = position == 1;

        let otp = self.generate_unique_otp().await?;
        let per_customer = self.estimator.per_customer_seconds(counter.id).await?;
        let now = current_timestamp();

        let customer = Customer {
            id: generate_id(),
            counter_id: counter.id,
            otp: otp.clone(),
            position,
            status: if is_front {
                CustomerStatus::Serving
            } else {
                CustomerStatus::Waiting
            },
            join_time: now,
            served_time: None,
            serving_start_time: if is_front { Some(now) } else { None },
            delays: 0,
        };
        // Inserts are not idempotent, so no retry wrapper here
        self.store.insert_customer(customer).await?;
        self.load_cache.invalidate(&company.id);

        if is_front {
            self.emit_turn(&company, &counter, &otp).await;
        }

        {
            let mut stats = self.stats_mut()?;
            stats.customers_joined += 1;
        }
        self.metrics.joins_total.inc();
        self.metrics.waiting_customers.inc();
        timer.observe_duration();

        info!(
            "Customer joined company '{}' at counter {} (position {}, ticket {})",
            company.code, counter.number, position, otp
        );

        Ok(JoinReceipt {
            otp,
            position,
            counter_number: counter.number,
            estimated_wait_seconds: estimate_for_position(position - 1, per_customer),
        })
    }

    /// Mark the front customer of a counter as served and promote the next
    pub async fn serve_next(
        &self,
        counter_id: CounterId,
        owner_id: OwnerId,
    ) -> Result<ServeOutcome> {
        let counter = self.counter_record(counter_id).await?;
        let company = self.authorized_company(counter.company_id, owner_id).await?;

        let lock = self.company_lock(company.id)?;
        let _guard = lock.lock().await;

        let live = with_retry(&self.retry, || self.store.live_customers(counter.id)).await?;
        let mut front = live
            .first()
            .cloned()
            .ok_or_else(|| QueueError::Validation {
                reason: format!("No customers queued at counter {}", counter.number),
            })?;
        let followers: Vec<Customer> = live.into_iter().skip(1).collect();

        let now = current_timestamp();
        let wait_seconds = (now - front.join_time).num_seconds().max(0) as u64;
        front.status = CustomerStatus::Served;
        front.served_time = Some(now);
        self.store.update_customer(&front).await?;
        self.append_visit_record(&company, &counter, &front, Some(wait_seconds))
            .await?;

        let next_otp = self.advance_queue(&company, &counter, followers).await?;
        self.load_cache.invalidate(&company.id);

        {
            let mut stats = self.stats_mut()?;
            stats.customers_served += 1;
        }
        self.metrics.serves_total.inc();
        self.metrics.waiting_customers.dec();

        info!(
            "Served ticket {} at counter {} of company '{}' after {}s",
            front.otp, counter.number, company.code, wait_seconds
        );

        Ok(ServeOutcome {
            served_otp: front.otp,
            next_otp,
        })
    }

    /// Push the front customer to the back of their queue.
    ///
    /// A customer with nobody behind them stays put. A customer pushed back
    /// more than the configured limit is removed instead.
    pub async fn delay_current(
        &self,
        counter_id: CounterId,
        owner_id: OwnerId,
    ) -> Result<DelayResult> {
        let counter = self.counter_record(counter_id).await?;
        let company = self.authorized_company(counter.company_id, owner_id).await?;

        let lock = self.company_lock(company.id)?;
        let _guard = lock.lock().await;

        let live = with_retry(&self.retry, || self.store.live_customers(counter.id)).await?;
        let mut front = live
            .first()
            .cloned()
            .ok_or_else(|| QueueError::Validation {
                reason: format!("No customers queued at counter {}", counter.number),
            })?;
        let followers: Vec<Customer> = live.into_iter().skip(1).collect();
        let back_position = followers.len() as u32 + 1;

        front.delays += 1;
        let delays = front.delays;

        let (outcome, otp) = if followers.is_empty() {
            // Nobody to swap with; the customer keeps the front slot
            self.store.update_customer(&front).await?;
            (DelayOutcome::Kept, front.otp)
        } else if delays > self.settings.max_delays {
            front.status = CustomerStatus::Removed;
            front.serving_start_time = None;
            self.store.update_customer(&front).await?;
            self.append_visit_record(&company, &counter, &front, None)
                .await?;
            self.advance_queue(&company, &counter, followers).await?;

            {
                let mut stats = self.stats_mut()?;
                stats.customers_removed += 1;
            }
            self.metrics.removals_total.inc();
            self.metrics.waiting_customers.dec();
            (DelayOutcome::Removed, front.otp)
        } else {
            // Shift the rest forward first so positions stay collision-free
            self.advance_queue(&company, &counter, followers).await?;
            front.status = CustomerStatus::Delayed;
            front.serving_start_time = None;
            front.position = back_position;
            self.store.update_customer(&front).await?;
            (DelayOutcome::Requeued, front.otp)
        };

        self.load_cache.invalidate(&company.id);
        {
            let mut stats = self.stats_mut()?;
            stats.customers_delayed += 1;
        }
        self.metrics.delays_total.inc();

        info!(
            "Delayed ticket {} at counter {} of company '{}' ({:?}, {} delays)",
            otp, counter.number, company.code, outcome, delays
        );

        Ok(DelayResult {
            otp,
            outcome,
            delays,
        })
    }

    /// Remove a live customer from their queue, closing their ticket
    pub async fn remove_customer(&self, otp: &str, owner_id: OwnerId) -> Result<()> {
        let routing = self.live_customer_by_otp(otp).await?;
        let counter = self.counter_record(routing.counter_id).await?;
        let company = self.authorized_company(counter.company_id, owner_id).await?;

        let lock = self.company_lock(company.id)?;
        let _guard = lock.lock().await;

        // Re-read under the lock; the queue may have moved since the lookup
        let mut customer = self.live_customer_by_otp(otp).await?;
        let live = with_retry(&self.retry, || self.store.live_customers(counter.id)).await?;
        let followers: Vec<Customer> = live
            .into_iter()
            .filter(|c| c.position > customer.position)
            .collect();

        customer.status = CustomerStatus::Removed;
        customer.serving_start_time = None;
        self.store.update_customer(&customer).await?;
        self.append_visit_record(&company, &counter, &customer, None)
            .await?;
        self.advance_queue(&company, &counter, followers).await?;
        self.load_cache.invalidate(&company.id);

        {
            let mut stats = self.stats_mut()?;
            stats.customers_removed += 1;
        }
        self.metrics.removals_total.inc();
        self.metrics.waiting_customers.dec();

        info!(
            "Removed ticket {} from counter {} of company '{}'",
            otp, counter.number, company.code
        );

        Ok(())
    }

    /// Flip a counter between active and inactive
    pub async fn toggle_counter(
        &self,
        counter_id: CounterId,
        owner_id: OwnerId,
    ) -> Result<Counter> {
        let counter = self.counter_record(counter_id).await?;
        let company = self.authorized_company(counter.company_id, owner_id).await?;

        let lock = self.company_lock(company.id)?;
        let _guard = lock.lock().await;

        let updated = self
            .store
            .set_counter_active(counter.id, !counter.is_active)
            .await?;
        self.load_cache.invalidate(&company.id);

        let event = CounterStatusChange {
            counter_id: updated.id,
            is_active: updated.is_active,
            company_code: company.code.clone(),
        };
        if let Err(e) = self.notifier.counter_status_changed(event).await {
            warn!(
                "Failed to broadcast status change for counter {}: {}",
                updated.number, e
            );
        }

        info!(
            "Counter {} of company '{}' is now {}",
            updated.number,
            company.code,
            if updated.is_active { "active" } else { "inactive" }
        );

        Ok(updated)
    }

    /// Current view of a ticket, as shown to the customer holding it
    pub async fn ticket_status(&self, otp: &str) -> Result<TicketStatus> {
        if !is_valid_otp(otp) {
            return Err(QueueError::Validation {
                reason: "Ticket code must be 6 digits".to_string(),
            }
            .into());
        }

        let customer = with_retry(&self.retry, || self.store.find_customer_by_otp(otp))
            .await?
            .ok_or_else(|| QueueError::TicketNotFound {
                otp: otp.to_string(),
            })?;
        let counter = self.counter_record(customer.counter_id).await?;
        let per_customer = self.estimator.per_customer_seconds(counter.id).await?;

        let serving_time_passed = match (customer.status, customer.serving_start_time) {
            (CustomerStatus::Serving, Some(start)) => {
                Some((current_timestamp() - start).num_seconds().max(0) as u64)
            }
            _ => None,
        };

        Ok(TicketStatus {
            position: customer.position,
            status: customer.status,
            counter_number: counter.number,
            estimated_wait_seconds: estimate_for_position(customer.position, per_customer),
            serving_time_passed,
            delays: customer.delays,
        })
    }

    /// Owner's view of one counter and every ticket it has handled
    pub async fn counter_queue(
        &self,
        counter_id: CounterId,
        owner_id: OwnerId,
    ) -> Result<CounterQueue> {
        let counter = self.counter_record(counter_id).await?;
        self.authorized_company(counter.company_id, owner_id).await?;

        let customers =
            with_retry(&self.retry, || self.store.counter_customers(counter.id)).await?;
        let per_customer = self.estimator.per_customer_seconds(counter.id).await?;

        let queue = customers
            .into_iter()
            .map(|c| QueueEntry {
                id: c.id,
                otp: c.otp,
                position: c.position,
                status: c.status,
                delays: c.delays,
                join_time: c.join_time,
                estimated_wait_seconds: if c.status.is_live() {
                    estimate_for_position(c.position, per_customer)
                } else {
                    0
                },
                serving_start_time: c.serving_start_time,
            })
            .collect();

        Ok(CounterQueue {
            counter_number: counter.number,
            is_active: counter.is_active,
            queue,
        })
    }

    /// Aggregate history figures for a company the caller owns
    pub async fn company_stats(
        &self,
        company_id: CompanyId,
        owner_id: OwnerId,
    ) -> Result<CompanyStats> {
        self.authorized_company(company_id, owner_id).await?;
        let history = with_retry(&self.retry, || self.store.company_history(company_id)).await?;

        let total_served = history
            .iter()
            .filter(|r| r.status == CustomerStatus::Served)
            .count() as u64;
        let total_delayed = history.iter().filter(|r| r.delays > 0).count() as u64;
        let waits: Vec<u64> = history.iter().filter_map(|r| r.wait_seconds).collect();
        let avg_wait_seconds = if waits.is_empty() {
            0
        } else {
            (waits.iter().sum::<u64>() as f64 / waits.len() as f64).round() as u64
        };

        Ok(CompanyStats {
            total_served,
            total_delayed,
            avg_wait_seconds,
        })
    }

    /// Get current manager statistics
    pub async fn get_stats(&self) -> Result<QueueStats> {
        let stats = self.stats.read().map_err(|_| QueueError::Internal {
            message: "Failed to acquire stats lock".to_string(),
        })?;
        Ok(stats.clone())
    }

    async fn company_by_code(&self, code: &str) -> Result<Company> {
        // Malformed codes can never match, so skip the store round trip
        if !is_valid_company_code(code) {
            return Err(QueueError::CompanyNotFound {
                code: code.to_string(),
            }
            .into());
        }

        let key = code.to_string();
        if let Some(company) = self.company_cache.get(&key) {
            return Ok(company);
        }

        let company = with_retry(&self.retry, || self.store.find_company_by_code(code))
            .await?
            .ok_or_else(|| QueueError::CompanyNotFound {
                code: code.to_string(),
            })?;
        self.company_cache.insert(key, company.clone());
        Ok(company)
    }

    async fn counter_loads(&self, company: &Company) -> Result<Vec<CounterLoad>> {
        if let Some(loads) = self.load_cache.get(&company.id) {
            return Ok(loads);
        }

        let counters = with_retry(&self.retry, || self.store.active_counters(company.id)).await?;
        let mut loads = Vec::with_capacity(counters.len());
        for counter in counters {
            let queue_length =
                with_retry(&self.retry, || self.store.live_customer_count(counter.id)).await?;
            loads.push(CounterLoad {
                counter,
                queue_length,
            });
        }
        self.load_cache.insert(company.id, loads.clone());
        Ok(loads)
    }

    async fn counter_record(&self, counter_id: CounterId) -> Result<Counter> {
        with_retry(&self.retry, || self.store.find_counter(counter_id))
            .await?
            .ok_or_else(|| {
                QueueError::CounterNotFound {
                    counter_id: counter_id.to_string(),
                }
                .into()
            })
    }

    async fn authorized_company(
        &self,
        company_id: CompanyId,
        owner_id: OwnerId,
    ) -> Result<Company> {
        let company = with_retry(&self.retry, || self.store.find_company(company_id))
            .await?
            .ok_or_else(|| QueueError::CompanyNotFound {
                code: company_id.to_string(),
            })?;
        if company.owner_id != owner_id {
            return Err(QueueError::Unauthorized {
                reason: "Counter belongs to a different company owner".to_string(),
            }
            .into());
        }
        Ok(company)
    }

    async fn live_customer_by_otp(&self, otp: &str) -> Result<Customer> {
        let customer = with_retry(&self.retry, || self.store.find_customer_by_otp(otp))
            .await?
            .ok_or_else(|| QueueError::TicketNotFound {
                otp: otp.to_string(),
            })?;
        if !customer.status.is_live() {
            return Err(QueueError::Validation {
                reason: format!("Ticket {} has already concluded", otp),
            }
            .into());
        }
        Ok(customer)
    }

    /// Shift `followers` up one slot each and promote whoever lands at the
    /// front to serving. Returns the promoted ticket, if any.
    async fn advance_queue(
        &self,
        company: &Company,
        counter: &Counter,
        followers: Vec<Customer>,
    ) -> Result<Option<Otp>> {
        let now = current_timestamp();
        let mut promoted = None;

        for mut customer in followers {
            customer.position -= 1;
            if customer.position == 1 {
                customer.status = CustomerStatus::Serving;
                customer.serving_start_time = Some(now);
                promoted = Some(customer.otp.clone());
            }
            self.store.update_customer(&customer).await?;
        }

        if let Some(otp) = &promoted {
            self.emit_turn(company, counter, otp).await;
        }
        Ok(promoted)
    }

    async fn append_visit_record(
        &self,
        company: &Company,
        counter: &Counter,
        customer: &Customer,
        wait_seconds: Option<u64>,
    ) -> Result<()> {
        self.store
            .append_history(HistoryRecord {
                id: generate_id(),
                company_id: company.id,
                counter_id: counter.id,
                counter_number: counter.number,
                otp: customer.otp.clone(),
                join_time: customer.join_time,
                served_time: customer.served_time,
                wait_seconds,
                status: customer.status,
                delays: customer.delays,
            })
            .await
    }

    /// Broadcast a turn event. Broadcast failures are logged, never surfaced;
    /// the queue state is already committed by the time this runs.
    async fn emit_turn(&self, company: &Company, counter: &Counter, otp: &str) {
        let event = CustomerTurn {
            otp: otp.to_string(),
            counter_number: counter.number,
            company_code: company.code.clone(),
        };
        if let Err(e) = self.notifier.customer_turn(event).await {
            warn!("Failed to broadcast turn event for ticket {}: {}", otp, e);
        }
        self.metrics.turn_events_total.inc();
        if let Ok(mut stats) = self.stats.write() {
            stats.turn_events += 1;
        }
    }

    // Uniqueness is guarded only by the caller's company lock; simultaneous
    // joins to different companies can race the in-use check. At six digits
    // a cross-company duplicate is a one-in-a-million event per pair and is
    // tolerated.
    async fn generate_unique_otp(&self) -> Result<Otp> {
        loop {
            let candidate = generate_otp();
            let in_use = with_retry(&self.retry, || self.store.otp_in_use(&candidate)).await?;
            if !in_use {
                return Ok(candidate);
            }
            debug!("Ticket code collision, regenerating");
        }
    }

    async fn generate_unique_company_code(&self) -> Result<CompanyCode> {
        loop {
            let candidate = generate_company_code();
            let in_use =
                with_retry(&self.retry, || self.store.company_code_in_use(&candidate)).await?;
            if !in_use {
                return Ok(candidate);
            }
            debug!("Company code collision, regenerating");
        }
    }

    fn company_lock(&self, company_id: CompanyId) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self.company_locks.lock().map_err(|_| QueueError::Internal {
            message: "Failed to acquire company lock registry".to_string(),
        })?;
        Ok(locks.entry(company_id).or_default().clone())
    }

    fn stats_mut(&self) -> Result<RwLockWriteGuard<'_, QueueStats>> {
        self.stats.write().map_err(|_| {
            QueueError::Internal {
                message: "Failed to acquire stats lock".to_string(),
            }
            .into()
        })
    }
}
