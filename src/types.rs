//! Common types used throughout the queueing service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for companies
pub type CompanyId = Uuid;

/// Unique identifier for counters
pub type CounterId = Uuid;

/// Unique identifier for customers (queue entries)
pub type CustomerId = Uuid;

/// Unique identifier for company owners
pub type OwnerId = Uuid;

/// The 6-digit numeric ticket code handed to a customer. Not a security
/// credential, just a queue ticket.
pub type Otp = String;

/// The 6-uppercase-letter code customers use to find a company.
pub type CompanyCode = String;

/// Status of a customer within a counter's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Waiting,
    Serving,
    Served,
    Delayed,
    Removed,
}

impl CustomerStatus {
    /// Live customers hold a position in the queue; concluded ones keep
    /// their record but no longer occupy a slot.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            CustomerStatus::Waiting | CustomerStatus::Serving | CustomerStatus::Delayed
        )
    }
}

impl std::fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustomerStatus::Waiting => write!(f, "waiting"),
            CustomerStatus::Serving => write!(f, "serving"),
            CustomerStatus::Served => write!(f, "served"),
            CustomerStatus::Delayed => write!(f, "delayed"),
            CustomerStatus::Removed => write!(f, "removed"),
        }
    }
}

/// A tenant organization operating one or more counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub code: CompanyCode,
    pub name: String,
    pub service_type: String,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
}

/// A single service point queues are assigned to ("cashier" in the HTTP surface)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    pub id: CounterId,
    pub company_id: CompanyId,
    /// Ordinal within the company, 1..N
    pub number: u32,
    pub is_active: bool,
}

/// A customer's queue entry. Retained after the visit concludes; the status
/// field tells live entries apart from finished ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub counter_id: CounterId,
    pub otp: Otp,
    /// 1-based rank within the counter's live queue; 1 = being served
    pub position: u32,
    pub status: CustomerStatus,
    pub join_time: DateTime<Utc>,
    pub served_time: Option<DateTime<Utc>>,
    pub serving_start_time: Option<DateTime<Utc>>,
    pub delays: u32,
}

/// Immutable snapshot of a concluded queue visit. Sole input to wait-time
/// estimation and aggregate reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub counter_id: CounterId,
    pub counter_number: u32,
    pub otp: Otp,
    pub join_time: DateTime<Utc>,
    pub served_time: Option<DateTime<Utc>>,
    /// Measured service wait in seconds; absent for removed visits
    pub wait_seconds: Option<u64>,
    pub status: CustomerStatus,
    pub delays: u32,
}

/// Event emitted when a counter is toggled active/inactive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterStatusChange {
    pub counter_id: CounterId,
    pub is_active: bool,
    pub company_code: CompanyCode,
}

/// Event emitted when a customer reaches the front of their queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerTurn {
    pub otp: Otp,
    pub counter_number: u32,
    pub company_code: CompanyCode,
}

/// Union type for all broadcast events. Observers filter client-side by
/// company code / OTP; there is no per-recipient targeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    CounterStatusChange(CounterStatusChange),
    CustomerTurn(CustomerTurn),
}

/// Result of a successful join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinReceipt {
    pub otp: Otp,
    pub position: u32,
    pub counter_number: u32,
    pub estimated_wait_seconds: u64,
}

/// Live view of a single ticket, as surfaced by the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketStatus {
    pub position: u32,
    pub status: CustomerStatus,
    pub counter_number: u32,
    pub estimated_wait_seconds: u64,
    /// Seconds since serving started, when applicable
    pub serving_time_passed: Option<u64>,
    pub delays: u32,
}

/// One row of an owner's counter-queue listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: CustomerId,
    pub otp: Otp,
    pub position: u32,
    pub status: CustomerStatus,
    pub delays: u32,
    pub join_time: DateTime<Utc>,
    pub estimated_wait_seconds: u64,
    pub serving_start_time: Option<DateTime<Utc>>,
}

/// Owner's view of one counter and its queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterQueue {
    pub counter_number: u32,
    pub is_active: bool,
    pub queue: Vec<QueueEntry>,
}

/// Outcome of delaying the customer at the front of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayOutcome {
    /// Re-queued at the back of the counter's queue
    Requeued,
    /// Exceeded the delay limit and was removed
    Removed,
    /// Nobody else queued; stays at the front
    Kept,
}

/// Outcome of serving the customer at the front of a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeOutcome {
    /// Ticket of the customer whose service just completed
    pub served_otp: Otp,
    /// Ticket promoted to the front, if anyone was waiting
    pub next_otp: Option<Otp>,
}

/// Result of a delay operation, including the ticket it applied to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayResult {
    pub otp: Otp,
    pub outcome: DelayOutcome,
    /// Delay count on the ticket after the operation
    pub delays: u32,
}

/// Aggregate history figures for one company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyStats {
    pub total_served: u64,
    pub total_delayed: u64,
    pub avg_wait_seconds: u64,
}
