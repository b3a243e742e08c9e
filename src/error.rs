//! Error types for the queueing service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific queueing scenarios
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("Company not found: {code}")]
    CompanyNotFound { code: String },

    #[error("Counter not found: {counter_id}")]
    CounterNotFound { counter_id: String },

    #[error("Ticket not found: {otp}")]
    TicketNotFound { otp: String },

    #[error("No active counters available for company {code}")]
    NoCapacity { code: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl QueueError {
    /// Whether a retry against the store could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Unavailable { .. })
    }
}
