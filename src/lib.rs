//! Waitline - Multi-tenant virtual queueing microservice
//!
//! This crate provides HTTP-based queue management for companies with
//! multiple service counters, shortest-queue customer assignment,
//! history-backed wait-time estimation, and live event broadcast.

pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod notify;
pub mod queueing;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
pub mod wait_time;

// Re-export commonly used types and traits
pub use error::{QueueError, Result};
pub use types::*;

// Re-export key components
pub use notify::{ChannelNotifier, Notifier};
pub use queueing::{QueueManager, QueueStats};
pub use store::{InMemoryQueueStore, QueueStore};
pub use wait_time::{RollingAverageEstimator, WaitTimeEstimator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
