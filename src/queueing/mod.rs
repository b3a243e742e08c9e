//! Queue orchestration: counter assignment and the customer lifecycle

pub mod assigner;
pub mod manager;

pub use assigner::{CounterAssigner, CounterLoad, ShortestQueueAssigner};
pub use manager::{QueueManager, QueueStats};
