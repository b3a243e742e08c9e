//! Wait-time estimation from completed-visit history

pub mod cache;
pub mod estimator;

pub use cache::TtlCache;
pub use estimator::{
    estimate_for_position, EstimatorConfig, RollingAverageEstimator, WaitTimeEstimator,
};
