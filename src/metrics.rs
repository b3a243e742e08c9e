//! Prometheus metrics for the queueing service

use crate::error::{QueueError, Result};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

/// Collector owning the service's metric handles and their registry
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    registry: Registry,

    pub joins_total: IntCounter,
    pub serves_total: IntCounter,
    pub delays_total: IntCounter,
    pub removals_total: IntCounter,
    pub turn_events_total: IntCounter,
    pub join_duration_seconds: Histogram,
    pub waiting_customers: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let joins_total = IntCounter::new(
            "waitline_joins_total",
            "Total customers that joined a queue",
        )?;
        let serves_total = IntCounter::new(
            "waitline_serves_total",
            "Total customers served to completion",
        )?;
        let delays_total = IntCounter::new(
            "waitline_delays_total",
            "Total delay operations applied to front-of-queue customers",
        )?;
        let removals_total = IntCounter::new(
            "waitline_removals_total",
            "Total customers removed from a queue",
        )?;
        let turn_events_total = IntCounter::new(
            "waitline_turn_events_total",
            "Total customer_turn events broadcast",
        )?;
        let join_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "waitline_join_duration_seconds",
                "Join request processing time in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        let waiting_customers = IntGauge::new(
            "waitline_waiting_customers",
            "Customers currently live in any queue",
        )?;

        registry.register(Box::new(joins_total.clone()))?;
        registry.register(Box::new(serves_total.clone()))?;
        registry.register(Box::new(delays_total.clone()))?;
        registry.register(Box::new(removals_total.clone()))?;
        registry.register(Box::new(turn_events_total.clone()))?;
        registry.register(Box::new(join_duration_seconds.clone()))?;
        registry.register(Box::new(waiting_customers.clone()))?;

        Ok(Self {
            registry,
            joins_total,
            serves_total,
            delays_total,
            removals_total,
            turn_events_total,
            join_duration_seconds,
            waiting_customers,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| QueueError::Internal {
                message: format!("Failed to encode metrics: {}", e),
            })?;
        String::from_utf8(buffer).map_err(|e| {
            QueueError::Internal {
                message: format!("Metrics output was not UTF-8: {}", e),
            }
            .into()
        })
    }
}
