//! Main application state and service coordination
//!
//! This module wires the store, estimator, notifier, and queue manager
//! together and runs the HTTP server until shutdown.

use crate::config::AppConfig;
use crate::error::Result;
use crate::http::{router, ApiState};
use crate::metrics::MetricsCollector;
use crate::notify::ChannelNotifier;
use crate::queueing::{QueueManager, QueueStats};
use crate::store::{InMemoryQueueStore, QueueStore, RetryPolicy};
use crate::wait_time::{EstimatorConfig, RollingAverageEstimator};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    manager: Arc<QueueManager>,
    notifier: Arc<ChannelNotifier>,
    metrics: Arc<MetricsCollector>,
    shutdown_tx: broadcast::Sender<()>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing {} service", config.service.name);

        let store: Arc<dyn QueueStore> = Arc::new(InMemoryQueueStore::new());
        let metrics = Arc::new(MetricsCollector::new()?);
        let notifier = Arc::new(ChannelNotifier::new(config.http.event_channel_capacity));
        let estimator = Arc::new(RollingAverageEstimator::new(
            store.clone(),
            EstimatorConfig::from_settings(&config.queueing),
        )?);

        let manager = QueueManager::with_metrics(
            store,
            estimator,
            notifier.clone(),
            config.queueing.clone(),
            metrics.clone(),
        )
        .with_retry_policy(RetryPolicy::from_settings(&config.storage));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            manager: Arc::new(manager),
            notifier,
            metrics,
            shutdown_tx,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Serve the HTTP API until a shutdown signal arrives
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.http.host, self.config.http.port)
            .parse()
            .context("Invalid HTTP listen address")?;

        let state = ApiState {
            manager: self.manager.clone(),
            notifier: self.notifier.clone(),
            metrics: self.metrics.clone(),
            service_name: self.config.service.name.clone(),
        };
        let app = router(state);

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("HTTP API listening on http://{}", local_addr);

        *self.is_running.write().await = true;

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Shutdown signal received, draining connections");
            })
            .await?;

        *self.is_running.write().await = false;

        let final_stats = self.manager.get_stats().await?;
        info!("Final service statistics: {:?}", final_stats);
        info!("{} service stopped", self.config.service.name);
        Ok(())
    }

    /// Signal the running server to shut down gracefully
    pub async fn shutdown(&self) -> Result<()> {
        info!("Stopping {} service...", self.config.service.name);
        if self.shutdown_tx.send(()).is_err() {
            warn!("No active server to shut down");
        }
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if the HTTP server is currently serving
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the queue manager for direct operations
    pub fn manager(&self) -> Arc<QueueManager> {
        self.manager.clone()
    }

    /// Get the event notifier, e.g. to subscribe an observer
    pub fn notifier(&self) -> Arc<ChannelNotifier> {
        self.notifier.clone()
    }

    /// Current manager statistics
    pub async fn stats(&self) -> Result<QueueStats> {
        self.manager.get_stats().await
    }
}
