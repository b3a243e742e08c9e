//! HTTP API surface
//!
//! Customer-facing endpoints are unauthenticated; owner endpoints require
//! the forwarded owner identity (see `identity`). Broadcast events reach
//! observers through the SSE stream in `events`.

pub mod events;
pub mod handlers;
pub mod identity;

use crate::metrics::MetricsCollector;
use crate::notify::ChannelNotifier;
use crate::queueing::QueueManager;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<QueueManager>,
    pub notifier: Arc<ChannelNotifier>,
    pub metrics: Arc<MetricsCollector>,
    pub service_name: String,
}

/// Build the full API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/api/join_queue/{company_code}", post(handlers::join_queue))
        .route("/api/check_status/{otp}", get(handlers::check_status))
        .route(
            "/api/get_cashier_queue/{counter_id}",
            get(handlers::get_cashier_queue),
        )
        .route(
            "/api/toggle_cashier/{counter_id}",
            post(handlers::toggle_cashier),
        )
        .route("/api/serve_next/{counter_id}", post(handlers::serve_next))
        .route(
            "/api/delay_customer/{counter_id}",
            post(handlers::delay_customer),
        )
        .route("/api/remove_customer/{otp}", post(handlers::remove_customer))
        .route(
            "/api/companies",
            get(handlers::list_companies).post(handlers::create_company),
        )
        .route("/api/get_cashiers/{company_id}", get(handlers::list_cashiers))
        .route(
            "/api/company_stats/{company_id}",
            get(handlers::company_stats),
        )
        .route("/api/events", get(events::event_stream))
        .with_state(state)
}
