//! HTTP request handlers
//!
//! Handlers stay thin: argument extraction, one manager call, and response
//! shaping. The public wire vocabulary says "cashier" where the domain says
//! counter, matching what customer and dashboard clients already speak.

use crate::error::QueueError;
use crate::http::identity::OwnerIdentity;
use crate::http::ApiState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

/// Error wrapper translating domain errors into HTTP responses
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<QueueError>() {
            Some(QueueError::CompanyNotFound { .. })
            | Some(QueueError::CounterNotFound { .. })
            | Some(QueueError::TicketNotFound { .. }) => StatusCode::NOT_FOUND,
            Some(QueueError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
            Some(QueueError::NoCapacity { .. }) | Some(QueueError::Validation { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Some(QueueError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Some(QueueError::Internal { .. }) | None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self.0);
        } else {
            debug!("Request rejected ({}): {}", status, self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Payload for company registration
#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub service_type: String,
    pub num_cashiers: u32,
}

/// Root endpoint handler - shows service information
pub async fn root(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/metrics",
            "/api/join_queue/{company_code}",
            "/api/check_status/{otp}",
            "/api/events"
        ]
    }))
}

/// Lightweight health check endpoint handler
pub async fn health(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.manager.get_stats().await?;
    Ok(Json(json!({
        "status": "healthy",
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "observers": state.notifier.observer_count(),
        "customers_joined": stats.customers_joined,
        "customers_served": stats.customers_served,
    })))
}

/// Prometheus metrics endpoint handler
pub async fn metrics(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.export()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

pub async fn join_queue(
    State(state): State<ApiState>,
    Path(company_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.manager.join_queue(&company_code).await?;
    Ok(Json(json!({
        "success": true,
        "otp": receipt.otp,
        "position": receipt.position,
        "cashier_number": receipt.counter_number,
        "estimated_wait_seconds": receipt.estimated_wait_seconds,
    })))
}

/// Ticket status polled by waiting customers. Sent with no-cache headers so
/// intermediaries never serve a stale position.
pub async fn check_status(
    State(state): State<ApiState>,
    Path(otp): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.manager.ticket_status(&otp).await?;
    let headers = [
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        (header::PRAGMA, "no-cache"),
        (header::EXPIRES, "0"),
    ];
    Ok((
        headers,
        Json(json!({
            "position": status.position,
            "status": status.status,
            "cashier_number": status.counter_number,
            "estimated_wait_seconds": status.estimated_wait_seconds,
            "serving_time_passed": status.serving_time_passed,
            "delays": status.delays,
        })),
    ))
}

pub async fn get_cashier_queue(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Path(counter_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let queue = state.manager.counter_queue(counter_id, owner_id).await?;
    let entries: Vec<_> = queue
        .queue
        .iter()
        .map(|entry| {
            json!({
                "otp": entry.otp,
                "position": entry.position,
                "status": entry.status,
                "delays": entry.delays,
                "join_time": entry.join_time,
                "estimated_wait_seconds": entry.estimated_wait_seconds,
                "serving_start_time": entry.serving_start_time,
            })
        })
        .collect();

    Ok(Json(json!({
        "cashier_number": queue.counter_number,
        "is_active": queue.is_active,
        "queue": entries,
    })))
}

pub async fn toggle_cashier(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Path(counter_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let counter = state.manager.toggle_counter(counter_id, owner_id).await?;
    Ok(Json(json!({
        "success": true,
        "cashier_number": counter.number,
        "is_active": counter.is_active,
    })))
}

pub async fn serve_next(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Path(counter_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.manager.serve_next(counter_id, owner_id).await?;
    Ok(Json(json!({
        "success": true,
        "served_otp": outcome.served_otp,
        "next_otp": outcome.next_otp,
    })))
}

pub async fn delay_customer(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Path(counter_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.manager.delay_current(counter_id, owner_id).await?;
    Ok(Json(json!({
        "success": true,
        "otp": result.otp,
        "outcome": result.outcome,
        "delays": result.delays,
    })))
}

pub async fn remove_customer(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Path(otp): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.manager.remove_customer(&otp, owner_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn create_company(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Json(payload): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let company = state
        .manager
        .create_company(
            owner_id,
            &payload.name,
            &payload.service_type,
            payload.num_cashiers,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "company_id": company.id,
            "company_code": company.code,
        })),
    ))
}

pub async fn list_companies(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
) -> Result<impl IntoResponse, ApiError> {
    let companies = state.manager.companies_for_owner(owner_id).await?;
    let listing: Vec<_> = companies
        .iter()
        .map(|company| {
            json!({
                "company_id": company.id,
                "company_code": company.code,
                "name": company.name,
                "service_type": company.service_type,
                "created_at": company.created_at,
            })
        })
        .collect();
    Ok(Json(json!({ "companies": listing })))
}

pub async fn list_cashiers(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let counters = state.manager.company_counters(company_id, owner_id).await?;
    let listing: Vec<_> = counters
        .iter()
        .map(|counter| {
            json!({
                "cashier_id": counter.id,
                "cashier_number": counter.number,
                "is_active": counter.is_active,
            })
        })
        .collect();
    Ok(Json(json!({ "cashiers": listing })))
}

pub async fn company_stats(
    State(state): State<ApiState>,
    OwnerIdentity(owner_id): OwnerIdentity,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.manager.company_stats(company_id, owner_id).await?;
    Ok(Json(json!({
        "total_served": stats.total_served,
        "total_delayed": stats.total_delayed,
        "avg_wait_seconds": stats.avg_wait_seconds,
    })))
}
