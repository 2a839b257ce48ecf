//! HTTP API routes for the execution registry
//!
//! Thin plumbing over the engine: handlers validate the wire shapes, call
//! one engine operation, and translate its outcome. Business rejections
//! (admission refused, no qualifying worker) stay 200 with a message body;
//! only NotFound/Conflict/validation become error status codes.

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub mod executions;
pub mod locations;
pub mod params;

use crate::state::AppState;

/// Configure all API routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        // Execution lifecycle
        .route("/register", post(executions::register))
        .route("/complete", post(executions::complete))
        .route("/cancel", post(executions::cancel))
        .route("/status", get(executions::status))
        .route("/history", get(executions::history))
        .route("/test-data", get(executions::test_data))
        .route("/test-data-all", get(executions::test_data_all))
        // Capacity and location directory
        .route("/locations", get(locations::capacity_report))
        .route(
            "/location_status",
            get(locations::get_location_status).post(locations::set_location_status),
        )
        .route("/workers", get(locations::select_workers))
        .route("/orchestrator", get(locations::get_orchestrator))
        // Configuration parameters
        .route("/configuration", post(params::create_configuration))
        .route(
            "/configuration/{parameter}",
            get(params::get_configuration).post(params::update_configuration),
        )
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
