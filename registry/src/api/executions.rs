use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use shared_types::{CancelRequest, CompleteRequest, RegisterRequest};

use crate::admission::AdmissionOutcome;
use crate::error::RegistryError;
use crate::state::AppState;

/// POST /register — admit and create a new execution.
/// A capacity rejection is a 200 with a message; no run_id is consumed.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    if !req.factor.is_positive() {
        return Err(RegistryError::Invalid(
            "factor must be greater than 0".to_string(),
        ));
    }

    match state.admission.register(&req).await? {
        AdmissionOutcome::Accepted(execution) => Ok(Json(json!({
            "message": "Test registered",
            "run_id": execution.run_id.to_string(),
            "test_id": execution.id.to_string(),
        }))),
        AdmissionOutcome::Rejected { reason } => Ok(Json(json!({ "message": reason }))),
    }
}

/// POST /complete — transition a running execution to a terminal status.
pub async fn complete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    if !req.status.is_terminal() {
        return Err(RegistryError::Invalid(
            "status must be one of success, failure, cancelled".to_string(),
        ));
    }

    state.admission.complete(req.run_id, req.status).await?;
    Ok(Json(json!({ "message": "Test marked as complete" })))
}

/// POST /cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    state.admission.cancel(req.run_id).await?;
    Ok(Json(json!({ "message": "Test cancelled" })))
}

/// GET /status — currently running executions.
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let running = state.ledger.running().await?;
    Ok(Json(json!({ "running": running })))
}

/// GET /history — all executions, most recently started first.
pub async fn history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let executions = state.ledger.history().await?;
    Ok(Json(json!({ "executions": executions })))
}

/// Enumerated allow-list for /test-data — the serialized field names of an
/// execution. Lookups go through this fixed list, never schema reflection.
const EXECUTION_FIELDS: &[&str] = &[
    "id",
    "run_id",
    "repo",
    "lac",
    "stream",
    "test",
    "type",
    "environment",
    "triggered_by",
    "status",
    "start_time",
    "end_time",
    "factor",
    "dashboard_url",
    "location",
    "container_name",
    "execution_type",
    "workers",
    "tool",
    "script_version",
];

#[derive(Deserialize)]
pub struct TestDataQuery {
    pub column: String,
    pub run_id: i64,
}

/// GET /test-data?column=&run_id= — one field of one execution.
pub async fn test_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TestDataQuery>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    if !EXECUTION_FIELDS.contains(&query.column.as_str()) {
        return Err(RegistryError::Invalid(format!(
            "Invalid column: {}",
            query.column
        )));
    }

    let execution = state.ledger.find(query.run_id).await?;
    let fields = serde_json::to_value(&execution)
        .map_err(|e| RegistryError::Corrupt(format!("execution encoding: {e}")))?;
    let value = fields
        .get(&query.column)
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    let mut body = serde_json::Map::new();
    body.insert(query.column, value);
    Ok(Json(serde_json::Value::Object(body)))
}

#[derive(Deserialize)]
pub struct TestDataAllQuery {
    pub run_id: i64,
}

/// GET /test-data-all?run_id= — the full execution record.
pub async fn test_data_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TestDataAllQuery>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let execution = state.ledger.find(query.run_id).await?;
    let value = serde_json::to_value(&execution)
        .map_err(|e| RegistryError::Corrupt(format!("execution encoding: {e}")))?;
    Ok(Json(value))
}
