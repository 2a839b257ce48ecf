use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;

use shared_types::{ConfigurationCreateRequest, ConfigurationUpdateRequest};

use crate::error::RegistryError;
use crate::state::AppState;

/// GET /configuration/{parameter}
pub async fn get_configuration(
    State(state): State<Arc<AppState>>,
    Path(parameter): Path<String>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let value = state.params.get(&parameter).await?;
    Ok(Json(json!({ "parameter": parameter, "value": value })))
}

/// POST /configuration/{parameter} — update an existing parameter.
pub async fn update_configuration(
    State(state): State<Arc<AppState>>,
    Path(parameter): Path<String>,
    Json(req): Json<ConfigurationUpdateRequest>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let old_value = state.params.set(&parameter, &req.value).await?;
    Ok(Json(json!({
        "message": format!("Configuration parameter '{parameter}' updated successfully"),
        "parameter": parameter,
        "old_value": old_value,
        "new_value": req.value,
    })))
}

/// POST /configuration — create a new parameter; 409 on duplicate.
pub async fn create_configuration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfigurationCreateRequest>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    state.params.create(&req.parameter, &req.value).await?;
    Ok(Json(json!({
        "message": format!("Configuration parameter '{}' created successfully", req.parameter),
        "parameter": req.parameter,
        "value": req.value,
    })))
}
