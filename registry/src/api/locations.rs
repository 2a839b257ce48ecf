use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use shared_types::{Factor, LocationStatus};

use crate::error::RegistryError;
use crate::selector::Selection;
use crate::state::AppState;

/// GET /locations — every worker entry with its running load and remaining
/// capacity.
pub async fn capacity_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let report = state.directory.capacity_report(&state.ledger).await?;
    Ok(Json(json!(report)))
}

#[derive(Deserialize)]
pub struct LocationStatusQuery {
    pub location: String,
    pub servername: String,
}

/// GET /location_status?location=&servername=
pub async fn get_location_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LocationStatusQuery>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let status = state
        .directory
        .get_status(&query.location, &query.servername)
        .await?;
    Ok(Json(json!({
        "location": query.location,
        "servername": query.servername,
        "status": status,
    })))
}

#[derive(Deserialize)]
pub struct SetLocationStatusQuery {
    pub location: String,
    pub servername: String,
    pub status: LocationStatus,
}

/// POST /location_status?location=&servername=&status= — unconditional
/// overwrite; anything outside up/down is rejected by the extractor.
pub async fn set_location_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SetLocationStatusQuery>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    state
        .directory
        .set_status(&query.location, &query.servername, query.status)
        .await?;
    Ok(Json(json!({
        "location": query.location,
        "servername": query.servername,
        "status": query.status,
    })))
}

#[derive(Deserialize)]
pub struct SelectWorkersQuery {
    pub location: String,
    pub environment: String,
    pub factor: Factor,
}

/// GET /workers?location=&environment=&factor= — minimal covering set of
/// up workers. A no-match is a 200 with a message.
pub async fn select_workers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SelectWorkersQuery>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    if !query.factor.is_positive() {
        return Err(RegistryError::Invalid(
            "factor must be greater than 0".to_string(),
        ));
    }

    let selection = state
        .selector
        .select_workers(&query.location, &query.environment, query.factor)
        .await?;

    match selection {
        Selection::Workers(servernames) => Ok(Json(json!(servernames))),
        Selection::NoMatch(message) => Ok(Json(json!({ "message": message }))),
    }
}

#[derive(Deserialize)]
pub struct OrchestratorQuery {
    pub location: String,
    pub environment: String,
}

/// GET /orchestrator?location=&environment=
pub async fn get_orchestrator(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrchestratorQuery>,
) -> Result<Json<serde_json::Value>, RegistryError> {
    let orchestrator = state
        .selector
        .orchestrator(&query.location, &query.environment)
        .await?;

    match orchestrator {
        Some(servername) => Ok(Json(json!({ "servername": servername }))),
        None => Ok(Json(json!({
            "message": format!(
                "No orchestrator found for location '{}' and environment '{}'",
                query.location, query.environment
            ),
        }))),
    }
}
