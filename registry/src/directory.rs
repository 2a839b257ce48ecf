//! Location directory — worker/orchestrator entries and their up/down state.
//!
//! Entries are provisioned out of band; the engine only toggles status and
//! reads capacity. Rows are never deleted here.

use sqlx::SqlitePool;
use uuid::Uuid;

use shared_types::{Factor, Location, LocationKind, LocationStatus, WorkerCapacity};

use crate::error::RegistryError;
use crate::ledger::ExecutionLedger;

const LOCATION_COLUMNS: &str = "id, location, servername, kind, environment, factor, status";

#[derive(Debug, sqlx::FromRow)]
struct LocationRow {
    id: String,
    location: String,
    servername: String,
    kind: String,
    environment: String,
    factor: i64,
    status: String,
}

impl LocationRow {
    fn into_location(self) -> Result<Location, RegistryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RegistryError::Corrupt(format!("location id '{}': {e}", self.id)))?;
        let kind: LocationKind = self
            .kind
            .parse()
            .map_err(|e: String| RegistryError::Corrupt(e))?;
        let status: LocationStatus = self
            .status
            .parse()
            .map_err(|e: String| RegistryError::Corrupt(e))?;

        Ok(Location {
            id,
            location: self.location,
            servername: self.servername,
            kind,
            environment: self.environment,
            factor: Factor::from_hundredths(self.factor),
            status,
        })
    }
}

#[derive(Clone)]
pub struct LocationDirectory {
    pool: SqlitePool,
}

impl LocationDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Status of one (location, servername) pair.
    pub async fn get_status(
        &self,
        location: &str,
        servername: &str,
    ) -> Result<LocationStatus, RegistryError> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM locations WHERE location = ? AND servername = ?",
        )
        .bind(location)
        .bind(servername)
        .fetch_optional(&self.pool)
        .await?;

        match status {
            Some(s) => s.parse().map_err(|e: String| RegistryError::Corrupt(e)),
            None => Err(RegistryError::NotFound(
                "Location/server not found".to_string(),
            )),
        }
    }

    /// Overwrite the status of one (location, servername) pair. No
    /// state-machine restriction beyond the up/down enum at the boundary.
    pub async fn set_status(
        &self,
        location: &str,
        servername: &str,
        status: LocationStatus,
    ) -> Result<(), RegistryError> {
        let rows = sqlx::query(
            "UPDATE locations SET status = ? WHERE location = ? AND servername = ?",
        )
        .bind(status.as_str())
        .bind(location)
        .bind(servername)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(RegistryError::NotFound(
                "Location/server not found".to_string(),
            ));
        }
        Ok(())
    }

    /// Up workers in one (location, environment) pair, the selector's
    /// candidate pool. Ordered by servername so retrieval is deterministic.
    pub async fn up_workers(
        &self,
        location: &str,
        environment: &str,
    ) -> Result<Vec<Location>, RegistryError> {
        let rows: Vec<LocationRow> = sqlx::query_as(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations \
             WHERE location = ? AND environment = ? AND kind = 'worker' AND status = 'up' \
             ORDER BY servername"
        ))
        .bind(location)
        .bind(environment)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LocationRow::into_location).collect()
    }

    /// First up orchestrator for the pair, by servername.
    pub async fn orchestrator(
        &self,
        location: &str,
        environment: &str,
    ) -> Result<Option<String>, RegistryError> {
        let servername: Option<String> = sqlx::query_scalar(
            "SELECT servername FROM locations \
             WHERE location = ? AND environment = ? AND kind = 'orchestrator' AND status = 'up' \
             ORDER BY servername LIMIT 1",
        )
        .bind(location)
        .bind(environment)
        .fetch_optional(&self.pool)
        .await?;

        Ok(servername)
    }

    /// Every worker entry joined with its running load and remaining
    /// capacity, across all locations and environments.
    pub async fn capacity_report(
        &self,
        ledger: &ExecutionLedger,
    ) -> Result<Vec<WorkerCapacity>, RegistryError> {
        let rows: Vec<LocationRow> = sqlx::query_as(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE kind = 'worker' \
             ORDER BY location, environment, servername"
        ))
        .fetch_all(&self.pool)
        .await?;

        let load = ledger.running_load_all().await?;

        rows.into_iter()
            .map(|row| {
                let entry = row.into_location()?;
                let key = (
                    entry.location.clone(),
                    entry.environment.clone(),
                    entry.servername.clone(),
                );
                let running_sum = load.get(&key).copied().unwrap_or(0.0);
                Ok(WorkerCapacity {
                    available_factor: entry.factor.as_f64() - running_sum,
                    running_sum,
                    location: entry.location,
                    servername: entry.servername,
                    environment: entry.environment,
                    location_factor: entry.factor,
                    status: entry.status,
                })
            })
            .collect()
    }
}
