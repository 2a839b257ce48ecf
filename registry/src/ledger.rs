//! Capacity ledger — the authoritative record of all executions.
//!
//! Append-only: a record is inserted as `running` and mutated exactly once
//! more, to a terminal status. The ledger does not check the capacity
//! invariant itself; the admission controller runs the sum + insert inside
//! its critical section.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use shared_types::{Execution, ExecutionStatus, Factor, RegisterRequest};

use crate::error::RegistryError;

const EXECUTION_COLUMNS: &str = "id, run_id, repo, lac, stream, test, kind, environment, \
     triggered_by, status, start_time, end_time, factor, dashboard_url, location, \
     container_name, execution_type, workers, tool, script_version";

#[derive(Debug, sqlx::FromRow)]
struct ExecutionRow {
    id: String,
    run_id: i64,
    repo: String,
    lac: String,
    stream: String,
    test: String,
    kind: String,
    environment: String,
    triggered_by: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    factor: i64,
    dashboard_url: Option<String>,
    location: String,
    container_name: String,
    execution_type: String,
    workers: String,
    tool: String,
    script_version: String,
}

impl ExecutionRow {
    fn into_execution(self) -> Result<Execution, RegistryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RegistryError::Corrupt(format!("execution id '{}': {e}", self.id)))?;
        let status: ExecutionStatus = self
            .status
            .parse()
            .map_err(|e: String| RegistryError::Corrupt(e))?;
        let workers: Vec<String> = serde_json::from_str(&self.workers).map_err(|e| {
            RegistryError::Corrupt(format!("workers list for run {}: {e}", self.run_id))
        })?;

        Ok(Execution {
            id,
            run_id: self.run_id,
            repo: self.repo,
            lac: self.lac,
            stream: self.stream,
            test: self.test,
            kind: self.kind,
            environment: self.environment,
            triggered_by: self.triggered_by,
            status,
            start_time: self.start_time,
            end_time: self.end_time,
            factor: Factor::from_hundredths(self.factor),
            dashboard_url: self.dashboard_url,
            location: self.location,
            container_name: self.container_name,
            execution_type: self.execution_type,
            workers,
            tool: self.tool,
            script_version: self.script_version,
        })
    }
}

#[derive(Clone)]
pub struct ExecutionLedger {
    pool: SqlitePool,
}

impl ExecutionLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new running execution, assigning the next run_id and a fresh
    /// uuid. Callers must hold the admission lock — run_id assignment and the
    /// capacity check are only atomic together under it.
    pub async fn create(&self, draft: &RegisterRequest) -> Result<Execution, RegistryError> {
        let mut tx = self.pool.begin().await?;

        let max_run_id: Option<i64> = sqlx::query_scalar("SELECT MAX(run_id) FROM executions")
            .fetch_one(&mut *tx)
            .await?;
        let run_id = max_run_id.unwrap_or(0) + 1;

        let id = Uuid::new_v4();
        let start_time = Utc::now();
        let workers_json = serde_json::to_string(&draft.workers)
            .map_err(|e| RegistryError::Corrupt(format!("workers list: {e}")))?;

        sqlx::query(&format!(
            "INSERT INTO executions ({EXECUTION_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(id.to_string())
        .bind(run_id)
        .bind(&draft.repo)
        .bind(&draft.lac)
        .bind(&draft.stream)
        .bind(&draft.test)
        .bind(&draft.kind)
        .bind(&draft.environment)
        .bind(&draft.triggered_by)
        .bind(ExecutionStatus::Running.as_str())
        .bind(start_time)
        .bind(None::<DateTime<Utc>>)
        .bind(draft.factor.hundredths())
        .bind(&draft.dashboard_url)
        .bind(&draft.location)
        .bind(&draft.container_name)
        .bind(&draft.execution_type)
        .bind(&workers_json)
        .bind(&draft.tool)
        .bind(&draft.script_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Execution {
            id,
            run_id,
            repo: draft.repo.clone(),
            lac: draft.lac.clone(),
            stream: draft.stream.clone(),
            test: draft.test.clone(),
            kind: draft.kind.clone(),
            environment: draft.environment.clone(),
            triggered_by: draft.triggered_by.clone(),
            status: ExecutionStatus::Running,
            start_time,
            end_time: None,
            factor: draft.factor,
            dashboard_url: draft.dashboard_url.clone(),
            location: draft.location.clone(),
            container_name: draft.container_name.clone(),
            execution_type: draft.execution_type.clone(),
            workers: draft.workers.clone(),
            tool: draft.tool.clone(),
            script_version: draft.script_version.clone(),
        })
    }

    /// Transition a running execution to a terminal status and stamp its
    /// end_time. NotFound when no running record has that run_id — this
    /// covers both "already completed" and "never existed".
    pub async fn complete(
        &self,
        run_id: i64,
        status: ExecutionStatus,
    ) -> Result<Execution, RegistryError> {
        let end_time = Utc::now();

        // The status = 'running' guard makes the transition at-most-once:
        // a concurrent complete/cancel that lost the race affects zero rows.
        let rows = sqlx::query(
            "UPDATE executions SET status = ?, end_time = ? WHERE run_id = ? AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(end_time)
        .bind(run_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(RegistryError::NotFound("Running test not found".to_string()));
        }

        self.find(run_id).await
    }

    pub async fn cancel(&self, run_id: i64) -> Result<Execution, RegistryError> {
        self.complete(run_id, ExecutionStatus::Cancelled).await
    }

    pub async fn find(&self, run_id: i64) -> Result<Execution, RegistryError> {
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions WHERE run_id = ?"
        ))
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_execution(),
            None => Err(RegistryError::NotFound(format!(
                "No test execution found for run_id {run_id}"
            ))),
        }
    }

    pub async fn running(&self) -> Result<Vec<Execution>, RegistryError> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions WHERE status = 'running' ORDER BY run_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ExecutionRow::into_execution).collect()
    }

    /// Full execution history, most recently started first.
    pub async fn history(&self) -> Result<Vec<Execution>, RegistryError> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions \
             ORDER BY start_time DESC, run_id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ExecutionRow::into_execution).collect()
    }

    /// Exact sum of `factor` over running executions, optionally scoped to
    /// one (location, environment) pair. No matches sum to 0.00.
    pub async fn sum_running_factor(
        &self,
        scope: Option<(&str, &str)>,
    ) -> Result<Factor, RegistryError> {
        let sum: Option<i64> = match scope {
            Some((location, environment)) => {
                sqlx::query_scalar(
                    "SELECT SUM(factor) FROM executions \
                     WHERE status = 'running' AND location = ? AND environment = ?",
                )
                .bind(location)
                .bind(environment)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT SUM(factor) FROM executions WHERE status = 'running'")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(Factor::from_hundredths(sum.unwrap_or(0)))
    }

    /// Per-worker load charged by running executions in one
    /// (location, environment) pair: each execution distributes its factor
    /// evenly across its bound workers. Executions with no bound workers
    /// charge nobody.
    pub async fn running_load_by_worker(
        &self,
        location: &str,
        environment: &str,
    ) -> Result<HashMap<String, f64>, RegistryError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT factor, workers FROM executions \
             WHERE status = 'running' AND location = ? AND environment = ?",
        )
        .bind(location)
        .bind(environment)
        .fetch_all(&self.pool)
        .await?;

        let mut load: HashMap<String, f64> = HashMap::new();
        for (factor, workers_json) in rows {
            let workers: Vec<String> = serde_json::from_str(&workers_json)
                .map_err(|e| RegistryError::Corrupt(format!("workers list: {e}")))?;
            if workers.is_empty() {
                continue;
            }
            let share = Factor::from_hundredths(factor).as_f64() / workers.len() as f64;
            for worker in workers {
                *load.entry(worker).or_insert(0.0) += share;
            }
        }

        Ok(load)
    }

    /// Load per (location, environment, worker) across the whole ledger,
    /// for the capacity report.
    pub async fn running_load_all(
        &self,
    ) -> Result<HashMap<(String, String, String), f64>, RegistryError> {
        let rows: Vec<(String, String, i64, String)> = sqlx::query_as(
            "SELECT location, environment, factor, workers FROM executions \
             WHERE status = 'running'",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut load: HashMap<(String, String, String), f64> = HashMap::new();
        for (location, environment, factor, workers_json) in rows {
            let workers: Vec<String> = serde_json::from_str(&workers_json)
                .map_err(|e| RegistryError::Corrupt(format!("workers list: {e}")))?;
            if workers.is_empty() {
                continue;
            }
            let share = Factor::from_hundredths(factor).as_f64() / workers.len() as f64;
            for worker in workers {
                *load
                    .entry((location.clone(), environment.clone(), worker))
                    .or_insert(0.0) += share;
            }
        }

        Ok(load)
    }
}
