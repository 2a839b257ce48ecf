//! Configuration parameter store — opaque name → value tunables for the
//! surrounding tooling. Not part of the allocation engine; it is the one
//! place that raises Conflict.

use sqlx::SqlitePool;

use crate::error::RegistryError;

#[derive(Clone)]
pub struct ParamStore {
    pool: SqlitePool,
}

impl ParamStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, parameter: &str) -> Result<String, RegistryError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM configurations WHERE parameter = ?")
                .bind(parameter)
                .fetch_optional(&self.pool)
                .await?;

        value.ok_or_else(|| {
            RegistryError::NotFound(format!("Configuration parameter '{parameter}' not found"))
        })
    }

    /// Overwrite an existing parameter, returning the value it replaced.
    /// Compare-and-swap: the guarded UPDATE only lands if the value is
    /// still the one read, so a racing writer forces a re-read instead of
    /// both reporting the same stale old_value.
    pub async fn set(&self, parameter: &str, value: &str) -> Result<String, RegistryError> {
        loop {
            let old_value = self.get(parameter).await?;

            let rows = sqlx::query(
                "UPDATE configurations SET value = ? WHERE parameter = ? AND value = ?",
            )
            .bind(value)
            .bind(parameter)
            .bind(&old_value)
            .execute(&self.pool)
            .await?
            .rows_affected();

            if rows > 0 {
                return Ok(old_value);
            }
        }
    }

    /// Create a new parameter; Conflict when the key already exists.
    pub async fn create(&self, parameter: &str, value: &str) -> Result<(), RegistryError> {
        let rows = sqlx::query(
            "INSERT OR IGNORE INTO configurations (parameter, value) VALUES (?, ?)",
        )
        .bind(parameter)
        .bind(value)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(RegistryError::Conflict(format!(
                "Configuration parameter '{parameter}' already exists"
            )));
        }
        Ok(())
    }
}
