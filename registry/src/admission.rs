//! Admission controller — decides whether a new execution may start.
//!
//! Registration is a check-then-insert over a shared aggregate, so the sum
//! of running factors, the threshold check, run_id assignment and the insert
//! run as one critical section behind a mutex. Two concurrent registrations
//! must never each observe room for their own factor and together exceed
//! capacity, and run_ids must never collide.

use tokio::sync::Mutex;
use tracing::info;

use shared_types::{Execution, ExecutionStatus, Factor, RegisterRequest};

use crate::config::AdmissionScope;
use crate::error::RegistryError;
use crate::ledger::ExecutionLedger;

/// Outcome of a registration attempt. A rejection is a normal business
/// outcome, not an error: no run_id is consumed and nothing is stored.
#[derive(Debug)]
pub enum AdmissionOutcome {
    Accepted(Execution),
    Rejected { reason: String },
}

pub struct AdmissionController {
    ledger: ExecutionLedger,
    scope: AdmissionScope,
    /// Serializes sum + check + run_id assignment + insert. Completions may
    /// still race a registration; they only lower the sum afterwards, which
    /// under-admits, never over-admits.
    lock: Mutex<()>,
}

impl AdmissionController {
    pub fn new(ledger: ExecutionLedger, scope: AdmissionScope) -> Self {
        Self {
            ledger,
            scope,
            lock: Mutex::new(()),
        }
    }

    pub async fn register(
        &self,
        draft: &RegisterRequest,
    ) -> Result<AdmissionOutcome, RegistryError> {
        let _guard = self.lock.lock().await;

        let current = match self.scope {
            AdmissionScope::Scoped => {
                self.ledger
                    .sum_running_factor(Some((&draft.location, &draft.environment)))
                    .await?
            }
            AdmissionScope::Global => self.ledger.sum_running_factor(None).await?,
        };

        // Inclusive boundary: current + factor == 1.00 is admitted.
        if current + draft.factor > Factor::ONE {
            let reason = format!(
                "Cannot register test: sum of running factors ({current}) \
                 + new test factor ({}) would exceed 1.0",
                draft.factor
            );
            info!(
                location = %draft.location,
                environment = %draft.environment,
                current = %current,
                requested = %draft.factor,
                "registration rejected"
            );
            return Ok(AdmissionOutcome::Rejected { reason });
        }

        let execution = self.ledger.create(draft).await?;
        info!(
            run_id = execution.run_id,
            location = %execution.location,
            environment = %execution.environment,
            factor = %execution.factor,
            "execution admitted"
        );
        Ok(AdmissionOutcome::Accepted(execution))
    }

    /// Transition a running execution to a terminal status.
    pub async fn complete(
        &self,
        run_id: i64,
        status: ExecutionStatus,
    ) -> Result<Execution, RegistryError> {
        let execution = self.ledger.complete(run_id, status).await?;
        info!(run_id, status = %status, "execution completed");
        Ok(execution)
    }

    pub async fn cancel(&self, run_id: i64) -> Result<Execution, RegistryError> {
        let execution = self.ledger.cancel(run_id).await?;
        info!(run_id, "execution cancelled");
        Ok(execution)
    }
}
