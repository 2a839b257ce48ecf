//! Worker selector — minimal covering-set search over available capacity.
//!
//! Selection reads a fresh ledger + directory snapshot and takes no write
//! lock; it may race a registration that saturates a returned worker.
//! Capacity is only reserved at registration, so selection is best-effort.

use std::collections::HashMap;

use shared_types::{Factor, Location};

use crate::directory::LocationDirectory;
use crate::error::RegistryError;
use crate::ledger::ExecutionLedger;

/// One up worker with its remaining capacity in the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub servername: String,
    pub available: f64,
}

/// Result of a worker or orchestrator lookup. `NoMatch` is a normal
/// outcome carrying a human-readable reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Workers(Vec<String>),
    NoMatch(String),
}

/// Rank up workers by available capacity, descending. Ties break by
/// servername ascending so selection is reproducible.
pub fn rank_candidates(workers: &[Location], load: &HashMap<String, f64>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = workers
        .iter()
        .map(|entry| Candidate {
            servername: entry.servername.clone(),
            available: entry.factor.as_f64() - load.get(&entry.servername).copied().unwrap_or(0.0),
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.available
            .partial_cmp(&a.available)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.servername.cmp(&b.servername))
    });
    candidates
}

/// Pick the smallest group of candidates that can jointly carry `factor`.
///
/// For factor <= 1 that is the first candidate (in descending-available
/// order) with enough headroom. For factor > 1 it is a greedy feasibility
/// search: for n = 1, 2, ... the per-worker threshold is factor / n, and the
/// first n candidates individually clearing it win. This returns the
/// smallest feasible n, not the group with the least over-provisioning.
pub fn select(
    candidates: &[Candidate],
    factor: f64,
    location: &str,
    environment: &str,
) -> Selection {
    if candidates.is_empty() {
        return Selection::NoMatch(format!(
            "No servers found for location '{location}' and environment '{environment}'"
        ));
    }

    if factor <= 1.0 {
        for candidate in candidates {
            if candidate.available >= factor {
                return Selection::Workers(vec![candidate.servername.clone()]);
            }
        }
        return Selection::NoMatch(format!(
            "No single server found with available_factor > {factor} \
             in location '{location}' and environment '{environment}'."
        ));
    }

    for n in 1..=candidates.len() {
        let threshold = factor / n as f64;
        let eligible: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.available >= threshold)
            .collect();
        if eligible.len() >= n {
            return Selection::Workers(
                eligible[..n].iter().map(|c| c.servername.clone()).collect(),
            );
        }
    }

    Selection::NoMatch(format!(
        "Not enough servers to satisfy factor {factor} \
         in location '{location}' and environment '{environment}'."
    ))
}

#[derive(Clone)]
pub struct WorkerSelector {
    ledger: ExecutionLedger,
    directory: LocationDirectory,
}

impl WorkerSelector {
    pub fn new(ledger: ExecutionLedger, directory: LocationDirectory) -> Self {
        Self { ledger, directory }
    }

    /// Select the minimal set of up workers in (location, environment) that
    /// can jointly satisfy `factor`.
    pub async fn select_workers(
        &self,
        location: &str,
        environment: &str,
        factor: Factor,
    ) -> Result<Selection, RegistryError> {
        let workers = self.directory.up_workers(location, environment).await?;
        let load = self
            .ledger
            .running_load_by_worker(location, environment)
            .await?;

        let candidates = rank_candidates(&workers, &load);
        Ok(select(&candidates, factor.as_f64(), location, environment))
    }

    /// First up orchestrator entry for the pair. At most one is expected;
    /// uniqueness is not enforced, ordering makes the pick deterministic.
    pub async fn orchestrator(
        &self,
        location: &str,
        environment: &str,
    ) -> Result<Option<String>, RegistryError> {
        self.directory.orchestrator(location, environment).await
    }
}
