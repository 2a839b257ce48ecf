//! Performance test execution registry
//!
//! Capacity accounting and allocation engine behind a thin HTTP API:
//! admission of new executions against aggregate running load, run-id
//! assignment, per-worker available-capacity accounting, and minimal
//! covering-set worker selection.

pub mod admission;
pub mod api;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod params;
pub mod selector;
pub mod state;
