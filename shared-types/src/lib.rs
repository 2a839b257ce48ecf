//! Shared types between the registry service and its clients
//!
//! Domain records (executions, locations) and the request/response bodies
//! of the HTTP API. Serializable with serde for JSON over HTTP.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ============================================================================
// Factor
// ============================================================================

/// Fixed-point capacity fraction, stored as integer hundredths.
///
/// An execution's factor is its share of total capacity while running; a
/// worker's factor is its declared absolute capacity (not bounded by 1).
/// Hundredths keep admission arithmetic exact: `0.60 + 0.40 == 1.00` admits,
/// anything above rejects, with no float drift at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Factor(i64);

impl Factor {
    pub const ZERO: Factor = Factor(0);
    /// Full system capacity — the admission ceiling.
    pub const ONE: Factor = Factor(100);

    pub fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Parse from a plain number, rounding to the nearest hundredth.
    /// Rejects negative and non-finite values.
    pub fn try_from_f64(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err(format!("factor must be a finite number, got {value}"));
        }
        if value < 0.0 {
            return Err(format!("factor must not be negative, got {value}"));
        }
        Ok(Self((value * 100.0).round() as i64))
    }
}

impl Add for Factor {
    type Output = Factor;

    fn add(self, rhs: Factor) -> Factor {
        Factor(self.0 + rhs.0)
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

impl Serialize for Factor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Factor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Factor::try_from_f64(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Lifecycle state of an execution. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failure,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "failure" => Ok(ExecutionStatus::Failure),
            "cancelled" => Ok(ExecutionStatus::Cancelled),
            other => Err(format!("unknown execution status '{other}'")),
        }
    }
}

/// Up/down state of a worker or orchestrator entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
    Up,
    Down,
}

impl LocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationStatus::Up => "up",
            LocationStatus::Down => "down",
        }
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(LocationStatus::Up),
            "down" => Ok(LocationStatus::Down),
            other => Err(format!("unknown location status '{other}'")),
        }
    }
}

/// Role of a location entry in its (location, environment) pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Worker,
    Orchestrator,
}

impl LocationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationKind::Worker => "worker",
            LocationKind::Orchestrator => "orchestrator",
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "worker" => Ok(LocationKind::Worker),
            "orchestrator" => Ok(LocationKind::Orchestrator),
            other => Err(format!("unknown location kind '{other}'")),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One performance-test run. Append-only: created as `running`, mutated
/// exactly once more to a terminal status, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Globally unique identity, assigned at creation and never reused.
    pub id: Uuid,
    /// Human-facing run number — strictly increasing, unique across all
    /// executions ever created.
    pub run_id: i64,
    pub repo: String,
    pub lac: String,
    pub stream: String,
    pub test: String,
    /// Test category, `type` on the wire.
    #[serde(rename = "type")]
    pub kind: String,
    pub environment: String,
    pub triggered_by: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    /// Set exactly on transition to a terminal status.
    pub end_time: Option<DateTime<Utc>>,
    /// Share of total capacity consumed while running, in (0, 1].
    pub factor: Factor,
    pub dashboard_url: Option<String>,
    pub location: String,
    pub container_name: String,
    pub execution_type: String,
    /// Worker names the run is bound to; empty for non-distributed runs.
    pub workers: Vec<String>,
    pub tool: String,
    pub script_version: String,
}

/// One (location, servername, environment) entry in the location directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub location: String,
    pub servername: String,
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub environment: String,
    /// Declared absolute capacity for this server.
    pub factor: Factor,
    pub status: LocationStatus,
}

/// One row of the per-worker capacity report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCapacity {
    pub location: String,
    pub servername: String,
    pub environment: String,
    pub location_factor: Factor,
    /// Sum of load shares charged by running executions.
    pub running_sum: f64,
    /// Declared capacity minus running load.
    pub available_factor: f64,
    pub status: LocationStatus,
}

// ============================================================================
// Requests
// ============================================================================

/// Draft of a new execution, as submitted to `POST /register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub repo: String,
    pub lac: String,
    pub stream: String,
    pub test: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub environment: String,
    pub triggered_by: String,
    pub factor: Factor,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    pub location: String,
    pub container_name: String,
    pub execution_type: String,
    pub workers: Vec<String>,
    pub tool: String,
    pub script_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub run_id: i64,
    /// Terminal status to record: success, failure or cancelled.
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub run_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationCreateRequest {
    pub parameter: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationUpdateRequest {
    pub value: String,
}
