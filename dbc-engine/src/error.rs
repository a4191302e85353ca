//! Engine error types.

use std::time::Duration;

use thiserror::Error;

use crate::status::{ClusterStatus, format_set};

/// Errors returned by the remote API collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote refused the request because of the resource's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success response.
    #[error("request failed with status {code}: {message}")]
    Request { code: u16, message: String },

    /// Remote could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Local rejections, raised before any remote call is issued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("the new volume size {new} must be larger than the current volume size of {current}")]
    VolumeShrink { current: u32, new: u32 },

    #[error(
        "the new wal volume size {new} must be larger than the current volume size of {current}"
    )]
    WalVolumeShrink { current: u32, new: u32 },

    #[error("wal volume cannot be added to an existing cluster")]
    WalVolumeAdded,

    #[error("wal volume cannot be removed from an existing cluster")]
    WalVolumeRemoved,

    #[error("cluster size must be at least 1, got {0}")]
    InvalidClusterSize(u32),

    #[error("{0} size must be greater than zero")]
    ZeroVolumeSize(&'static str),

    #[error("invalid availability zone: {0:?}")]
    InvalidAvailabilityZone(String),

    #[error("datastore type must be one of [galera_mysql, postgresql], got: {0}")]
    InvalidDatastore(String),

    #[error("exactly one of {fields} must be set, got {given}")]
    TemplateIdentifier { fields: &'static str, given: usize },
}

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("remote call failed: {0}")]
    Transport(ApiError),

    #[error(
        "unexpected state '{status}', wanted target {}, pending {}",
        format_set(.target),
        format_set(.pending)
    )]
    UnexpectedState {
        status: ClusterStatus,
        pending: Vec<ClusterStatus>,
        target: Vec<ClusterStatus>,
    },

    #[error("timeout while waiting for state to become {} (last state: {}, waited {waited:?})", format_set(.target), last_state(.last))]
    Timeout {
        last: Option<ClusterStatus>,
        target: Vec<ClusterStatus>,
        waited: Duration,
    },

    /// A single remote call did not complete before the deadline, or was
    /// not started because the deadline had already passed.
    #[error("remote call {call} did not complete before the deadline (waited {waited:?})")]
    CallTimeout { call: String, waited: Duration },

    #[error("resource not found: {0}")]
    NotFound(String),

    /// The cluster was allocated but a later create step failed. The cluster
    /// is left in place under `cluster_id`.
    #[error("cluster {cluster_id} was created but is not ready: {source}")]
    CreateIncomplete {
        cluster_id: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error(
        "operation {index} ({operation}) failed, {committed} operations committed out of {total}: {source}"
    )]
    PlanAborted {
        index: usize,
        operation: String,
        committed: usize,
        total: usize,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Number of plan operations that completed before this error, if the
    /// error came from a multi-step plan.
    pub fn committed(&self) -> Option<usize> {
        match self {
            EngineError::PlanAborted { committed, .. } => Some(*committed),
            _ => None,
        }
    }

    /// Identifier of a cluster left allocated by a failed create.
    pub fn allocated_cluster(&self) -> Option<&str> {
        match self {
            EngineError::CreateIncomplete { cluster_id, .. } => Some(cluster_id),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

impl From<ApiError> for EngineError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(what) => EngineError::NotFound(what),
            other => EngineError::Transport(other),
        }
    }
}

fn last_state(last: &Option<ClusterStatus>) -> &str {
    last.as_ref().map(ClusterStatus::as_str).unwrap_or("none")
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
