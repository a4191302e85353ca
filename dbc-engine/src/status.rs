//! Cluster lifecycle status vocabulary.
//!
//! The remote API reports status as a free-form string. Known values map to
//! explicit variants; anything else lands in [`ClusterStatus::Unknown`] so a
//! newer API revision never breaks parsing. There is no global transition
//! graph here: each operation declares its own pending/target sets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Status of a database cluster as reported by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClusterStatus {
    Building,
    Active,
    Updating,
    Resizing,
    Growing,
    Shrinking,
    Deleting,
    Deleted,
    /// Remote reported an explicit error state.
    Error,
    /// Status string not known to this engine.
    Unknown(String),
}

impl ClusterStatus {
    /// Wire representation used by the remote API.
    pub fn as_str(&self) -> &str {
        match self {
            ClusterStatus::Building => "BUILDING",
            ClusterStatus::Active => "CLUSTER_ACTIVE",
            ClusterStatus::Updating => "UPDATING_CLUSTER",
            ClusterStatus::Resizing => "RESIZING_CLUSTER",
            ClusterStatus::Growing => "GROWING_CLUSTER",
            ClusterStatus::Shrinking => "SHRINKING_CLUSTER",
            ClusterStatus::Deleting => "DELETING",
            ClusterStatus::Deleted => "DELETED",
            ClusterStatus::Error => "ERROR",
            ClusterStatus::Unknown(raw) => raw,
        }
    }

    /// Whether the cluster is mid-operation.
    pub fn is_transitional(&self) -> bool {
        matches!(
            self,
            ClusterStatus::Building
                | ClusterStatus::Updating
                | ClusterStatus::Resizing
                | ClusterStatus::Growing
                | ClusterStatus::Shrinking
                | ClusterStatus::Deleting
        )
    }

    /// Terminal success states a poll may finish on.
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, ClusterStatus::Active | ClusterStatus::Deleted)
    }
}

impl FromStr for ClusterStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "BUILDING" => ClusterStatus::Building,
            "CLUSTER_ACTIVE" => ClusterStatus::Active,
            "UPDATING_CLUSTER" => ClusterStatus::Updating,
            "RESIZING_CLUSTER" => ClusterStatus::Resizing,
            "GROWING_CLUSTER" => ClusterStatus::Growing,
            "SHRINKING_CLUSTER" => ClusterStatus::Shrinking,
            "DELETING" => ClusterStatus::Deleting,
            "DELETED" => ClusterStatus::Deleted,
            "ERROR" => ClusterStatus::Error,
            other => ClusterStatus::Unknown(other.to_string()),
        })
    }
}

impl From<&str> for ClusterStatus {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClusterStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClusterStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ClusterStatus::from(raw.as_str()))
    }
}

/// Pending and target status sets for a single wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub pending: Vec<ClusterStatus>,
    pub target: Vec<ClusterStatus>,
}

impl Transition {
    pub fn new(pending: &[ClusterStatus], target: &[ClusterStatus]) -> Self {
        Self {
            pending: pending.to_vec(),
            target: target.to_vec(),
        }
    }

    /// `pending` → `Active`.
    pub fn to_active(pending: &[ClusterStatus]) -> Self {
        Self::new(pending, &[ClusterStatus::Active])
    }
}

/// Render a status set for error messages, e.g. `[BUILDING, UPDATING_CLUSTER]`.
pub(crate) fn format_set(set: &[ClusterStatus]) -> String {
    let names: Vec<&str> = set.iter().map(ClusterStatus::as_str).collect();
    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_statuses() {
        assert_eq!(ClusterStatus::from("CLUSTER_ACTIVE"), ClusterStatus::Active);
        assert_eq!(ClusterStatus::from("BUILDING"), ClusterStatus::Building);
        assert_eq!(
            ClusterStatus::from("SHRINKING_CLUSTER"),
            ClusterStatus::Shrinking
        );
        assert_eq!(ClusterStatus::from("ERROR"), ClusterStatus::Error);
    }

    #[test]
    fn test_parse_unknown_status_keeps_raw_value() {
        let status = ClusterStatus::from("BACKUP");
        assert_eq!(status, ClusterStatus::Unknown("BACKUP".to_string()));
        assert_eq!(status.to_string(), "BACKUP");
        assert!(!status.is_transitional());
        assert!(!status.is_terminal_success());
    }

    #[test]
    fn test_transitional_and_terminal() {
        assert!(ClusterStatus::Resizing.is_transitional());
        assert!(ClusterStatus::Deleting.is_transitional());
        assert!(!ClusterStatus::Active.is_transitional());
        assert!(ClusterStatus::Active.is_terminal_success());
        assert!(ClusterStatus::Deleted.is_terminal_success());
        assert!(!ClusterStatus::Error.is_terminal_success());
    }

    #[test]
    fn test_serde_uses_wire_strings() {
        let json = serde_json::to_string(&ClusterStatus::Growing).unwrap();
        assert_eq!(json, "\"GROWING_CLUSTER\"");

        let parsed: ClusterStatus = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(parsed, ClusterStatus::Unknown("SOMETHING_NEW".to_string()));
    }

    #[test]
    fn test_format_set() {
        let set = [ClusterStatus::Active, ClusterStatus::Deleting];
        assert_eq!(format_set(&set), "[CLUSTER_ACTIVE, DELETING]");
    }
}
