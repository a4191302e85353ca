//! Cluster data model: desired spec, observed remote state, and the
//! provisioning payloads derived from a spec.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;
use crate::status::ClusterStatus;

/// Supported datastore engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DatastoreKind {
    #[serde(rename = "galera_mysql")]
    Galera,
    #[serde(rename = "postgresql")]
    Postgres,
}

impl DatastoreKind {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "galera_mysql" => Ok(DatastoreKind::Galera),
            "postgresql" => Ok(DatastoreKind::Postgres),
            other => Err(ValidationError::InvalidDatastore(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for DatastoreKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DatastoreKind::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Datastore engine and version. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastore {
    #[serde(rename = "type")]
    pub kind: DatastoreKind,
    pub version: String,
}

/// Primary data volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Size in GB.
    pub size: u32,
    pub volume_type: String,
}

/// Write-ahead-log volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalVolume {
    /// Size in GB.
    pub size: u32,
    pub volume_type: String,
    #[serde(default)]
    pub autoexpand: bool,
    #[serde(default)]
    pub max_disk_size: u32,
}

impl WalVolume {
    pub fn autoexpand_settings(&self) -> AutoExpand {
        AutoExpand {
            enabled: self.autoexpand,
            max_disk_size: self.max_disk_size,
        }
    }
}

/// Volume autoexpand policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoExpand {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_disk_size: u32,
}

/// A named capability with its settings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// Network attachment for each member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_ip_v4: Option<String>,
}

/// Desired state of a cluster, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    // Immutable after creation
    pub name: String,
    pub datastore: Datastore,
    #[serde(default)]
    pub networks: Vec<NetworkAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypair: Option<String>,
    #[serde(default)]
    pub floating_ip_enabled: bool,

    // Mutable
    pub flavor_id: String,
    pub cluster_size: u32,
    pub volume: Volume,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wal_volume: Option<WalVolume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoexpand: Option<AutoExpand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_id: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl ClusterSpec {
    /// Cluster-level autoexpand; absent means disabled.
    pub fn autoexpand_settings(&self) -> AutoExpand {
        self.autoexpand.unwrap_or_default()
    }

    /// Configuration id with empty strings treated as absent.
    pub fn configuration(&self) -> Option<&str> {
        non_empty(self.configuration_id.as_deref())
    }

    /// Provisioning template for one member, drawn from this spec.
    pub fn member_template(&self) -> MemberTemplate {
        MemberTemplate {
            flavor_id: self.flavor_id.clone(),
            volume: self.volume.clone(),
            networks: self.networks.clone(),
            availability_zone: self.availability_zone.clone(),
            keypair: self.keypair.clone(),
            capabilities: self.capabilities.clone(),
            wal_volume: self.wal_volume.as_ref().map(|w| MemberWalVolume {
                size: w.size,
                volume_type: w.volume_type.clone(),
                autoexpand: Some(w.autoexpand),
                max_disk_size: Some(w.max_disk_size),
            }),
        }
    }

    /// Template used when growing an existing cluster. WAL autoexpand is
    /// managed at the cluster level, so only size and type are sent.
    pub fn grow_template(&self) -> MemberTemplate {
        let mut template = self.member_template();
        template.capabilities = Vec::new();
        if let Some(wal) = template.wal_volume.as_mut() {
            wal.autoexpand = None;
            wal.max_disk_size = None;
        }
        template
    }

    /// Full create request: `cluster_size` copies of the member template.
    pub fn create_request(&self) -> CreateClusterRequest {
        let template = self.member_template();
        CreateClusterRequest {
            name: self.name.clone(),
            datastore: self.datastore.clone(),
            floating_ip_enabled: self.floating_ip_enabled,
            autoexpand: self.autoexpand_settings(),
            instances: vec![template; self.cluster_size as usize],
        }
    }
}

/// Remote state of a cluster. Produced by the remote API, never mutated
/// locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterObserved {
    pub id: String,
    pub name: String,
    pub datastore: Datastore,
    pub status: ClusterStatus,
    /// Member instance ids in the order reported by the remote API.
    pub members: Vec<String>,
    pub flavor_id: String,
    pub volume: Volume,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wal_volume: Option<WalVolume>,
    #[serde(default)]
    pub autoexpand: AutoExpand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_id: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClusterObserved {
    pub fn cluster_size(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn configuration(&self) -> Option<&str> {
        non_empty(self.configuration_id.as_deref())
    }
}

/// WAL volume as sent in member provisioning payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberWalVolume {
    pub size: u32,
    pub volume_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoexpand: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_disk_size: Option<u32>,
}

/// Provisioning options for a single cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberTemplate {
    pub flavor_id: String,
    pub volume: Volume,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keypair: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wal_volume: Option<MemberWalVolume>,
}

/// Request body for cluster creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub datastore: Datastore,
    pub floating_ip_enabled: bool,
    pub autoexpand: AutoExpand,
    pub instances: Vec<MemberTemplate>,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
