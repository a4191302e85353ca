//! Interface to the remote database control plane.
//!
//! The engine never talks HTTP itself. A transport implements these traits
//! and the engine drives it. Payload types serialize to the bodies the
//! remote API expects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::model::{Capability, ClusterObserved, CreateClusterRequest, MemberTemplate};
use crate::template::ClusterTemplate;

/// Cluster endpoints of the remote API.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create a cluster, returning its identifier.
    async fn create_cluster(&self, req: &CreateClusterRequest) -> Result<String, ApiError>;

    /// Fetch the current remote state.
    async fn get_cluster(&self, id: &str) -> Result<ClusterObserved, ApiError>;

    /// POST to the cluster's action endpoint.
    async fn cluster_action(&self, id: &str, action: &ClusterAction) -> Result<(), ApiError>;

    /// PATCH the cluster's autoresize settings.
    async fn update_cluster(&self, id: &str, update: &ClusterUpdate) -> Result<(), ApiError>;

    /// Delete the cluster.
    async fn delete_cluster(&self, id: &str) -> Result<(), ApiError>;
}

/// Cluster template endpoints of the remote API.
#[async_trait]
pub trait TemplateApi: Send + Sync {
    /// Fetch a template by name, version or uuid.
    async fn get_cluster_template(&self, identifier: &str) -> Result<ClusterTemplate, ApiError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRef {
    pub configuration_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeResize {
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resize {
    Volume { volume: VolumeResize },
    Flavor {
        #[serde(rename = "flavorRef")]
        flavor_ref: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyCapability {
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrinkMember {
    pub id: String,
}

/// Body for the cluster action endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterAction {
    ConfigurationAttach(ConfigurationRef),
    ConfigurationDetach(ConfigurationRef),
    Resize(Resize),
    ApplyCapability(ApplyCapability),
    Grow(Vec<MemberTemplate>),
    Shrink(Vec<ShrinkMember>),
}

/// Autoresize settings as the remote API encodes them (flag is 0/1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autoresize {
    pub volume_autoresize_enabled: u8,
    pub volume_autoresize_max_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalAutoresize {
    pub wal_volume: Autoresize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterUpdateBody {
    Volume(Autoresize),
    Wal(WalAutoresize),
}

/// Body for the cluster PATCH endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterUpdate {
    pub cluster: ClusterUpdateBody,
}

impl Autoresize {
    pub fn new(enabled: bool, max_size: u32) -> Self {
        Self {
            volume_autoresize_enabled: u8::from(enabled),
            volume_autoresize_max_size: max_size,
        }
    }
}
