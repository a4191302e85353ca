//! Diff planner - turns desired vs observed cluster state into an ordered
//! list of remote operations.
//!
//! Planning is pure: no remote calls. Operation order is fixed:
//! configuration, volume, flavor, autoexpand, WAL volume, capabilities,
//! cluster size. The remote side rejects e.g. a flavor resize on an
//! undersized volume, so this order must hold.

use serde::Serialize;

use crate::api::{
    ApplyCapability, Autoresize, ClusterAction, ClusterUpdate, ClusterUpdateBody,
    ConfigurationRef, Resize, ShrinkMember, VolumeResize, WalAutoresize,
};
use crate::error::ValidationError;
use crate::model::{AutoExpand, Capability, ClusterObserved, ClusterSpec, MemberTemplate};
use crate::status::{ClusterStatus, Transition};

/// A single remote mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    AttachConfiguration { configuration_id: String },
    DetachConfiguration { configuration_id: String },
    ResizeVolume { size: u32 },
    ResizeWalVolume { size: u32 },
    ResizeFlavor { flavor_id: String },
    UpdateAutoexpand { settings: AutoExpand },
    UpdateWalAutoexpand { settings: AutoExpand },
    ApplyCapabilities { capabilities: Vec<Capability> },
    GrowCluster { members: Vec<MemberTemplate> },
    ShrinkCluster { member_ids: Vec<String> },
}

/// How an operation reaches the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Action(ClusterAction),
    Update(ClusterUpdate),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AttachConfiguration { .. } => "attach_configuration",
            Operation::DetachConfiguration { .. } => "detach_configuration",
            Operation::ResizeVolume { .. } => "resize_volume",
            Operation::ResizeWalVolume { .. } => "resize_wal_volume",
            Operation::ResizeFlavor { .. } => "resize_flavor",
            Operation::UpdateAutoexpand { .. } => "update_autoexpand",
            Operation::UpdateWalAutoexpand { .. } => "update_wal_autoexpand",
            Operation::ApplyCapabilities { .. } => "apply_capabilities",
            Operation::GrowCluster { .. } => "grow_cluster",
            Operation::ShrinkCluster { .. } => "shrink_cluster",
        }
    }

    /// Statuses to wait through after the mutation is accepted.
    pub fn transition(&self) -> Transition {
        use ClusterStatus::*;
        match self {
            Operation::AttachConfiguration { .. } | Operation::DetachConfiguration { .. } => {
                Transition::to_active(&[Updating, Building])
            }
            Operation::ResizeVolume { .. }
            | Operation::ResizeWalVolume { .. }
            | Operation::ResizeFlavor { .. } => Transition::to_active(&[Resizing]),
            Operation::UpdateAutoexpand { .. }
            | Operation::UpdateWalAutoexpand { .. }
            | Operation::ApplyCapabilities { .. } => Transition::to_active(&[Updating]),
            Operation::GrowCluster { .. } => Transition::to_active(&[Growing]),
            Operation::ShrinkCluster { .. } => Transition::to_active(&[Shrinking]),
        }
    }

    /// Remote request body for this operation.
    pub fn remote_call(&self) -> RemoteCall {
        match self {
            Operation::AttachConfiguration { configuration_id } => RemoteCall::Action(
                ClusterAction::ConfigurationAttach(ConfigurationRef {
                    configuration_id: configuration_id.clone(),
                }),
            ),
            Operation::DetachConfiguration { configuration_id } => RemoteCall::Action(
                ClusterAction::ConfigurationDetach(ConfigurationRef {
                    configuration_id: configuration_id.clone(),
                }),
            ),
            Operation::ResizeVolume { size } => {
                RemoteCall::Action(ClusterAction::Resize(Resize::Volume {
                    volume: VolumeResize {
                        size: *size,
                        kind: None,
                    },
                }))
            }
            Operation::ResizeWalVolume { size } => {
                RemoteCall::Action(ClusterAction::Resize(Resize::Volume {
                    volume: VolumeResize {
                        size: *size,
                        kind: Some("wal".to_string()),
                    },
                }))
            }
            Operation::ResizeFlavor { flavor_id } => {
                RemoteCall::Action(ClusterAction::Resize(Resize::Flavor {
                    flavor_ref: flavor_id.clone(),
                }))
            }
            Operation::UpdateAutoexpand { settings } => RemoteCall::Update(ClusterUpdate {
                cluster: ClusterUpdateBody::Volume(Autoresize::new(
                    settings.enabled,
                    settings.max_disk_size,
                )),
            }),
            Operation::UpdateWalAutoexpand { settings } => RemoteCall::Update(ClusterUpdate {
                cluster: ClusterUpdateBody::Wal(WalAutoresize {
                    wal_volume: Autoresize::new(settings.enabled, settings.max_disk_size),
                }),
            }),
            Operation::ApplyCapabilities { capabilities } => {
                RemoteCall::Action(ClusterAction::ApplyCapability(ApplyCapability {
                    capabilities: capabilities.clone(),
                }))
            }
            Operation::GrowCluster { members } => {
                RemoteCall::Action(ClusterAction::Grow(members.clone()))
            }
            Operation::ShrinkCluster { member_ids } => RemoteCall::Action(ClusterAction::Shrink(
                member_ids
                    .iter()
                    .map(|id| ShrinkMember { id: id.clone() })
                    .collect(),
            )),
        }
    }
}

/// Ordered operations converging observed state to the desired spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Plan {
    operations: Vec<Operation>,
}

impl Plan {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Operation names in order, for logging.
    pub fn summary(&self) -> Vec<&'static str> {
        self.operations.iter().map(Operation::name).collect()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Operation;
    type IntoIter = std::slice::Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}

/// Compute the plan that takes `observed` to `spec`.
///
/// Rejections happen before any operation is emitted, so an error never
/// comes with a partial plan.
pub fn plan(spec: &ClusterSpec, observed: &ClusterObserved) -> Result<Plan, ValidationError> {
    validate_update(spec, observed)?;

    let mut ops = Vec::new();

    // Configuration
    if spec.configuration() != observed.configuration() {
        if let Some(old) = observed.configuration() {
            ops.push(Operation::DetachConfiguration {
                configuration_id: old.to_string(),
            });
        }
        if let Some(new) = spec.configuration() {
            ops.push(Operation::AttachConfiguration {
                configuration_id: new.to_string(),
            });
        }
    }

    // Volume
    if spec.volume.size != observed.volume.size {
        ops.push(Operation::ResizeVolume {
            size: spec.volume.size,
        });
    }

    // Flavor
    if spec.flavor_id != observed.flavor_id {
        ops.push(Operation::ResizeFlavor {
            flavor_id: spec.flavor_id.clone(),
        });
    }

    // Autoexpand
    let autoexpand = spec.autoexpand_settings();
    if autoexpand != observed.autoexpand {
        ops.push(Operation::UpdateAutoexpand {
            settings: autoexpand,
        });
    }

    // WAL volume
    if let (Some(desired), Some(current)) = (&spec.wal_volume, &observed.wal_volume) {
        if desired.size != current.size {
            ops.push(Operation::ResizeWalVolume { size: desired.size });
        }
        let settings = desired.autoexpand_settings();
        if settings != current.autoexpand_settings() {
            ops.push(Operation::UpdateWalAutoexpand { settings });
        }
    }

    // Capabilities
    if !same_capabilities(&spec.capabilities, &observed.capabilities) {
        ops.push(Operation::ApplyCapabilities {
            capabilities: spec.capabilities.clone(),
        });
    }

    // Cluster size
    let current = observed.cluster_size();
    if spec.cluster_size > current {
        let count = (spec.cluster_size - current) as usize;
        ops.push(Operation::GrowCluster {
            members: vec![spec.grow_template(); count],
        });
    } else if spec.cluster_size < current {
        let keep = spec.cluster_size as usize;
        ops.push(Operation::ShrinkCluster {
            member_ids: observed.members[keep..].to_vec(),
        });
    }

    Ok(Plan { operations: ops })
}

/// Capability lists are sets; the remote may report them in any order.
fn same_capabilities(a: &[Capability], b: &[Capability]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&Capability> = a.iter().collect();
    let mut b: Vec<&Capability> = b.iter().collect();
    a.sort();
    b.sort();
    a == b
}

fn validate_update(spec: &ClusterSpec, observed: &ClusterObserved) -> Result<(), ValidationError> {
    if spec.cluster_size == 0 {
        return Err(ValidationError::InvalidClusterSize(0));
    }

    if spec.volume.size < observed.volume.size {
        return Err(ValidationError::VolumeShrink {
            current: observed.volume.size,
            new: spec.volume.size,
        });
    }

    match (&spec.wal_volume, &observed.wal_volume) {
        (Some(_), None) => Err(ValidationError::WalVolumeAdded),
        (None, Some(_)) => Err(ValidationError::WalVolumeRemoved),
        (Some(desired), Some(current)) if desired.size < current.size => {
            Err(ValidationError::WalVolumeShrink {
                current: current.size,
                new: desired.size,
            })
        }
        _ => Ok(()),
    }
}
