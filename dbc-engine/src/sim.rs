//! In-memory simulated control plane.
//!
//! Mutations are accepted immediately and applied to the stored cluster, but
//! the reported status stays transitional for a configurable number of
//! status fetches before settling. A deleted cluster reports `DELETED` once
//! and then disappears.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::api::{ClusterAction, ClusterApi, ClusterUpdate, ClusterUpdateBody, Resize, TemplateApi};
use crate::error::ApiError;
use crate::model::{ClusterObserved, CreateClusterRequest, WalVolume};
use crate::status::ClusterStatus;
use crate::template::ClusterTemplate;

type ApiResult<T> = Result<T, ApiError>;

struct SimCluster {
    observed: ClusterObserved,
    /// Fetches left before the transitional status settles.
    polls_left: u32,
    settles_to: ClusterStatus,
}

#[derive(Default)]
struct SimState {
    clusters: HashMap<String, SimCluster>,
    templates: Vec<ClusterTemplate>,
    fail_next: Option<ApiError>,
    mutations: Vec<String>,
}

/// Simulated remote database API.
pub struct SimulatedCloud {
    settle_polls: u32,
    state: Mutex<SimState>,
}

impl SimulatedCloud {
    /// `settle_polls` is the number of fetches a cluster stays in a
    /// transitional status after each mutation.
    pub fn new(settle_polls: u32) -> Self {
        Self {
            settle_polls,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn with_templates(mut self, templates: Vec<ClusterTemplate>) -> Self {
        self.state.get_mut().templates = templates;
        self
    }

    /// Seed an existing cluster in its reported status.
    pub async fn insert(&self, observed: ClusterObserved) {
        let settles_to = observed.status.clone();
        let mut state = self.state.lock().await;
        state.clusters.insert(
            observed.id.clone(),
            SimCluster {
                observed,
                polls_left: 0,
                settles_to,
            },
        );
    }

    /// Drop a cluster out-of-band.
    pub async fn remove(&self, id: &str) {
        self.state.lock().await.clusters.remove(id);
    }

    /// Make the next action or update call fail with `err`.
    pub async fn fail_next_mutation(&self, err: ApiError) {
        self.state.lock().await.fail_next = Some(err);
    }

    /// Names of all mutations accepted so far, in order.
    pub async fn mutations(&self) -> Vec<String> {
        self.state.lock().await.mutations.clone()
    }

    fn begin(&self, cluster: &mut SimCluster, status: ClusterStatus, settles_to: ClusterStatus) {
        cluster.observed.updated_at = Utc::now();
        cluster.polls_left = self.settle_polls;
        if self.settle_polls == 0 {
            cluster.observed.status = settles_to.clone();
        } else {
            cluster.observed.status = status;
        }
        cluster.settles_to = settles_to;
    }
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Lock the cluster for a mutation: it must exist and be idle.
fn idle_cluster<'a>(state: &'a mut SimState, id: &str) -> ApiResult<&'a mut SimCluster> {
    if let Some(err) = state.fail_next.take() {
        return Err(err);
    }
    let cluster = state
        .clusters
        .get_mut(id)
        .ok_or_else(|| ApiError::NotFound(format!("cluster {}", id)))?;
    if cluster.observed.status != ClusterStatus::Active {
        return Err(ApiError::Conflict(format!(
            "cluster {} is {}",
            id, cluster.observed.status
        )));
    }
    Ok(cluster)
}

fn bad_request(message: String) -> ApiError {
    ApiError::Request { code: 400, message }
}

#[async_trait]
impl ClusterApi for SimulatedCloud {
    async fn create_cluster(&self, req: &CreateClusterRequest) -> ApiResult<String> {
        let first = req
            .instances
            .first()
            .ok_or_else(|| bad_request("cluster needs at least one instance".to_string()))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let observed = ClusterObserved {
            id: id.clone(),
            name: req.name.clone(),
            datastore: req.datastore.clone(),
            status: ClusterStatus::Building,
            members: req
                .instances
                .iter()
                .map(|_| uuid::Uuid::new_v4().to_string())
                .collect(),
            flavor_id: first.flavor_id.clone(),
            volume: first.volume.clone(),
            wal_volume: first.wal_volume.as_ref().map(|w| WalVolume {
                size: w.size,
                volume_type: w.volume_type.clone(),
                autoexpand: w.autoexpand.unwrap_or(false),
                max_disk_size: w.max_disk_size.unwrap_or(0),
            }),
            autoexpand: req.autoexpand,
            configuration_id: None,
            capabilities: first.capabilities.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut cluster = SimCluster {
            observed,
            polls_left: 0,
            settles_to: ClusterStatus::Active,
        };
        self.begin(&mut cluster, ClusterStatus::Building, ClusterStatus::Active);

        let mut state = self.state.lock().await;
        state.mutations.push("create".to_string());
        state.clusters.insert(id.clone(), cluster);
        debug!("Simulated create of cluster {}", id);
        Ok(id)
    }

    async fn get_cluster(&self, id: &str) -> ApiResult<ClusterObserved> {
        let mut state = self.state.lock().await;
        let cluster = state
            .clusters
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("cluster {}", id)))?;

        if cluster.polls_left > 0 {
            cluster.polls_left -= 1;
        } else {
            cluster.observed.status = cluster.settles_to.clone();
        }

        let observed = cluster.observed.clone();
        if observed.status == ClusterStatus::Deleted {
            state.clusters.remove(id);
        }
        Ok(observed)
    }

    async fn cluster_action(&self, id: &str, action: &ClusterAction) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        let cluster = idle_cluster(&mut state, id)?;
        let c = &mut cluster.observed;

        let (name, status) = match action {
            ClusterAction::ConfigurationAttach(cfg) => {
                c.configuration_id = Some(cfg.configuration_id.clone());
                ("configuration_attach", ClusterStatus::Updating)
            }
            ClusterAction::ConfigurationDetach(cfg) => {
                if c.configuration_id.as_deref() != Some(cfg.configuration_id.as_str()) {
                    return Err(bad_request(format!(
                        "configuration {} is not attached",
                        cfg.configuration_id
                    )));
                }
                c.configuration_id = None;
                ("configuration_detach", ClusterStatus::Updating)
            }
            ClusterAction::Resize(Resize::Volume { volume }) => {
                let current = match volume.kind.as_deref() {
                    Some("wal") => match c.wal_volume.as_mut() {
                        Some(wal) => &mut wal.size,
                        None => return Err(bad_request("cluster has no wal volume".to_string())),
                    },
                    _ => &mut c.volume.size,
                };
                if volume.size < *current {
                    return Err(bad_request("volume cannot shrink".to_string()));
                }
                *current = volume.size;
                ("resize_volume", ClusterStatus::Resizing)
            }
            ClusterAction::Resize(Resize::Flavor { flavor_ref }) => {
                c.flavor_id = flavor_ref.clone();
                ("resize_flavor", ClusterStatus::Resizing)
            }
            ClusterAction::ApplyCapability(apply) => {
                c.capabilities = apply.capabilities.clone();
                ("apply_capability", ClusterStatus::Updating)
            }
            ClusterAction::Grow(members) => {
                c.members
                    .extend(members.iter().map(|_| uuid::Uuid::new_v4().to_string()));
                ("grow", ClusterStatus::Growing)
            }
            ClusterAction::Shrink(members) => {
                for m in members {
                    if !c.members.contains(&m.id) {
                        return Err(bad_request(format!("unknown instance {}", m.id)));
                    }
                }
                c.members.retain(|id| !members.iter().any(|m| &m.id == id));
                ("shrink", ClusterStatus::Shrinking)
            }
        };

        self.begin(cluster, status, ClusterStatus::Active);
        state.mutations.push(name.to_string());
        Ok(())
    }

    async fn update_cluster(&self, id: &str, update: &ClusterUpdate) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        let cluster = idle_cluster(&mut state, id)?;
        let c = &mut cluster.observed;

        let name = match update.cluster {
            ClusterUpdateBody::Volume(settings) => {
                c.autoexpand.enabled = settings.volume_autoresize_enabled == 1;
                c.autoexpand.max_disk_size = settings.volume_autoresize_max_size;
                "update_autoexpand"
            }
            ClusterUpdateBody::Wal(settings) => {
                let wal = c
                    .wal_volume
                    .as_mut()
                    .ok_or_else(|| bad_request("cluster has no wal volume".to_string()))?;
                wal.autoexpand = settings.wal_volume.volume_autoresize_enabled == 1;
                wal.max_disk_size = settings.wal_volume.volume_autoresize_max_size;
                "update_wal_autoexpand"
            }
        };

        self.begin(cluster, ClusterStatus::Updating, ClusterStatus::Active);
        state.mutations.push(name.to_string());
        Ok(())
    }

    async fn delete_cluster(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        let cluster = state
            .clusters
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("cluster {}", id)))?;

        self.begin(cluster, ClusterStatus::Deleting, ClusterStatus::Deleted);
        state.mutations.push("delete".to_string());
        Ok(())
    }
}

#[async_trait]
impl TemplateApi for SimulatedCloud {
    async fn get_cluster_template(&self, identifier: &str) -> ApiResult<ClusterTemplate> {
        let state = self.state.lock().await;
        state
            .templates
            .iter()
            .find(|t| t.uuid == identifier || t.name == identifier || t.version == identifier)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("cluster template {}", identifier)))
    }
}
