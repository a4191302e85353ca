//! Shared test utilities for dbc-engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dbc_engine::api::{ClusterAction, ClusterUpdate};
use dbc_engine::model::{
    CreateClusterRequest, Datastore, DatastoreKind, NetworkAttachment, Volume, WalVolume,
};
use dbc_engine::{
    ApiError, ClusterApi, ClusterLifecycle, ClusterObserved, ClusterSpec, ClusterStatus,
    EngineConfig, SimulatedCloud,
};

pub const CLUSTER_ID: &str = "cluster-1";

/// Engine config with short, deterministic timings.
pub fn config() -> EngineConfig {
    EngineConfig::default()
        .with_poll_interval(Duration::from_secs(1))
        .with_min_poll_interval(Duration::ZERO)
        .with_create_timeout(Duration::from_secs(600))
        .with_delete_timeout(Duration::from_secs(600))
}

pub fn spec() -> ClusterSpec {
    ClusterSpec {
        name: "orders-db".to_string(),
        datastore: Datastore {
            kind: DatastoreKind::Postgres,
            version: "13".to_string(),
        },
        networks: vec![NetworkAttachment {
            uuid: Some("net-1".to_string()),
            ..Default::default()
        }],
        availability_zone: Some("ms1".to_string()),
        keypair: None,
        floating_ip_enabled: false,
        flavor_id: "flavor-small".to_string(),
        cluster_size: 3,
        volume: Volume {
            size: 10,
            volume_type: "ceph-ssd".to_string(),
        },
        wal_volume: Some(WalVolume {
            size: 5,
            volume_type: "ceph-ssd".to_string(),
            autoexpand: false,
            max_disk_size: 0,
        }),
        autoexpand: None,
        configuration_id: None,
        capabilities: vec![],
    }
}

/// Active cluster matching [`spec`].
pub fn observed() -> ClusterObserved {
    let spec = spec();
    let now = Utc::now();
    ClusterObserved {
        id: CLUSTER_ID.to_string(),
        name: spec.name,
        datastore: spec.datastore,
        status: ClusterStatus::Active,
        members: vec!["m-1".to_string(), "m-2".to_string(), "m-3".to_string()],
        flavor_id: spec.flavor_id,
        volume: spec.volume,
        wal_volume: spec.wal_volume,
        autoexpand: Default::default(),
        configuration_id: None,
        capabilities: vec![],
        created_at: now,
        updated_at: now,
    }
}

/// Simulated cloud seeded with [`observed`], settling after `settle_polls`.
pub async fn seeded_sim(settle_polls: u32) -> Arc<SimulatedCloud> {
    let sim = Arc::new(SimulatedCloud::new(settle_polls));
    sim.insert(observed()).await;
    sim
}

pub fn lifecycle<A: ClusterApi + ?Sized>(api: Arc<A>) -> ClusterLifecycle<A> {
    ClusterLifecycle::new(api, config())
}

/// API whose cluster is already gone: every fetch is not-found. The delete
/// call outcome is configurable. Records calls by name.
pub struct GoneApi {
    pub delete_result: Result<(), ApiError>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl GoneApi {
    pub fn new(delete_result: Result<(), ApiError>) -> Self {
        Self {
            delete_result,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl ClusterApi for GoneApi {
    async fn create_cluster(&self, _req: &CreateClusterRequest) -> Result<String, ApiError> {
        self.record("create");
        Err(ApiError::Unavailable("create not supported".to_string()))
    }

    async fn get_cluster(&self, id: &str) -> Result<ClusterObserved, ApiError> {
        self.record("get");
        Err(ApiError::NotFound(format!("cluster {}", id)))
    }

    async fn cluster_action(&self, _id: &str, _action: &ClusterAction) -> Result<(), ApiError> {
        self.record("action");
        Err(ApiError::NotFound("cluster".to_string()))
    }

    async fn update_cluster(&self, _id: &str, _update: &ClusterUpdate) -> Result<(), ApiError> {
        self.record("update");
        Err(ApiError::NotFound("cluster".to_string()))
    }

    async fn delete_cluster(&self, _id: &str) -> Result<(), ApiError> {
        self.record("delete");
        self.delete_result.clone()
    }
}
