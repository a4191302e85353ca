//! Cluster lifecycle orchestration: create, read, update, delete.
//!
//! Each call computes one deadline from its configured timeout and shares it
//! across every remote call and poll it makes. Nothing is rolled back on
//! failure; the remote cluster stays as the last successful step left it.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::api::ClusterApi;
use crate::config::EngineConfig;
use crate::error::{ApiError, EngineError, Result};
use crate::executor::OperationExecutor;
use crate::model::{ClusterObserved, ClusterSpec};
use crate::planner::{self, Operation};
use crate::poller::{StateWaiter, call_until};
use crate::status::{ClusterStatus, Transition};
use crate::validation;

/// Drives a cluster through its lifecycle against a [`ClusterApi`].
pub struct ClusterLifecycle<A: ?Sized> {
    api: Arc<A>,
    config: EngineConfig,
    waiter: StateWaiter,
    executor: OperationExecutor<A>,
}

impl<A: ClusterApi + ?Sized> ClusterLifecycle<A> {
    pub fn new(api: Arc<A>, config: EngineConfig) -> Self {
        let waiter = StateWaiter::from_config(&config);
        Self {
            executor: OperationExecutor::new(Arc::clone(&api), waiter),
            api,
            config,
            waiter,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a cluster and wait for it to become active, then attach the
    /// configuration group if one is set.
    ///
    /// Failures after the create call return [`EngineError::CreateIncomplete`]
    /// carrying the cluster id; the cluster itself is not deleted.
    pub async fn create(&self, spec: &ClusterSpec) -> Result<(String, ClusterObserved)> {
        validation::validate_create(spec)?;
        let deadline = Instant::now() + self.config.create_timeout;

        let request = spec.create_request();
        info!(
            "Creating cluster {} ({} members, flavor {})",
            spec.name,
            request.instances.len(),
            spec.flavor_id
        );
        let cluster_id =
            call_until("create_cluster", deadline, self.api.create_cluster(&request)).await?;

        info!("Waiting for cluster {} to become available", cluster_id);
        let observed = self
            .finish_create(spec, &cluster_id, deadline)
            .await
            .map_err(|e| {
                warn!("Cluster {} created but not ready: {}", cluster_id, e);
                EngineError::CreateIncomplete {
                    cluster_id: cluster_id.clone(),
                    source: Box::new(e),
                }
            })?;

        info!("Cluster {} is active", cluster_id);
        Ok((cluster_id, observed))
    }

    async fn finish_create(
        &self,
        spec: &ClusterSpec,
        cluster_id: &str,
        deadline: Instant,
    ) -> Result<ClusterObserved> {
        let mut observed = self
            .executor
            .wait(
                cluster_id,
                &Transition::to_active(&[ClusterStatus::Building]),
                deadline,
            )
            .await?;

        if let Some(configuration_id) = spec.configuration() {
            info!(
                "Attaching configuration {} to cluster {}",
                configuration_id, cluster_id
            );
            let attach = Operation::AttachConfiguration {
                configuration_id: configuration_id.to_string(),
            };
            observed = self.executor.execute(&attach, cluster_id, deadline).await?;
        }

        Ok(observed)
    }

    /// Fetch the current remote state. `None` means the cluster is gone and
    /// the caller should drop its record.
    pub async fn read(&self, cluster_id: &str) -> Result<Option<ClusterObserved>> {
        match self.api.get_cluster(cluster_id).await {
            Ok(observed) => Ok(Some(observed)),
            Err(ApiError::NotFound(_)) => {
                info!("Cluster {} no longer exists", cluster_id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Converge the cluster to `spec`: re-fetch, plan, execute the plan in
    /// order, then read back the converged state.
    pub async fn update(&self, cluster_id: &str, spec: &ClusterSpec) -> Result<ClusterObserved> {
        let deadline = Instant::now() + self.config.update_timeout();

        let observed =
            call_until("get_cluster", deadline, self.api.get_cluster(cluster_id)).await?;
        let plan = planner::plan(spec, &observed)?;

        if plan.is_empty() {
            info!("Cluster {} is up to date", cluster_id);
            return Ok(observed);
        }
        info!(
            "Cluster {}: executing {} operations {:?}",
            cluster_id,
            plan.len(),
            plan.summary()
        );

        self.executor.run(&plan, cluster_id, deadline).await?;

        call_until("get_cluster", deadline, self.api.get_cluster(cluster_id)).await
    }

    /// Delete the cluster and wait until it is gone. Deleting a cluster that
    /// no longer exists succeeds.
    pub async fn delete(&self, cluster_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.delete_timeout;

        info!("Deleting cluster {}", cluster_id);
        let deleted =
            call_until("delete_cluster", deadline, self.api.delete_cluster(cluster_id)).await;
        match deleted {
            Ok(()) => {}
            Err(EngineError::NotFound(_)) => {
                info!("Cluster {} already deleted", cluster_id);
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let transition = Transition::new(
            &[ClusterStatus::Active, ClusterStatus::Deleting],
            &[ClusterStatus::Deleted],
        );
        let api = &*self.api;
        self.waiter
            .wait(&transition, deadline, move || async move {
                match api.get_cluster(cluster_id).await {
                    Ok(cluster) => Ok(((), cluster.status)),
                    Err(ApiError::NotFound(_)) => Ok(((), ClusterStatus::Deleted)),
                    Err(e) => Err(EngineError::from(e)),
                }
            })
            .await?;

        info!("Cluster {} deleted", cluster_id);
        Ok(())
    }
}
