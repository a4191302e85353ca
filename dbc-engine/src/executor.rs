//! Operation executor - issues one remote mutation per planned operation and
//! waits for the cluster to settle before moving on.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::api::ClusterApi;
use crate::error::{EngineError, Result};
use crate::model::ClusterObserved;
use crate::planner::{Operation, Plan, RemoteCall};
use crate::poller::{StateWaiter, call_until};
use crate::status::Transition;

/// Runs operations against a cluster, one at a time.
pub struct OperationExecutor<A: ?Sized> {
    api: Arc<A>,
    waiter: StateWaiter,
}

impl<A: ClusterApi + ?Sized> OperationExecutor<A> {
    pub fn new(api: Arc<A>, waiter: StateWaiter) -> Self {
        Self { api, waiter }
    }

    /// Issue `op` and wait for its transition to complete.
    ///
    /// A rejected mutation returns immediately without polling; the cluster
    /// stays in whatever state the last successful step left it.
    pub async fn execute(
        &self,
        op: &Operation,
        cluster_id: &str,
        deadline: Instant,
    ) -> Result<ClusterObserved> {
        info!("Issuing {} on cluster {}", op.name(), cluster_id);

        let call = async {
            match op.remote_call() {
                RemoteCall::Action(action) => self.api.cluster_action(cluster_id, &action).await,
                RemoteCall::Update(update) => self.api.update_cluster(cluster_id, &update).await,
            }
        };
        call_until(op.name(), deadline, call).await?;

        self.wait(cluster_id, &op.transition(), deadline).await
    }

    /// Execute every operation of `plan` in order, stopping at the first
    /// failure. Returns the observation after the last operation, or `None`
    /// for an empty plan.
    ///
    /// Nothing is rolled back on failure. The error records how many
    /// operations had already been committed.
    pub async fn run(
        &self,
        plan: &Plan,
        cluster_id: &str,
        deadline: Instant,
    ) -> Result<Option<ClusterObserved>> {
        let total = plan.len();
        let mut last = None;

        for (index, op) in plan.iter().enumerate() {
            match self.execute(op, cluster_id, deadline).await {
                Ok(observed) => {
                    info!(
                        "Cluster {}: {} complete ({}/{})",
                        cluster_id,
                        op.name(),
                        index + 1,
                        total
                    );
                    last = Some(observed);
                }
                Err(e) => {
                    warn!(
                        "Cluster {}: {} failed after {} of {} operations: {}",
                        cluster_id,
                        op.name(),
                        index,
                        total,
                        e
                    );
                    return Err(EngineError::PlanAborted {
                        index,
                        operation: op.name().to_string(),
                        committed: index,
                        total,
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(last)
    }

    /// Poll the cluster until `transition` completes.
    pub async fn wait(
        &self,
        cluster_id: &str,
        transition: &Transition,
        deadline: Instant,
    ) -> Result<ClusterObserved> {
        let api = &*self.api;
        self.waiter
            .wait(transition, deadline, move || async move {
                let cluster = api
                    .get_cluster(cluster_id)
                    .await
                    .map_err(EngineError::from)?;
                let status = cluster.status.clone();
                Ok::<_, EngineError>((cluster, status))
            })
            .await
    }
}
