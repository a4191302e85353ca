//! End-to-end lifecycle tests against the simulated control plane.

mod common;

use std::sync::Arc;
use std::time::Duration;

use dbc_engine::model::AutoExpand;
use dbc_engine::{
    ApiError, ClusterLifecycle, ClusterStatus, EngineError, ValidationError, plan,
};
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use common::{CLUSTER_ID, GoneApi, lifecycle, observed, seeded_sim, spec};

#[tokio::test(start_paused = true)]
async fn test_create_waits_for_active_and_attaches_configuration() {
    let sim = Arc::new(dbc_engine::SimulatedCloud::new(2));
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.configuration_id = Some("cfg-1".to_string());

    let start = Instant::now();
    let (id, cluster) = engine.create(&desired).await.unwrap();

    assert_eq!(cluster.id, id);
    assert_eq!(cluster.status, ClusterStatus::Active);
    assert_eq!(cluster.configuration_id.as_deref(), Some("cfg-1"));
    assert_eq!(cluster.cluster_size(), 3);
    assert_eq!(
        sim.mutations().await,
        vec!["create".to_string(), "configuration_attach".to_string()]
    );
    // Two transitional polls after create and two after the attach.
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_create_rejects_invalid_spec_before_remote_call() {
    let sim = Arc::new(dbc_engine::SimulatedCloud::new(0));
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.availability_zone = Some("nowhere".to_string());

    let err = engine.create(&desired).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::InvalidAvailabilityZone(_))
    ));
    assert!(sim.mutations().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_attach_failure_keeps_cluster() {
    let sim = Arc::new(dbc_engine::SimulatedCloud::new(1));
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.configuration_id = Some("cfg-1".to_string());
    sim.fail_next_mutation(ApiError::Request {
        code: 400,
        message: "configuration group not found".to_string(),
    })
    .await;

    let err = engine.create(&desired).await.unwrap_err();
    let id = err.allocated_cluster().map(str::to_string).unwrap();
    assert!(err.to_string().contains("configuration group not found"));

    // Not rolled back: the cluster is still there, without the configuration.
    let cluster = engine.read(&id).await.unwrap().unwrap();
    assert_eq!(cluster.status, ClusterStatus::Active);
    assert_eq!(cluster.configuration_id, None);
    assert_eq!(sim.mutations().await, vec!["create".to_string()]);
}

#[tokio::test]
async fn test_read_absent_cluster_returns_none() {
    let sim = Arc::new(dbc_engine::SimulatedCloud::new(0));
    let engine = lifecycle(sim);

    assert!(engine.read("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_read_surfaces_transport_errors() {
    struct Down;

    #[async_trait::async_trait]
    impl dbc_engine::ClusterApi for Down {
        async fn create_cluster(
            &self,
            _req: &dbc_engine::model::CreateClusterRequest,
        ) -> Result<String, ApiError> {
            Err(ApiError::Unavailable("down".to_string()))
        }

        async fn get_cluster(&self, _id: &str) -> Result<dbc_engine::ClusterObserved, ApiError> {
            Err(ApiError::Unavailable("down".to_string()))
        }

        async fn cluster_action(
            &self,
            _id: &str,
            _action: &dbc_engine::api::ClusterAction,
        ) -> Result<(), ApiError> {
            Err(ApiError::Unavailable("down".to_string()))
        }

        async fn update_cluster(
            &self,
            _id: &str,
            _update: &dbc_engine::api::ClusterUpdate,
        ) -> Result<(), ApiError> {
            Err(ApiError::Unavailable("down".to_string()))
        }

        async fn delete_cluster(&self, _id: &str) -> Result<(), ApiError> {
            Err(ApiError::Unavailable("down".to_string()))
        }
    }

    let engine = lifecycle(Arc::new(Down));
    let err = engine.read(CLUSTER_ID).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transport(ApiError::Unavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_update_flavor_and_grow_runs_in_order() {
    let sim = seeded_sim(2).await;
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.flavor_id = "flavor-large".to_string();
    desired.cluster_size = 5;

    let planned = plan(&desired, &observed()).unwrap();
    assert_eq!(planned.summary(), vec!["resize_flavor", "grow_cluster"]);

    let cluster = engine.update(CLUSTER_ID, &desired).await.unwrap();
    assert_eq!(cluster.flavor_id, "flavor-large");
    assert_eq!(cluster.cluster_size(), 5);
    assert_eq!(cluster.status, ClusterStatus::Active);
    assert_eq!(
        sim.mutations().await,
        vec!["resize_flavor".to_string(), "grow".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_transport_error_leaves_rest_unexecuted() {
    let sim = seeded_sim(2).await;
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.flavor_id = "flavor-large".to_string();
    desired.cluster_size = 5;

    sim.fail_next_mutation(ApiError::Unavailable("connection reset".to_string()))
        .await;

    let err = engine.update(CLUSTER_ID, &desired).await.unwrap_err();
    assert!(
        err.to_string().contains("0 operations committed out of 2"),
        "{err}"
    );
    assert_eq!(err.committed(), Some(0));
    match &err {
        EngineError::PlanAborted {
            index, operation, source, ..
        } => {
            assert_eq!(*index, 0);
            assert_eq!(operation, "resize_flavor");
            assert!(matches!(
                **source,
                EngineError::Transport(ApiError::Unavailable(_))
            ));
        }
        other => panic!("expected PlanAborted, got {other:?}"),
    }

    // Grow never ran and the cluster is untouched.
    assert!(sim.mutations().await.is_empty());
    let cluster = engine.read(CLUSTER_ID).await.unwrap().unwrap();
    assert_eq!(cluster.flavor_id, "flavor-small");
    assert_eq!(cluster.cluster_size(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_update_converges_every_field_in_order() {
    let sim = seeded_sim(1).await;
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.configuration_id = Some("cfg-2".to_string());
    desired.volume.size = 20;
    desired.autoexpand = Some(AutoExpand {
        enabled: true,
        max_disk_size: 100,
    });
    if let Some(wal) = desired.wal_volume.as_mut() {
        wal.size = 8;
    }
    desired.cluster_size = 2;

    let cluster = engine.update(CLUSTER_ID, &desired).await.unwrap();

    assert_eq!(
        sim.mutations().await,
        vec![
            "configuration_attach",
            "resize_volume",
            "update_autoexpand",
            "resize_volume",
            "shrink",
        ]
    );
    assert_eq!(cluster.configuration_id.as_deref(), Some("cfg-2"));
    assert_eq!(cluster.volume.size, 20);
    assert!(cluster.autoexpand.enabled);
    assert_eq!(cluster.autoexpand.max_disk_size, 100);
    assert_eq!(cluster.wal_volume.as_ref().map(|w| w.size), Some(8));
    // Trailing members are removed first.
    assert_eq!(cluster.members, vec!["m-1".to_string(), "m-2".to_string()]);

    // A second pass finds nothing to do.
    let again = plan(&desired, &cluster).unwrap();
    assert!(again.is_empty(), "{:?}", again.summary());
}

#[tokio::test(start_paused = true)]
async fn test_update_without_changes_issues_no_mutations() {
    let sim = seeded_sim(2).await;
    let engine = lifecycle(Arc::clone(&sim));

    let cluster = engine.update(CLUSTER_ID, &spec()).await.unwrap();
    assert_eq!(cluster.status, ClusterStatus::Active);
    assert!(sim.mutations().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_volume_shrink_rejected_locally() {
    let sim = seeded_sim(2).await;
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.volume.size = 5;
    desired.flavor_id = "flavor-large".to_string();

    let err = engine.update(CLUSTER_ID, &desired).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::VolumeShrink { current: 10, new: 5 })
    ));
    assert!(sim.mutations().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_missing_cluster_is_not_found() {
    let sim = Arc::new(dbc_engine::SimulatedCloud::new(0));
    let engine = lifecycle(sim);

    let err = engine.update(CLUSTER_ID, &spec()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_update_times_out_with_last_state() {
    let sim = seeded_sim(1_000).await;
    let config = common::config().with_update_timeout(Duration::from_secs(30));
    let engine = ClusterLifecycle::new(Arc::clone(&sim), config);

    let mut desired = spec();
    desired.flavor_id = "flavor-large".to_string();

    let start = Instant::now();
    let err = engine.update(CLUSTER_ID, &desired).await.unwrap_err();
    assert_eq!(start.elapsed(), Duration::from_secs(30));

    match err {
        EngineError::PlanAborted {
            committed: 0,
            total: 1,
            source,
            ..
        } => assert!(
            matches!(
                *source,
                EngineError::Timeout {
                    last: Some(ClusterStatus::Resizing),
                    ..
                }
            ),
            "{source}"
        ),
        other => panic!("expected PlanAborted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_update_issues_no_mutation_after_deadline() {
    let sim = seeded_sim(2).await;
    let config = common::config().with_update_timeout(Duration::from_secs(2));
    let engine = ClusterLifecycle::new(Arc::clone(&sim), config);

    let mut desired = spec();
    desired.flavor_id = "flavor-large".to_string();
    desired.cluster_size = 5;

    // The flavor resize settles exactly at the deadline; grow must not start.
    let err = engine.update(CLUSTER_ID, &desired).await.unwrap_err();
    match err {
        EngineError::PlanAborted {
            index: 1,
            committed: 1,
            total: 2,
            source,
            ..
        } => assert!(
            matches!(*source, EngineError::CallTimeout { ref call, .. } if call == "grow_cluster"),
            "{source}"
        ),
        other => panic!("expected PlanAborted, got {other:?}"),
    }

    assert_eq!(sim.mutations().await, vec!["resize_flavor".to_string()]);
    let cluster = engine.read(CLUSTER_ID).await.unwrap().unwrap();
    assert_eq!(cluster.status, ClusterStatus::Active);
    assert_eq!(cluster.cluster_size(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_update_cluster_vanishing_mid_poll_is_not_found() {
    let sim = seeded_sim(10).await;
    let engine = lifecycle(Arc::clone(&sim));

    let mut desired = spec();
    desired.flavor_id = "flavor-large".to_string();

    let (result, ()) = tokio::join!(engine.update(CLUSTER_ID, &desired), async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        sim.remove(CLUSTER_ID).await;
    });

    match result {
        Err(EngineError::PlanAborted {
            committed: 0,
            source,
            ..
        }) => assert!(source.is_not_found(), "{source}"),
        other => panic!("expected PlanAborted, got {other:?}"),
    }
    assert!(engine.read(CLUSTER_ID).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_until_gone() {
    let sim = seeded_sim(2).await;
    let engine = lifecycle(Arc::clone(&sim));

    assert_ok!(engine.delete(CLUSTER_ID).await);

    assert_eq!(sim.mutations().await, vec!["delete".to_string()]);
    assert!(engine.read(CLUSTER_ID).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delete_not_found_while_polling_is_success() {
    let api = Arc::new(GoneApi::new(Ok(())));
    let engine = lifecycle(Arc::clone(&api));

    assert_ok!(engine.delete(CLUSTER_ID).await);
    assert_eq!(api.calls(), vec!["delete", "get"]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_already_absent_is_success() {
    let api = Arc::new(GoneApi::new(Err(ApiError::NotFound(
        "cluster cluster-1".to_string(),
    ))));
    let engine = lifecycle(Arc::clone(&api));

    assert_ok!(engine.delete(CLUSTER_ID).await);
    assert_eq!(api.calls(), vec!["delete"]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_conflict_is_transport_error() {
    let api = Arc::new(GoneApi::new(Err(ApiError::Conflict(
        "cluster is resizing".to_string(),
    ))));
    let engine = lifecycle(Arc::clone(&api));

    let err = assert_err!(engine.delete(CLUSTER_ID).await);
    assert!(matches!(err, EngineError::Transport(ApiError::Conflict(_))));
    assert_eq!(api.calls(), vec!["delete"]);
}
