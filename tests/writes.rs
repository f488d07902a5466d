//! Write routing and best-effort replication across a simulated cluster

mod common;

use beaconkv::common::Error;
use beaconkv::coordinator::{ClusterEvent, WriteRouter};
use common::TestCluster;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test(start_paused = true)]
async fn test_leader_write_is_visible_and_replicated() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.cycle().await;

    let leader = WriteRouter::new(cluster.node(3));
    let accepted = assert_ok!(leader.write("k1".into(), "v1".into()));
    assert_eq!(accepted.leader, 3);
    assert_eq!(accepted.deliveries.len(), 2);

    // visible locally before any delivery completes
    assert_eq!(assert_ok!(leader.read("k1")), "v1");

    accepted.delivered().await;
    for id in [1, 2] {
        let router = WriteRouter::new(cluster.node(id));
        assert_eq!(assert_ok!(router.read("k1")), "v1");
    }

    let metrics = &cluster.node(3).metrics;
    assert_eq!(metrics.writes_accepted.get(), 1);
    assert_eq!(metrics.replications_sent.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_redirected_write_does_not_mutate() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.cycle().await;

    let node1 = cluster.node(1);
    let router = WriteRouter::new(node1.clone());

    let err = assert_err!(router.write("k".into(), "v".into()));
    assert!(matches!(err, Error::NotLeader { leader_id: 3, .. }));
    assert!(err.is_retryable());
    assert!(node1.store.is_empty());
    assert_eq!(node1.metrics.writes_redirected.get(), 1);

    // the leader never heard of it either
    assert!(cluster.node(3).store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_inbound_replication_ignores_leader_belief() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    let node1 = cluster.node(1);
    let router = WriteRouter::new(node1.clone());

    // before any resolution cycle
    router.apply_replicated("k2".into(), "v2".into());
    assert_eq!(assert_ok!(router.read("k2")), "v2");

    // and after node 1 has settled on node 3
    cluster.cycle().await;
    router.apply_replicated("k2".into(), "v3".into());
    assert_eq!(assert_ok!(router.read("k2")), "v3");

    assert_eq!(
        cluster
            .sink(1)
            .events()
            .into_iter()
            .filter(|e| matches!(e, ClusterEvent::ReplicatedWriteApplied { .. }))
            .count(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_delivery_is_only_observable_through_events() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.cycle().await;
    cluster.net.set_down(1, true);

    let leader = WriteRouter::new(cluster.node(3));
    let accepted = assert_ok!(leader.write("k".into(), "v".into()));
    accepted.delivered().await;

    assert_eq!(assert_ok!(leader.read("k")), "v");
    assert_eq!(cluster.node(2).store.get("k").as_deref(), Some("v"));
    assert!(cluster.node(1).store.get("k").is_none());

    let events = cluster.sink(3).events();
    assert!(events.contains(&ClusterEvent::ReplicationDelivered {
        peer: 2,
        key: "k".into()
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        ClusterEvent::ReplicationDeliveryFailed { peer: 1, key, .. } if key == "k"
    )));

    // the default sink still sees the same events next to the recorder
    let metrics = &cluster.node(3).metrics;
    assert_eq!(metrics.replications_sent.get(), 2);
    assert_eq!(metrics.replications_failed.get(), 1);
    assert_eq!(metrics.is_leader.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_peer_delivery_times_out() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.cycle().await;
    cluster.net.set_hung(2);

    let leader = WriteRouter::new(cluster.node(3));
    let accepted = assert_ok!(leader.write("k".into(), "v".into()));

    // the caller already has its answer; the hung delivery resolves on its own
    let finished = tokio::time::timeout(Duration::from_secs(10), accepted.delivered())
        .await
        .is_ok();
    assert!(finished);

    let timed_out = cluster.sink(3).events().into_iter().any(|e| match e {
        ClusterEvent::ReplicationDeliveryFailed { peer, reason, .. } => {
            peer == 2 && reason.contains("no response")
        }
        _ => false,
    });
    assert!(timed_out);
    assert!(cluster.node(2).store.get("k").is_none());
    assert_eq!(cluster.node(1).store.get("k").as_deref(), Some("v"));
}

#[tokio::test(start_paused = true)]
async fn test_last_write_wins_on_leader() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.cycle().await;

    let leader = WriteRouter::new(cluster.node(3));
    assert_ok!(leader.write("k".into(), "first".into())).delivered().await;
    assert_ok!(leader.write("k".into(), "second".into())).delivered().await;

    assert_eq!(assert_ok!(leader.read("k")), "second");
    assert_eq!(cluster.node(1).store.get("k").as_deref(), Some("second"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_key_read() {
    let cluster = TestCluster::new(&[1, 2]);
    let router = WriteRouter::new(cluster.node(2));

    let err = assert_err!(router.read("nope"));
    assert_eq!(err.to_string(), "Key not found on Node 2: nope");
    assert!(!err.is_retryable());
}
