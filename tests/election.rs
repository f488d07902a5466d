//! Liveness and leadership across a simulated cluster

mod common;

use async_trait::async_trait;
use beaconkv::common::{Error, Peer, PeerSet, Result};
use beaconkv::coordinator::{
    ClusterEvent, Coordinator, LeadershipResolver, MemorySink, NodeContext, PeerTransport,
    WriteRouter,
};
use common::TestCluster;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;

#[tokio::test(start_paused = true)]
async fn test_three_nodes_elect_highest_id() {
    let cluster = TestCluster::new(&[1, 2, 3]);

    cluster.cycle().await;

    for id in [1, 2, 3] {
        assert_eq!(cluster.leader_of(id), Some(3), "node {} disagrees", id);
    }
    assert!(cluster.node(3).is_leader());
    assert_eq!(cluster.sink(1).leader_changes(), vec![(None, 3)]);

    let elected = cluster
        .sink(3)
        .events()
        .into_iter()
        .any(|e| matches!(e, ClusterEvent::LeaderChanged { current: 3, is_self: true, .. }));
    assert!(elected);
}

#[tokio::test(start_paused = true)]
async fn test_no_leader_before_first_cycle() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    let node1 = cluster.node(1);
    let router = WriteRouter::new(node1.clone());

    assert!(matches!(
        router.write("k".into(), "v".into()),
        Err(Error::NoLeaderKnown)
    ));
    assert!(node1.store.is_empty());
    assert_eq!(node1.metrics.writes_no_leader.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leader_fails_over_after_staleness() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.cycle().await;
    assert_eq!(cluster.leader_of(1), Some(3));

    cluster.net.set_down(3, true);

    // still inside the staleness window
    advance(Duration::from_secs(3)).await;
    cluster.cycle().await;
    assert_eq!(cluster.leader_of(1), Some(3));
    assert_eq!(cluster.leader_of(2), Some(3));

    advance(Duration::from_secs(3)).await;
    cluster.cycle().await;
    assert_eq!(cluster.leader_of(1), Some(2));
    assert_eq!(cluster.leader_of(2), Some(2));
    assert_eq!(cluster.sink(1).leader_changes(), vec![(None, 3), (Some(3), 2)]);

    let router = WriteRouter::new(cluster.node(1));
    match router.write("k1".into(), "v1".into()) {
        Err(Error::NotLeader {
            leader_id,
            redirect,
        }) => {
            assert_eq!(leader_id, 2);
            assert_eq!(redirect, "http://node-2:7000/data/k1/v1");
        }
        other => panic!("expected a redirect to node 2, got {:?}", other.map(|w| w.leader)),
    }
    assert!(cluster.node(1).store.get("k1").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_revived_lower_id_does_not_take_over() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.net.set_down(2, true);

    cluster.cycle().await;
    assert_eq!(cluster.leader_of(3), Some(3));

    cluster.net.set_down(2, false);
    advance(Duration::from_secs(1)).await;
    cluster.cycle().await;

    for id in [1, 2, 3] {
        assert_eq!(cluster.leader_of(id), Some(3));
    }
    assert_eq!(cluster.sink(3).leader_changes(), vec![(None, 3)]);
}

#[tokio::test(start_paused = true)]
async fn test_revived_higher_id_takes_over() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.net.set_down(3, true);

    cluster.cycle().await;
    assert_eq!(cluster.leader_of(1), Some(2));

    cluster.net.set_down(3, false);
    advance(Duration::from_secs(1)).await;
    cluster.cycle().await;

    assert_eq!(cluster.leader_of(1), Some(3));
    assert_eq!(cluster.sink(1).leader_changes(), vec![(None, 2), (Some(2), 3)]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_leaves_last_seen_untouched() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.cycle().await;

    let node1 = cluster.node(1);
    let seen = node1.liveness.last_seen(3).unwrap();

    cluster.net.set_down(3, true);
    advance(Duration::from_secs(1)).await;
    let reports = cluster.probe_all().await;

    assert_eq!(reports[&1].unreachable, vec![3]);
    assert_eq!(reports[&1].reachable, vec![2]);
    assert_eq!(node1.liveness.last_seen(3), Some(seen));
    assert!(node1.liveness.last_seen(2).unwrap() > seen);

    let failed = cluster
        .sink(1)
        .events()
        .into_iter()
        .any(|e| matches!(e, ClusterEvent::PeerProbeFailed { peer: 3, .. }));
    assert!(failed);
}

#[tokio::test(start_paused = true)]
async fn test_never_probed_peer_is_never_alive() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.net.set_down(3, true);
    cluster.cycle().await;

    let resolution = LeadershipResolver::new(cluster.node(1)).resolve_once();
    assert!(!resolution.alive.contains(&3));
    assert!(cluster.node(1).liveness.last_seen(3).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_resolution_is_repeatable() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    cluster.probe_all().await;

    let resolver = LeadershipResolver::new(cluster.node(2));
    let first = resolver.resolve_once();
    let second = resolver.resolve_once();

    assert_eq!(first.leader, 3);
    assert_eq!(first.changed_from, Some(None));
    assert_eq!(second.alive, first.alive);
    assert_eq!(second.leader, first.leader);
    assert_eq!(second.changed_from, None);
}

#[tokio::test(start_paused = true)]
async fn test_single_node_leads_itself() {
    let ctx = NodeContext::builder(5, PeerSet::default())
        .events(Arc::new(MemorySink::new()))
        .build()
        .unwrap();

    let resolution = LeadershipResolver::new(ctx.clone()).resolve_once();
    assert_eq!(resolution.leader, 5);
    assert!(ctx.is_leader());
}

#[tokio::test(start_paused = true)]
async fn test_background_loops_converge_and_stop() {
    let cluster = TestCluster::new(&[1, 2, 3]);
    let node1 = cluster.node(1);
    let mut leader = node1.leader.subscribe();

    let tasks = Coordinator::from_context(node1.clone()).start();

    let converged = tokio::time::timeout(Duration::from_secs(30), leader.wait_for(|l| *l == Some(3)))
        .await
        .is_ok();
    assert!(converged, "node 1 never settled on node 3");

    tasks.shutdown().await;
}

/// Panics on the first probe, then behaves
struct FlakyTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl PeerTransport for FlakyTransport {
    async fn probe(&self, _peer: &Peer) -> Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("probe blew up");
        }
        Ok(())
    }

    async fn replicate(&self, _peer: &Peer, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_a_panicking_tick() {
    let peers = PeerSet::parse(&["node-2".to_string()], 7000, 1).unwrap();
    let ctx = NodeContext::builder(1, peers)
        .transport(Arc::new(FlakyTransport {
            calls: AtomicUsize::new(0),
        }))
        .events(Arc::new(MemorySink::new()))
        .build()
        .unwrap();
    let mut leader = ctx.leader.subscribe();

    let tasks = Coordinator::from_context(ctx.clone()).start();

    let converged = tokio::time::timeout(Duration::from_secs(30), leader.wait_for(|l| *l == Some(2)))
        .await
        .is_ok();
    assert!(converged, "probing stopped after the panic");

    tasks.shutdown().await;
}
