//! In-memory cluster harness for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use beaconkv::common::{Error, NodeId, Peer, PeerSet, Result};
use beaconkv::coordinator::{
    LeadershipResolver, LivenessTracker, MemorySink, NodeContext, PeerTransport, ProbeReport,
    Replicator,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Routes probes and replicated writes between contexts in the same process
#[derive(Default)]
pub struct FakeNetwork {
    nodes: RwLock<HashMap<NodeId, Arc<NodeContext>>>,
    down: RwLock<HashSet<NodeId>>,
    hung: RwLock<HashSet<NodeId>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, ctx: Arc<NodeContext>) {
        self.nodes.write().unwrap().insert(ctx.id(), ctx);
    }

    /// A down node answers nothing
    pub fn set_down(&self, id: NodeId, down: bool) {
        let mut set = self.down.write().unwrap();
        if down {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    /// A hung node accepts replication calls and never answers
    pub fn set_hung(&self, id: NodeId) {
        self.hung.write().unwrap().insert(id);
    }

    pub fn is_down(&self, id: NodeId) -> bool {
        self.down.read().unwrap().contains(&id)
    }

    fn reachable(&self, id: NodeId) -> Result<Arc<NodeContext>> {
        if self.is_down(id) {
            return Err(Error::Other(format!("connection refused by node {}", id)));
        }
        self.nodes
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Other(format!("no route to node {}", id)))
    }
}

pub struct FakeTransport {
    net: Arc<FakeNetwork>,
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn probe(&self, peer: &Peer) -> Result<()> {
        self.net.reachable(peer.id).map(|_| ())
    }

    async fn replicate(&self, peer: &Peer, key: &str, value: &str) -> Result<()> {
        let target = self.net.reachable(peer.id)?;
        let hung = self.net.hung.read().unwrap().contains(&peer.id);
        if hung {
            std::future::pending::<()>().await;
        }
        Replicator::new(target).apply_inbound(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn host(id: NodeId) -> String {
    format!("node-{}", id)
}

pub struct TestCluster {
    pub net: Arc<FakeNetwork>,
    nodes: BTreeMap<NodeId, Arc<NodeContext>>,
    sinks: HashMap<NodeId, Arc<MemorySink>>,
}

impl TestCluster {
    /// Every node knows every other node as `node-<id>` on port 7000.
    pub fn new(ids: &[NodeId]) -> Self {
        let net = FakeNetwork::new();
        let mut nodes = BTreeMap::new();
        let mut sinks = HashMap::new();

        for &id in ids {
            let hosts: Vec<String> = ids.iter().filter(|&&p| p != id).map(|&p| host(p)).collect();
            let peers = PeerSet::parse(&hosts, 7000, id).unwrap();
            let sink = Arc::new(MemorySink::new());
            let ctx = NodeContext::builder(id, peers)
                .transport(Arc::new(FakeTransport { net: net.clone() }))
                .observer(sink.clone())
                .build()
                .unwrap();
            net.register(ctx.clone());
            nodes.insert(id, ctx);
            sinks.insert(id, sink);
        }

        Self { net, nodes, sinks }
    }

    pub fn node(&self, id: NodeId) -> Arc<NodeContext> {
        self.nodes[&id].clone()
    }

    pub fn sink(&self, id: NodeId) -> Arc<MemorySink> {
        self.sinks[&id].clone()
    }

    pub fn leader_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[&id].leader.get()
    }

    /// One probe round on every node that is up
    pub async fn probe_all(&self) -> HashMap<NodeId, ProbeReport> {
        let mut reports = HashMap::new();
        for (id, ctx) in &self.nodes {
            if !self.net.is_down(*id) {
                reports.insert(*id, LivenessTracker::new(ctx.clone()).probe_round().await);
            }
        }
        reports
    }

    /// One resolution cycle on every node that is up
    pub fn resolve_all(&self) {
        for (id, ctx) in &self.nodes {
            if !self.net.is_down(*id) {
                LeadershipResolver::new(ctx.clone()).resolve_once();
            }
        }
    }

    pub async fn cycle(&self) {
        self.probe_all().await;
        self.resolve_all();
    }
}
