//! Liveness tracking
//!
//! Every probe interval each peer gets one bounded `GET /ping`. A success
//! stamps the peer's last-seen time; a failure leaves the table untouched,
//! so a dead peer simply ages out.

use crate::common::{Error, NodeId, Peer};
use crate::coordinator::context::NodeContext;
use crate::coordinator::events::ClusterEvent;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Peer id to last successful probe time
#[derive(Debug, Default)]
pub struct LivenessTable {
    last_seen: RwLock<HashMap<NodeId, Instant>>,
}

impl LivenessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `peer` as seen at `at`. Older stamps never replace newer ones.
    /// Returns whether the entry changed.
    pub fn record(&self, peer: NodeId, at: Instant) -> bool {
        let mut table = self
            .last_seen
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match table.get(&peer) {
            Some(existing) if *existing >= at => false,
            _ => {
                table.insert(peer, at);
                true
            }
        }
    }

    pub fn last_seen(&self, peer: NodeId) -> Option<Instant> {
        self.last_seen
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&peer)
            .copied()
    }

    pub fn snapshot(&self) -> HashMap<NodeId, Instant> {
        self.last_seen
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Outcome of one probe round
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub reachable: Vec<NodeId>,
    pub unreachable: Vec<NodeId>,
}

pub struct LivenessTracker {
    ctx: Arc<NodeContext>,
}

impl LivenessTracker {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    /// Probe every peer once, concurrently, and stamp the ones that answered.
    pub async fn probe_round(&self) -> ProbeReport {
        // Each peer is stamped when it answered, not when the slowest peer did
        let results = join_all(self.ctx.peers.iter().map(|peer| async move {
            let result = self.probe_peer(peer).await;
            (result, Instant::now())
        }))
        .await;

        let mut report = ProbeReport::default();
        for (peer, (result, answered_at)) in self.ctx.peers.iter().zip(results) {
            match result {
                Ok(()) => {
                    self.ctx.liveness.record(peer.id, answered_at);
                    self.ctx
                        .events
                        .emit(ClusterEvent::PeerProbeSucceeded { peer: peer.id });
                    report.reachable.push(peer.id);
                }
                Err(e) => {
                    self.ctx.events.emit(ClusterEvent::PeerProbeFailed {
                        peer: peer.id,
                        reason: e.to_string(),
                    });
                    report.unreachable.push(peer.id);
                }
            }
        }
        report
    }

    async fn probe_peer(&self, peer: &Peer) -> crate::Result<()> {
        let timeout = self.ctx.timing.probe_timeout;
        match tokio::time::timeout(timeout, self.ctx.transport.probe(peer)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::ProbeUnreachable {
                peer: peer.id,
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ProbeUnreachable {
                peer: peer.id,
                reason: format!("no response within {:?}", timeout),
            }),
        }
    }

    /// Probe on every tick until `shutdown` flips to `true` or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.ctx.timing.probe_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            node_id = self.ctx.id(),
            peers = self.ctx.peers.len(),
            "Starting failure detector"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if AssertUnwindSafe(self.probe_round()).catch_unwind().await.is_err() {
                        tracing::error!(node_id = self.ctx.id(), "Probe round panicked, continuing");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(node_id = self.ctx.id(), "Failure detector stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
