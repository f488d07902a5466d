//! Leadership resolution
//!
//! Leadership is not voted on. Each cycle the resolver rebuilds the alive
//! set from the liveness table and the highest id in it is the leader. Two
//! nodes with different views can both believe they lead; nothing here
//! prevents that.

use crate::common::NodeId;
use crate::coordinator::context::NodeContext;
use crate::coordinator::events::ClusterEvent;
use futures_util::FutureExt;
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// `{self_id}` plus every peer seen less than `staleness` before `now`.
pub fn alive_set(
    self_id: NodeId,
    last_seen: &HashMap<NodeId, Instant>,
    now: Instant,
    staleness: Duration,
) -> BTreeSet<NodeId> {
    let mut alive: BTreeSet<NodeId> = last_seen
        .iter()
        .filter(|(_, seen)| now.saturating_duration_since(**seen) < staleness)
        .map(|(id, _)| *id)
        .collect();
    alive.insert(self_id);
    alive
}

/// Highest id wins.
pub fn resolve(alive: &BTreeSet<NodeId>) -> Option<NodeId> {
    alive.last().copied()
}

/// Currently believed leader; `None` until the first resolution cycle.
pub struct LeaderState {
    tx: watch::Sender<Option<NodeId>>,
}

impl LeaderState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn get(&self) -> Option<NodeId> {
        *self.tx.borrow()
    }

    /// Observe changes, e.g. to wait for a leader in tests or status streams.
    pub fn subscribe(&self) -> watch::Receiver<Option<NodeId>> {
        self.tx.subscribe()
    }

    /// Store `leader`. Returns the previous value when it differed.
    pub fn replace(&self, leader: NodeId) -> Option<Option<NodeId>> {
        let mut previous = None;
        self.tx.send_if_modified(|current| {
            if *current == Some(leader) {
                return false;
            }
            previous = Some(*current);
            *current = Some(leader);
            true
        });
        previous
    }
}

impl Default for LeaderState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one resolution cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub alive: BTreeSet<NodeId>,
    pub leader: NodeId,
    /// `Some(previous)` when this cycle changed the leader
    pub changed_from: Option<Option<NodeId>>,
}

pub struct LeadershipResolver {
    ctx: Arc<NodeContext>,
}

impl LeadershipResolver {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    /// Run one cycle against the current liveness table.
    pub fn resolve_once(&self) -> Resolution {
        let self_id = self.ctx.id();
        let alive = alive_set(
            self_id,
            &self.ctx.liveness.snapshot(),
            Instant::now(),
            self.ctx.timing.staleness,
        );
        let leader = resolve(&alive).unwrap_or(self_id);

        self.ctx
            .metrics
            .alive_peers
            .set(alive.len().saturating_sub(1) as u64);

        let changed_from = self.ctx.leader.replace(leader);
        if let Some(previous) = changed_from {
            self.ctx.events.emit(ClusterEvent::LeaderChanged {
                previous,
                current: leader,
                is_self: leader == self_id,
            });
        }

        Resolution {
            alive,
            leader,
            changed_from,
        }
    }

    /// Resolve on every tick until `shutdown` flips to `true` or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.ctx.timing.election_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(node_id = self.ctx.id(), "Starting leader election loop");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cycle = AssertUnwindSafe(async { self.resolve_once() }).catch_unwind();
                    if cycle.await.is_err() {
                        tracing::error!(node_id = self.ctx.id(), "Resolution cycle panicked, continuing");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(node_id = self.ctx.id(), "Leader election loop stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
