//! Best-effort replication
//!
//! Outbound: the leader fans each accepted write out to every peer as a
//! detached task. Nobody awaits the result, nothing is retried, and a failed
//! delivery only shows up as a [`ClusterEvent::ReplicationDeliveryFailed`].
//!
//! Inbound: a replicated write is applied as-is. The sender is not checked
//! against the believed leader.

use crate::common::Error;
use crate::coordinator::context::NodeContext;
use crate::coordinator::events::ClusterEvent;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct Replicator {
    ctx: Arc<NodeContext>,
}

impl Replicator {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    /// Dispatch `(key, value)` to every peer without waiting.
    ///
    /// The returned handles are only for callers that want to observe
    /// completion (tests, shutdown); the write path drops them.
    pub fn fan_out(&self, key: &str, value: &str) -> Vec<JoinHandle<()>> {
        self.ctx
            .peers
            .iter()
            .map(|peer| {
                let ctx = self.ctx.clone();
                let peer = peer.clone();
                let key = key.to_string();
                let value = value.to_string();
                ctx.metrics.replications_sent.inc();
                tokio::spawn(async move {
                    let timeout = ctx.timing.replication_timeout;
                    let delivery = tokio::time::timeout(
                        timeout,
                        ctx.transport.replicate(&peer, &key, &value),
                    )
                    .await;
                    let failure = match delivery {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e.to_string()),
                        Err(_) => Some(format!("no response within {:?}", timeout)),
                    };
                    match failure {
                        None => ctx
                            .events
                            .emit(ClusterEvent::ReplicationDelivered { peer: peer.id, key }),
                        Some(reason) => {
                            let err = Error::ReplicationDeliveryFailed {
                                peer: peer.id,
                                reason,
                            };
                            ctx.events.emit(ClusterEvent::ReplicationDeliveryFailed {
                                peer: peer.id,
                                key,
                                reason: err.to_string(),
                            });
                        }
                    }
                })
            })
            .collect()
    }

    /// Apply a write received from a peer claiming leadership.
    pub fn apply_inbound(&self, key: String, value: String) {
        self.ctx.store.put(key.clone(), value);
        self.ctx
            .events
            .emit(ClusterEvent::ReplicatedWriteApplied { key });
    }
}
