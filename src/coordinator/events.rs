//! Observability sink for coordination events
//!
//! Background loops and detached replication tasks never report failures to
//! a caller; they emit [`ClusterEvent`]s here instead.

use crate::common::{MetricsRegistry, NodeId};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    /// Leadership belief changed. `previous` is `None` on the first cycle.
    LeaderChanged {
        previous: Option<NodeId>,
        current: NodeId,
        is_self: bool,
    },
    PeerProbeSucceeded {
        peer: NodeId,
    },
    PeerProbeFailed {
        peer: NodeId,
        reason: String,
    },
    ReplicationDelivered {
        peer: NodeId,
        key: String,
    },
    ReplicationDeliveryFailed {
        peer: NodeId,
        key: String,
        reason: String,
    },
    ReplicatedWriteApplied {
        key: String,
    },
}

pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: ClusterEvent);
}

/// Default sink: structured logs plus metrics
pub struct TracingSink {
    node_id: NodeId,
    metrics: Arc<MetricsRegistry>,
}

impl TracingSink {
    pub fn new(node_id: NodeId, metrics: Arc<MetricsRegistry>) -> Self {
        Self { node_id, metrics }
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: ClusterEvent) {
        match event {
            ClusterEvent::LeaderChanged {
                previous,
                current,
                is_self,
            } => {
                self.metrics.leader_changes.inc();
                self.metrics.current_leader.set(current);
                self.metrics.is_leader.set(u64::from(is_self));
                if is_self {
                    tracing::info!(
                        node_id = self.node_id,
                        previous = ?previous,
                        "I am elected as the new leader (node {})",
                        self.node_id
                    );
                } else {
                    tracing::info!(
                        node_id = self.node_id,
                        previous = ?previous,
                        leader = current,
                        "New leader elected: node {}",
                        current
                    );
                }
            }
            ClusterEvent::PeerProbeSucceeded { peer } => {
                self.metrics.probes_ok.inc();
                tracing::trace!(peer, "Probe ok");
            }
            ClusterEvent::PeerProbeFailed { peer, reason } => {
                self.metrics.probes_failed.inc();
                tracing::debug!(peer, reason = %reason, "Probe failed");
            }
            ClusterEvent::ReplicationDelivered { peer, key } => {
                tracing::trace!(peer, key = %key, "Replicated");
            }
            ClusterEvent::ReplicationDeliveryFailed { peer, key, reason } => {
                self.metrics.replications_failed.inc();
                tracing::warn!(peer, key = %key, reason = %reason, "Failed to replicate to node {}", peer);
            }
            ClusterEvent::ReplicatedWriteApplied { key } => {
                self.metrics.replications_applied.inc();
                tracing::info!(key = %key, "Leader told me to save {}", key);
            }
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<ClusterEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClusterEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn leader_changes(&self) -> Vec<(Option<NodeId>, NodeId)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClusterEvent::LeaderChanged {
                    previous, current, ..
                } => Some((previous, current)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ClusterEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forwards every event to each inner sink
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: ClusterEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_sink_updates_metrics() {
        let metrics = Arc::new(MetricsRegistry::new());
        let sink = TracingSink::new(1, metrics.clone());

        sink.emit(ClusterEvent::LeaderChanged {
            previous: None,
            current: 1,
            is_self: true,
        });
        sink.emit(ClusterEvent::PeerProbeFailed {
            peer: 2,
            reason: "timeout".into(),
        });

        assert_eq!(metrics.leader_changes.get(), 1);
        assert_eq!(metrics.current_leader.get(), 1);
        assert_eq!(metrics.is_leader.get(), 1);
        assert_eq!(metrics.probes_failed.get(), 1);
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new(vec![a.clone(), b.clone()]);

        fanout.emit(ClusterEvent::ReplicatedWriteApplied { key: "k".into() });

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events(), a.events());
    }
}
