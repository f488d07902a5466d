//! Client write routing and local reads

use crate::common::{encode_segment, offset_port, Error, NodeId, RedirectConfig, Result};
use crate::coordinator::context::NodeContext;
use crate::coordinator::replication::Replicator;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A write applied on this node as leader
#[derive(Debug)]
pub struct AcceptedWrite {
    pub leader: NodeId,
    /// One detached delivery per peer
    pub deliveries: Vec<JoinHandle<()>>,
}

impl AcceptedWrite {
    /// Wait for every outbound delivery to finish, successful or not.
    pub async fn delivered(self) {
        for handle in self.deliveries {
            let _ = handle.await;
        }
    }
}

pub struct WriteRouter {
    ctx: Arc<NodeContext>,
    replicator: Replicator,
}

impl WriteRouter {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        let replicator = Replicator::new(ctx.clone());
        Self { ctx, replicator }
    }

    /// Apply locally and replicate when this node leads; otherwise reject
    /// without touching the store.
    pub fn write(&self, key: String, value: String) -> Result<AcceptedWrite> {
        let self_id = self.ctx.id();
        match self.ctx.leader.get() {
            None => {
                self.ctx.metrics.writes_no_leader.inc();
                Err(Error::NoLeaderKnown)
            }
            Some(leader) if leader == self_id => {
                tracing::info!(key = %key, "I am leader, saving {}={}", key, value);
                self.ctx.store.put(key.clone(), value.clone());
                self.ctx.metrics.writes_accepted.inc();
                let deliveries = self.replicator.fan_out(&key, &value);
                Ok(AcceptedWrite { leader, deliveries })
            }
            Some(leader) => {
                let redirect = self.redirect_target(leader, &key, &value)?;
                self.ctx.metrics.writes_redirected.inc();
                tracing::info!(
                    leader,
                    redirect = %redirect,
                    "Redirecting client to leader (node {})",
                    leader
                );
                Err(Error::NotLeader {
                    leader_id: leader,
                    redirect,
                })
            }
        }
    }

    /// Local, possibly stale read.
    pub fn read(&self, key: &str) -> Result<String> {
        self.ctx.store.get(key).ok_or_else(|| Error::KeyNotFound {
            node: self.ctx.id(),
            key: key.to_string(),
        })
    }

    /// Inbound replicated write; applied whatever this node believes about leadership.
    pub fn apply_replicated(&self, key: String, value: String) {
        self.replicator.apply_inbound(key, value);
    }

    /// Where the client should resend this write.
    ///
    /// Port-offset targets that would not fit a port fall back to the
    /// leader's own address; with neither available the write fails.
    pub fn redirect_target(&self, leader: NodeId, key: &str, value: &str) -> Result<String> {
        let port_offset = |host: &str, base: u16| {
            offset_port(base, leader).map(|port| format!("http://{}:{}", host, port))
        };
        let peer_url = || self.ctx.peers.get(leader).map(|peer| peer.base_url());
        let base = match &self.ctx.redirect {
            RedirectConfig::Peer => {
                peer_url().or_else(|| port_offset("localhost", self.ctx.coord_port))
            }
            RedirectConfig::PortOffset { host, base_port } => {
                port_offset(host, base_port.unwrap_or(self.ctx.coord_port)).or_else(peer_url)
            }
        }
        .ok_or(Error::LeaderUnaddressable { leader_id: leader })?;

        Ok(format!(
            "{}/data/{}/{}",
            base,
            encode_segment(key),
            encode_segment(value)
        ))
    }
}
