//! Per-node shared state
//!
//! One [`NodeContext`] is created at startup and shared (behind an `Arc`) by
//! the liveness tracker, the leadership resolver, the write router and the
//! HTTP handlers. Each container has a single documented writer.

use crate::common::{Config, MetricsRegistry, NodeId, PeerSet, RedirectConfig, Result, Timing};
use crate::coordinator::events::{EventSink, FanoutSink, TracingSink};
use crate::coordinator::leadership::LeaderState;
use crate::coordinator::liveness::LivenessTable;
use crate::coordinator::store::KvStore;
use crate::coordinator::transport::{HttpTransport, PeerTransport};
use std::sync::Arc;

/// This node's id and advertised address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub id: NodeId,
    pub addr: String,
}

pub struct NodeContext {
    pub identity: NodeIdentity,
    pub peers: PeerSet,
    pub coord_port: u16,
    pub timing: Timing,
    pub redirect: RedirectConfig,

    /// Written by the liveness tracker only
    pub liveness: LivenessTable,
    /// Written by the leadership resolver only
    pub leader: LeaderState,
    /// Written by the write router and inbound replication
    pub store: KvStore,

    pub transport: Arc<dyn PeerTransport>,
    pub events: Arc<dyn EventSink>,
    pub metrics: Arc<MetricsRegistry>,
}

impl NodeContext {
    pub fn builder(node_id: NodeId, peers: PeerSet) -> NodeContextBuilder {
        NodeContextBuilder {
            node_id,
            peers,
            coord_port: 7000,
            addr: None,
            timing: Timing::default(),
            redirect: RedirectConfig::default(),
            transport: None,
            events: None,
            observers: Vec::new(),
            metrics: None,
        }
    }

    /// Validated config to a context using the HTTP transport.
    pub fn from_config(config: &Config) -> Result<Arc<Self>> {
        config.validate()?;
        Self::builder(config.node_id, config.peer_set()?)
            .coord_port(config.coord_port)
            .addr(config.bind_addr())
            .timing(config.timing())
            .redirect(config.redirect.clone())
            .build()
    }

    pub fn id(&self) -> NodeId {
        self.identity.id
    }

    pub fn is_leader(&self) -> bool {
        self.leader.get() == Some(self.identity.id)
    }
}

pub struct NodeContextBuilder {
    node_id: NodeId,
    peers: PeerSet,
    coord_port: u16,
    addr: Option<String>,
    timing: Timing,
    redirect: RedirectConfig,
    transport: Option<Arc<dyn PeerTransport>>,
    events: Option<Arc<dyn EventSink>>,
    observers: Vec<Arc<dyn EventSink>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl NodeContextBuilder {
    pub fn coord_port(mut self, port: u16) -> Self {
        self.coord_port = port;
        self
    }

    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn redirect(mut self, redirect: RedirectConfig) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn PeerTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Also deliver every event to `sink`, alongside the primary sink.
    pub fn observer(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.observers.push(sink);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<Arc<NodeContext>> {
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(MetricsRegistry::new()));
        let transport: Arc<dyn PeerTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&self.timing)?),
        };
        let primary: Arc<dyn EventSink> = self
            .events
            .unwrap_or_else(|| Arc::new(TracingSink::new(self.node_id, metrics.clone())));
        let events: Arc<dyn EventSink> = if self.observers.is_empty() {
            primary
        } else {
            let mut sinks = vec![primary];
            sinks.extend(self.observers);
            Arc::new(FanoutSink::new(sinks))
        };
        let addr = self
            .addr
            .unwrap_or_else(|| format!("0.0.0.0:{}", self.coord_port));

        Ok(Arc::new(NodeContext {
            identity: NodeIdentity {
                id: self.node_id,
                addr,
            },
            peers: self.peers,
            coord_port: self.coord_port,
            timing: self.timing,
            redirect: self.redirect,
            liveness: LivenessTable::new(),
            leader: LeaderState::new(),
            store: KvStore::new(),
            transport,
            events,
            metrics,
        }))
    }
}
