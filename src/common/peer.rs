//! Peer addressing
//!
//! Every node listens on the same coordination port; a peer is named by its
//! hostname alone and its numeric id is the last hyphen-delimited token of
//! that hostname (`node-3` is node 3, `kv-node-12` is node 12).

use crate::common::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Integer node identifier
pub type NodeId = u64;

/// Extract a peer id from its hostname.
pub fn parse_peer_id(host: &str) -> Result<NodeId> {
    let invalid = |reason: &str| Error::InvalidPeer {
        host: host.to_string(),
        reason: reason.to_string(),
    };

    if host.contains(':') {
        return Err(invalid("port suffix not allowed, peers share the coordination port"));
    }
    let (_, token) = host
        .rsplit_once('-')
        .ok_or_else(|| invalid("expected <name>-<id>"))?;
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("trailing token is not a numeric id"));
    }
    token
        .parse::<NodeId>()
        .map_err(|e| invalid(&e.to_string()))
}

/// Port `base + id`, if that is a valid port number.
pub fn offset_port(base: u16, id: NodeId) -> Option<u16> {
    u64::from(base)
        .checked_add(id)
        .and_then(|port| u16::try_from(port).ok())
}

/// A statically configured peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Peer {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

impl Peer {
    pub fn parse(host: &str, port: u16) -> Result<Self> {
        let host = host.trim();
        Ok(Self {
            id: parse_peer_id(host)?,
            host: host.to_string(),
            port,
        })
    }

    /// `http://<host>:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} ({}:{})", self.id, self.host, self.port)
    }
}

/// Ordered, immutable list of peers
#[derive(Debug, Clone, Default)]
pub struct PeerSet {
    peers: Vec<Peer>,
}

impl PeerSet {
    /// Parse hostnames in order. Ids must be unique and differ from `self_id`.
    pub fn parse(hosts: &[String], port: u16, self_id: NodeId) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut peers = Vec::with_capacity(hosts.len());
        for host in hosts.iter().filter(|h| !h.trim().is_empty()) {
            let peer = Peer::parse(host, port)?;
            if peer.id == self_id {
                return Err(Error::InvalidConfig(format!(
                    "peer {} has this node's own id {}",
                    peer.host, self_id
                )));
            }
            if !seen.insert(peer.id) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate peer id {} ({})",
                    peer.id, peer.host
                )));
            }
            peers.push(peer);
        }
        Ok(Self { peers })
    }

    pub fn from_peers(peers: Vec<Peer>) -> Self {
        Self { peers }
    }

    pub fn get(&self, id: NodeId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peer> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl<'a> IntoIterator for &'a PeerSet {
    type Item = &'a Peer;
    type IntoIter = std::slice::Iter<'a, Peer>;

    fn into_iter(self) -> Self::IntoIter {
        self.peers.iter()
    }
}
