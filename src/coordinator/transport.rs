//! Outbound peer calls: liveness probes and replicated writes

use crate::common::{encode_segment, Peer, Result, Timing};
use async_trait::async_trait;

/// How this node talks to its peers
#[async_trait]
pub trait PeerTransport: Send + Sync + 'static {
    /// Round-trip liveness check. `Ok` only on a success response.
    async fn probe(&self, peer: &Peer) -> Result<()>;

    /// Deliver one replicated write to a peer.
    async fn replicate(&self, peer: &Peer, key: &str, value: &str) -> Result<()>;
}

/// HTTP transport speaking the node wire contract
pub struct HttpTransport {
    probe_client: reqwest::Client,
    replicate_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timing: &Timing) -> Result<Self> {
        let probe_client = reqwest::Client::builder()
            .timeout(timing.probe_timeout)
            .build()?;
        let replicate_client = reqwest::Client::builder()
            .timeout(timing.replication_timeout)
            .build()?;
        Ok(Self {
            probe_client,
            replicate_client,
        })
    }

    pub fn ping_url(peer: &Peer) -> String {
        format!("{}/ping", peer.base_url())
    }

    pub fn replicate_url(peer: &Peer, key: &str, value: &str) -> String {
        format!(
            "{}/internal/replicate/{}/{}",
            peer.base_url(),
            encode_segment(key),
            encode_segment(value)
        )
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn probe(&self, peer: &Peer) -> Result<()> {
        self.probe_client
            .get(Self::ping_url(peer))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn replicate(&self, peer: &Peer, key: &str, value: &str) -> Result<()> {
        self.replicate_client
            .post(Self::replicate_url(peer, key, value))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
