//! Common utilities and types shared across beaconkv

pub mod config;
pub mod error;
pub mod metrics;
pub mod peer;
pub mod tracing_middleware;
pub mod utils;

pub use config::{Config, RedirectConfig, Timing};
pub use error::{Error, Result};
pub use metrics::MetricsRegistry;
pub use peer::{offset_port, parse_peer_id, NodeId, Peer, PeerSet};
pub use utils::{encode_segment, timestamp_now};
