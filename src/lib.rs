//! # beaconkv
//!
//! A small cluster coordinator for a fixed set of nodes:
//! - heartbeat liveness over HTTP `GET /ping`
//! - leader = highest id among the nodes seen recently
//! - an in-memory key-value store whose writes go through the leader and
//!   are replicated best-effort to every peer
//!
//! There is no consensus, no log and no persistence. Two nodes with
//! different views of the cluster can both act as leader.
//!
//! ## Usage
//!
//! ### Start a node
//! ```bash
//! NODE_ID=1 PEERS=node-2,node-3 beaconkv-node
//! ```
//!
//! ### Use the CLI
//! ```bash
//! beaconkv --node http://localhost:7001 put color blue
//! beaconkv --node http://localhost:7002 get color
//! beaconkv --node http://localhost:7003 status
//! ```

#![allow(clippy::result_large_err)]

pub mod common;
pub mod coordinator;

// Re-export commonly used types
pub use common::{Config, Error, NodeId, Result};
pub use coordinator::Coordinator;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
