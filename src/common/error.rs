//! Error types for beaconkv

use crate::common::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Coordination Errors ===
    #[error("Peer {peer} unreachable: {reason}")]
    ProbeUnreachable { peer: NodeId, reason: String },

    #[error("No leader elected yet. Try again later.")]
    NoLeaderKnown,

    #[error("Not leader: current leader is node {leader_id}")]
    NotLeader { leader_id: NodeId, redirect: String },

    #[error("No address for leader node {leader_id}")]
    LeaderUnaddressable { leader_id: NodeId },

    #[error("Replication to node {peer} failed: {reason}")]
    ReplicationDeliveryFailed { peer: NodeId, reason: String },

    // === Storage Errors ===
    #[error("Key not found on Node {node}: {key}")]
    KeyNotFound { node: NodeId, key: String },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid peer hostname '{host}': {reason}")]
    InvalidPeer { host: String, reason: String },

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NoLeaderKnown
                | Error::NotLeader { .. }
                | Error::ProbeUnreachable { .. }
                | Error::ReplicationDeliveryFailed { .. }
        )
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::KeyNotFound { .. } => StatusCode::NOT_FOUND,
            Error::NotLeader { .. } => StatusCode::TEMPORARY_REDIRECT,
            Error::NoLeaderKnown => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidConfig(_) | Error::InvalidPeer { .. } => StatusCode::BAD_REQUEST,
            Error::ProbeUnreachable { .. } | Error::ReplicationDeliveryFailed { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
