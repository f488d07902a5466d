//! HTTP API for a node
//!
//! Wire contract shared with every other node and with clients:
//! - `GET  /ping`
//! - `POST /data/:key/:value`
//! - `GET  /data/:key`
//! - `POST /internal/replicate/:key/:value`
//!
//! Plus read-only `/status`, `/health` and `/metrics`.

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{timestamp_now, Error, NodeId};
use crate::coordinator::context::NodeContext;
use crate::coordinator::leadership::alive_set;
use crate::coordinator::router::WriteRouter;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;

#[derive(Clone)]
pub struct NodeState {
    pub ctx: Arc<NodeContext>,
    pub router: Arc<WriteRouter>,
}

impl NodeState {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        let router = Arc::new(WriteRouter::new(ctx.clone()));
        Self { ctx, router }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        match self {
            Error::NotLeader { redirect, .. } => (
                status,
                [(header::LOCATION, redirect.clone())],
                format!("Redirecting to leader at {}", redirect),
            )
                .into_response(),
            // Plain text bodies, as clients and peers expect
            Error::KeyNotFound { node, .. } => {
                (status, format!("Key not found on Node {}", node)).into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

pub fn create_router(ctx: Arc<NodeContext>) -> Router {
    let metrics = ctx.metrics.clone();
    Router::new()
        .route("/ping", get(ping))
        .route("/data/:key/:value", post(put_data))
        .route("/data/:key", get(get_data))
        .route("/internal/replicate/:key/:value", post(replicate))
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route_layer(middleware::from_fn_with_state(
            metrics,
            request_tracing_middleware,
        ))
        .with_state(NodeState::new(ctx))
}

async fn ping(State(state): State<NodeState>) -> String {
    format!("Pong from {}", state.ctx.id())
}

async fn put_data(
    State(state): State<NodeState>,
    Path((key, value)): Path<(String, String)>,
) -> Result<String, Error> {
    let accepted = state.router.write(key.clone(), value.clone())?;
    // Deliveries stay detached; the client gets its answer now
    Ok(format!(
        "Saved {}={} on leader {}",
        key, value, accepted.leader
    ))
}

async fn get_data(
    State(state): State<NodeState>,
    Path(key): Path<String>,
) -> Result<String, Error> {
    state.router.read(&key)
}

async fn replicate(
    State(state): State<NodeState>,
    Path((key, value)): Path<(String, String)>,
) -> StatusCode {
    state.router.apply_replicated(key, value);
    StatusCode::OK
}

#[derive(Debug, Serialize)]
struct PeerStatus {
    id: NodeId,
    host: String,
    alive: bool,
    last_seen_ms_ago: Option<u64>,
}

#[derive(Debug, Serialize)]
struct NodeStatus {
    node_id: NodeId,
    leader: Option<NodeId>,
    is_leader: bool,
    alive: Vec<NodeId>,
    peers: Vec<PeerStatus>,
    keys: usize,
    uptime_seconds: u64,
    timestamp: u64,
}

async fn status(State(state): State<NodeState>) -> Json<NodeStatus> {
    let ctx = &state.ctx;
    let now = Instant::now();
    let seen = ctx.liveness.snapshot();
    let alive = alive_set(ctx.id(), &seen, now, ctx.timing.staleness);

    let peers = ctx
        .peers
        .iter()
        .map(|peer| PeerStatus {
            id: peer.id,
            host: peer.host.clone(),
            alive: alive.contains(&peer.id),
            last_seen_ms_ago: seen
                .get(&peer.id)
                .map(|at| {
                    u64::try_from(now.saturating_duration_since(*at).as_millis())
                        .unwrap_or(u64::MAX)
                }),
        })
        .collect();

    Json(NodeStatus {
        node_id: ctx.id(),
        leader: ctx.leader.get(),
        is_leader: ctx.is_leader(),
        alive: alive.into_iter().collect(),
        peers,
        keys: ctx.store.len(),
        uptime_seconds: ctx.metrics.uptime_seconds(),
        timestamp: timestamp_now(),
    })
}

async fn health(State(state): State<NodeState>) -> impl IntoResponse {
    let role = if state.ctx.is_leader() {
        "Leader"
    } else {
        "Follower"
    };

    Json(json!({
        "status": "healthy",
        "node_id": state.ctx.id(),
        "role": role,
        "is_leader": state.ctx.is_leader(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics_endpoint(State(state): State<NodeState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.ctx.metrics.to_prometheus(),
    )
}
