//! Node server: HTTP API plus the two background loops

use crate::common::{Config, Result};
use crate::coordinator::context::NodeContext;
use crate::coordinator::http::create_router;
use crate::coordinator::leadership::LeadershipResolver;
use crate::coordinator::liveness::LivenessTracker;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Running liveness and leadership loops.
///
/// Dropping this handle closes the shutdown channel, which also stops both
/// loops; [`BackgroundTasks::shutdown`] additionally waits for them.
pub struct BackgroundTasks {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Background task ended abnormally: {}", e);
            }
        }
    }
}

pub struct Coordinator {
    ctx: Arc<NodeContext>,
}

impl Coordinator {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            ctx: NodeContext::from_config(config)?,
        })
    }

    pub fn from_context(ctx: Arc<NodeContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<NodeContext> {
        &self.ctx
    }

    /// Spawn the liveness tracker and the leadership resolver.
    pub fn start(&self) -> BackgroundTasks {
        let (tx, rx) = watch::channel(false);
        let handles = vec![
            LivenessTracker::new(self.ctx.clone()).spawn(rx.clone()),
            LeadershipResolver::new(self.ctx.clone()).spawn(rx),
        ];
        BackgroundTasks {
            shutdown: tx,
            handles,
        }
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.ctx.identity.addr).await?;
        self.serve_on(listener, signal).await
    }

    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        tracing::info!("Starting node {}", self.ctx.id());
        tracing::info!("  HTTP API: {}", local);
        tracing::info!("  Peers: {}", self.ctx.peers.len());
        for peer in &self.ctx.peers {
            tracing::info!("    {}", peer);
        }
        tracing::info!(
            "  Probe every {:?}, resolve every {:?}, stale after {:?}",
            self.ctx.timing.probe_interval,
            self.ctx.timing.election_interval,
            self.ctx.timing.staleness
        );

        let tasks = self.start();
        let router = create_router(self.ctx.clone());

        tracing::info!("✓ Node {} ready", self.ctx.id());

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await;

        tracing::info!("Stopping background loops");
        tasks.shutdown().await;

        served?;
        Ok(())
    }
}
