//! HTTP + WebSocket server exposing graph exports to a renderer

pub mod router;
pub mod handlers;
pub mod websocket;


use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use wikigraph_core::{GraphOption, SubscriptionId, ViewCache};
use wikigraph_indexer::Indexer;

use crate::websocket::GraphBroadcaster;

/// Where the server listens
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared state handed to every handler
pub struct ServerState {
    pub indexer: Arc<Indexer>,
    pub view_cache: Arc<ViewCache>,
    /// Serialized WebSocket messages for all connected clients
    pub events_tx: broadcast::Sender<String>,
    subscription: SubscriptionId,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("indexer", &self.indexer)
            .field("clients", &self.events_tx.receiver_count())
            .finish()
    }
}

impl ServerState {
    /// Subscribe to `indexer`'s index and build the initial global view.
    pub async fn new(indexer: Arc<Indexer>) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        let view_cache = Arc::new(ViewCache::new(GraphOption::default()));

        let index = indexer.index();
        let mut index = index.write().await;
        view_cache.rebuild(&index);
        let subscription = index.subscribe(Arc::new(GraphBroadcaster::new(
            Arc::clone(&view_cache),
            events_tx.clone(),
        )));
        drop(index);

        Self {
            indexer,
            view_cache,
            events_tx,
            subscription,
        }
    }

    /// Send a message to all connected WebSocket clients
    pub fn broadcast(&self, msg: String) -> Result<usize, broadcast::error::SendError<String>> {
        self.events_tx.send(msg)
    }

    /// Stop receiving index events.
    pub async fn detach(&self) {
        self.indexer.index().write().await.unsubscribe(self.subscription);
    }
}

/// The Wikigraph HTTP server
pub struct WikigraphServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl WikigraphServer {
    pub async fn new(indexer: Arc<Indexer>, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(ServerState::new(indexer).await),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Serve until the process exits
    pub async fn start(self) -> Result<()> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn start_with_shutdown(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let address = self.config.address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {}", address))?;
        tracing::info!("Wikigraph server listening on http://{}", address);

        let app = router::create_router(Arc::clone(&self.state));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("server error")?;

        self.state.detach().await;
        tracing::info!("Wikigraph server stopped");
        Ok(())
    }
}
