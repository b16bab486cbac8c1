//! Axum router setup for the Wikigraph server

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use crate::{
    ServerState,
    handlers::{get_graph, get_local_graph, health_check},
    websocket::ws_handler,
};

/// Create the axum router with all routes
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        // WebSocket endpoint for real-time updates
        .route("/ws", get(ws_handler))
        // REST API endpoints
        .route("/api/graph", get(get_graph))
        .route("/api/graph/local", get(get_local_graph))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
