//! REST API handlers for the Wikigraph server

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use wikigraph_core::{
    GraphExport, GraphOption, GraphView, IndexError, IndexStats, apply_search_filter, global_view,
    local_view,
};

use crate::ServerState;

/// Query parameters for `/api/graph`
#[derive(Debug, Default, Deserialize)]
pub struct GraphQuery {
    pub forward: Option<bool>,
    pub backward: Option<bool>,
    pub search: Option<String>,
}

/// Query parameters for `/api/graph/local`
#[derive(Debug, Deserialize)]
pub struct LocalGraphQuery {
    pub path: String,
    pub forward: Option<bool>,
    pub backward: Option<bool>,
    pub search: Option<String>,
}

fn graph_option(forward: Option<bool>, backward: Option<bool>) -> GraphOption {
    let defaults = GraphOption::default();
    GraphOption {
        forward_links: forward.unwrap_or(defaults.forward_links),
        backward_links: backward.unwrap_or(defaults.backward_links),
    }
}

fn filtered(view: &GraphView, search: Option<&str>) -> GraphExport {
    match search.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => apply_search_filter(view, query).to_export(),
        None => view.to_export(),
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub stats: IndexStats,
    /// Rebuild count of the cached global view
    pub view_sequence: Option<u64>,
}

/// Error returned by the API
#[derive(Debug)]
pub struct ApiError(IndexError);

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            IndexError::DocumentNotTracked(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Get the global graph as an export document
pub async fn get_graph(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<GraphQuery>,
) -> Json<GraphExport> {
    let option = graph_option(query.forward, query.backward);

    if let Some(cached) = state.view_cache.current().filter(|c| c.option == option) {
        return Json(filtered(&cached.view, query.search.as_deref()));
    }

    let index = state.indexer.index();
    let index = index.read().await;
    let view = global_view(&index, option);
    Json(filtered(&view, query.search.as_deref()))
}

/// Get the neighborhood of one document
pub async fn get_local_graph(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LocalGraphQuery>,
) -> Result<Json<GraphExport>, ApiError> {
    let option = graph_option(query.forward, query.backward);
    let index = state.indexer.index();
    let index = index.read().await;
    let view = local_view(&index, &query.path, option)?;
    Ok(Json(filtered(&view, query.search.as_deref())))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let stats = state.indexer.index().read().await.stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stats,
        view_sequence: state.view_cache.current().map(|c| c.sequence),
    })
}
