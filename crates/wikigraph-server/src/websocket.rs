//! WebSocket handling for real-time graph updates

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use wikigraph_core::{GraphExport, IndexEvent, IndexObserver, LinkIndex, ViewCache};

use crate::ServerState;

/// WebSocket message types for client-server communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// Client requests the full graph
    #[serde(rename = "request_full_graph")]
    RequestFullGraph,
    /// Server sends the full graph
    #[serde(rename = "full_graph")]
    FullGraph { graph: GraphExport },
    /// Server broadcasts an index change and the refreshed global graph
    #[serde(rename = "graph_changed")]
    GraphChanged { event: IndexEvent, graph: GraphExport },
    /// Ping/pong for keepalive
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
}

/// Index observer that refreshes the cached view and pushes it to clients
pub struct GraphBroadcaster {
    cache: Arc<ViewCache>,
    tx: broadcast::Sender<String>,
}

impl GraphBroadcaster {
    pub fn new(cache: Arc<ViewCache>, tx: broadcast::Sender<String>) -> Self {
        Self { cache, tx }
    }
}

impl IndexObserver for GraphBroadcaster {
    fn on_event(&self, event: &IndexEvent, index: &LinkIndex) {
        let cached = self.cache.rebuild(index);
        let message = WsMessage::GraphChanged {
            event: event.clone(),
            graph: cached.view.to_export(),
        };
        match serde_json::to_string(&message) {
            // No receivers just means no WebSocket clients connected
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => warn!("Failed to serialize graph change: {}", e),
        }
    }
}

fn full_graph_message(state: &ServerState) -> Option<String> {
    let cached = state.view_cache.current()?;
    let message = WsMessage::FullGraph {
        graph: cached.view.to_export(),
    };
    match serde_json::to_string(&message) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to serialize full graph message: {}", e);
            None
        }
    }
}

/// Handle WebSocket upgrade requests
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("New WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events_tx.subscribe();

    // Send full graph immediately after connection
    if let Some(json) = full_graph_message(&state) {
        if sender.send(Message::Text(json)).await.is_err() {
            warn!("Failed to send initial full graph to WebSocket client");
            return;
        }
        debug!("Sent full graph to WebSocket client");
    }

    // Replies to this client only
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();

    let state_clone = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!("Received WebSocket message: {}", text);
                    let reply = match serde_json::from_str::<WsMessage>(&text) {
                        Ok(ws_msg) => handle_client_message(ws_msg, &state_clone),
                        Err(e) => {
                            warn!("Failed to parse WebSocket message: {}", e);
                            serde_json::to_string(&WsMessage::Error {
                                message: e.to_string(),
                            })
                            .ok()
                        }
                    };
                    if let Some(reply) = reply {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
                Message::Close(_) => {
                    debug!("WebSocket client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                broadcasted = rx.recv() => match broadcasted {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("WebSocket client lagged behind by {} messages", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };
            if sender.send(Message::Text(msg)).await.is_err() {
                debug!("Failed to send message to WebSocket client");
                break;
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket connection closed");
}

/// Handle a client message, returning the reply to send back
fn handle_client_message(msg: WsMessage, state: &ServerState) -> Option<String> {
    match msg {
        WsMessage::RequestFullGraph => {
            debug!("Client requested full graph");
            full_graph_message(state)
        }
        WsMessage::Ping => serde_json::to_string(&WsMessage::Pong).ok(),
        other => {
            debug!("Ignoring client message: {:?}", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::sample_state;
    use wikigraph_core::DocPath;

    #[test]
    fn test_ws_message_serialization() {
        let json = serde_json::to_string(&WsMessage::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);

        let msg: WsMessage = serde_json::from_str(r#"{"type":"request_full_graph"}"#).unwrap();
        assert!(matches!(msg, WsMessage::RequestFullGraph));
    }

    #[tokio::test]
    async fn test_client_requests() {
        let state = sample_state().await;

        let reply = handle_client_message(WsMessage::Ping, &state).unwrap();
        assert_eq!(reply, r#"{"type":"pong"}"#);

        let reply = handle_client_message(WsMessage::RequestFullGraph, &state).unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["type"], "full_graph");
        assert_eq!(
            value["graph"]["results"][0]["data"][0]["graph"]["nodes"].as_array().unwrap().len(),
            4
        );

        assert!(handle_client_message(WsMessage::Pong, &state).is_none());
    }

    #[tokio::test]
    async fn test_index_changes_are_broadcast() {
        let state = sample_state().await;
        let mut rx = state.events_tx.subscribe();

        state.indexer.remove(&DocPath::new("/C.md")).await;

        let message: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(message["type"], "graph_changed");
        assert_eq!(message["event"]["kind"], "deleted");
        assert_eq!(message["event"]["path"], "/C.md");
        let nodes = message["graph"]["results"][0]["data"][0]["graph"]["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(state.view_cache.rebuild_count(), 2);
    }
}
