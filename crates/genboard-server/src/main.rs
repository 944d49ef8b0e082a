//! Genboard WebSocket Relay Server
//!
//! Broadcasts CRDT updates and awareness between clients in the same room.
//!
//! ## Protocol
//!
//! Messages are JSON with the following format:
//! ```json
//! { "type": "join", "room": "genboard-room-id" }
//! { "type": "sync", "data": "<base64-encoded-loro-bytes>" }
//! { "type": "awareness", "peer_id": 123, "user_id": "u1", "name": "Ada", "color": "#FF6B6B", "cursor": { "x": 100, "y": 200 } }
//! ```

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Server configuration
const MAX_PEERS_PER_ROOM: usize = 8;
const CHANNEL_CAPACITY: usize = 256;

/// A message sent between clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room
    Join { room: String },
    /// Leave current room
    Leave,
    /// Sync CRDT data (base64 encoded Loro bytes)
    Sync { data: String },
    /// Awareness update (presence, cursor, selection)
    Awareness {
        peer_id: u64,
        #[serde(flatten)]
        state: AwarenessState,
    },
}

/// Awareness state for a peer. Relayed verbatim, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwarenessState {
    pub user_id: String,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// A message broadcast to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with current state
    Joined {
        room: String,
        peer_count: usize,
        /// Initial sync data (if room has history)
        #[serde(skip_serializing_if = "Option::is_none")]
        initial_sync: Option<String>,
    },
    /// Peer joined the room
    PeerJoined { peer_id: String },
    /// Peer left the room
    PeerLeft { peer_id: String },
    /// Sync data from another peer
    Sync { from: String, data: String },
    /// Awareness update from another peer
    Awareness {
        from: String,
        peer_id: u64,
        #[serde(flatten)]
        state: AwarenessState,
    },
    /// Error message
    Error { message: String },
}

/// Room state
struct Room {
    /// Broadcast channel for this room
    tx: broadcast::Sender<(String, ServerMessage)>,
    /// Connected peer IDs
    peers: HashSet<String>,
    /// Last sync data (for new joiners)
    last_sync: Option<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
            last_sync: None,
        }
    }
}

/// Result of a join attempt.
enum JoinOutcome {
    Joined {
        rx: broadcast::Receiver<(String, ServerMessage)>,
        initial_sync: Option<String>,
        peer_count: usize,
    },
    Full,
}

/// Shared application state
struct AppState {
    /// Active rooms
    rooms: DashMap<String, Room>,
}

impl AppState {
    fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add peer to room, rejecting when the room is at capacity.
    fn join_room(&self, room_id: &str, peer_id: &str) -> JoinOutcome {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(Room::new);
        if room.peers.len() >= MAX_PEERS_PER_ROOM && !room.peers.contains(peer_id) {
            return JoinOutcome::Full;
        }
        room.peers.insert(peer_id.to_string());
        JoinOutcome::Joined {
            rx: room.tx.subscribe(),
            initial_sync: room.last_sync.clone(),
            peer_count: room.peers.len(),
        }
    }

    /// Remove peer from room
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
            // Clean up empty rooms
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove(room_id);
            }
        }
    }

    /// Update room's last sync data
    fn update_sync(&self, room_id: &str, data: String) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.last_sync = Some(data);
        }
    }

    /// Broadcast message to room
    fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genboard_server=info,tower_http=info".into()),
        )
        .init();

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3030));
    info!("Genboard relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:3030/ws");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind failed");
    axum::serve(listener, app).await.expect("server error");
}

/// Index page
async fn index() -> &'static str {
    "Genboard Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn to_json(msg: &ServerMessage) -> String {
    serde_json::to_string(msg).unwrap_or_else(|_| "{\"type\":\"error\",\"message\":\"serialization failed\"}".to_string())
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<(String, ServerMessage)>> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                match client_msg {
                                    ClientMessage::Join { room } => {
                                        // Leave current room if any
                                        if let Some(ref old_room) = current_room {
                                            state.leave_room(old_room, &peer_id);
                                            state.broadcast(old_room, &peer_id, ServerMessage::PeerLeft {
                                                peer_id: peer_id.clone(),
                                            });
                                            current_room = None;
                                            room_rx = None;
                                        }

                                        match state.join_room(&room, &peer_id) {
                                            JoinOutcome::Joined { rx, initial_sync, peer_count } => {
                                                room_rx = Some(rx);
                                                current_room = Some(room.clone());

                                                let joined = ServerMessage::Joined {
                                                    room: room.clone(),
                                                    peer_count,
                                                    initial_sync,
                                                };
                                                if sender.send(Message::Text(to_json(&joined).into())).await.is_err() {
                                                    break;
                                                }

                                                // Notify others
                                                state.broadcast(&room, &peer_id, ServerMessage::PeerJoined {
                                                    peer_id: peer_id.clone(),
                                                });

                                                info!("Peer {} joined room {}", peer_id, room);
                                            }
                                            JoinOutcome::Full => {
                                                warn!("Peer {} rejected from full room {}", peer_id, room);
                                                let err = ServerMessage::Error {
                                                    message: format!("Room {} is full", room),
                                                };
                                                if sender.send(Message::Text(to_json(&err).into())).await.is_err() {
                                                    break;
                                                }
                                            }
                                        }
                                    }
                                    ClientMessage::Leave => {
                                        if let Some(ref room) = current_room {
                                            state.leave_room(room, &peer_id);
                                            state.broadcast(room, &peer_id, ServerMessage::PeerLeft {
                                                peer_id: peer_id.clone(),
                                            });
                                            info!("Peer {} left room {}", peer_id, room);
                                        }
                                        current_room = None;
                                        room_rx = None;
                                    }
                                    ClientMessage::Sync { data } => {
                                        if let Some(ref room) = current_room {
                                            // Store as last sync for new joiners
                                            state.update_sync(room, data.clone());
                                            // Broadcast to others
                                            state.broadcast(room, &peer_id, ServerMessage::Sync {
                                                from: peer_id.clone(),
                                                data,
                                            });
                                        }
                                    }
                                    ClientMessage::Awareness { peer_id: awareness_peer_id, state: awareness_state } => {
                                        if let Some(ref room) = current_room {
                                            state.broadcast(room, &peer_id, ServerMessage::Awareness {
                                                from: peer_id.clone(),
                                                peer_id: awareness_peer_id,
                                                state: awareness_state,
                                            });
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Invalid message from {}: {}", peer_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                let _ = sender.send(Message::Text(to_json(&err).into())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Binary frames are treated as raw sync data
                        if let Some(ref room) = current_room {
                            let data_b64 = BASE64.encode(&data);
                            state.update_sync(room, data_b64.clone());
                            state.broadcast(room, &peer_id, ServerMessage::Sync {
                                from: peer_id.clone(),
                                data: data_b64,
                            });
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Handle broadcast messages from room
            msg = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        // No room joined, just wait forever
                        std::future::pending::<Option<(String, ServerMessage)>>().await
                    }
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Don't echo back to sender
                    if from != peer_id {
                        if sender.send(Message::Text(to_json(&server_msg).into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(ref room) = current_room {
        state.leave_room(room, &peer_id);
        state.broadcast(room, &peer_id, ServerMessage::PeerLeft {
            peer_id: peer_id.clone(),
        });
    }
    info!("Connection closed: {}", peer_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_then_leave_cleans_up_room() {
        let state = AppState::new();
        assert!(matches!(
            state.join_room("genboard-a", "p1"),
            JoinOutcome::Joined { peer_count: 1, .. }
        ));
        state.leave_room("genboard-a", "p1");
        assert!(state.rooms.get("genboard-a").is_none());
    }

    #[test]
    fn test_room_capacity_rejects_ninth_peer() {
        let state = AppState::new();
        for i in 0..MAX_PEERS_PER_ROOM {
            let outcome = state.join_room("genboard-a", &format!("p{}", i));
            assert!(matches!(outcome, JoinOutcome::Joined { .. }));
        }
        assert!(matches!(
            state.join_room("genboard-a", "overflow"),
            JoinOutcome::Full
        ));
        // Rejoining an existing peer is not a capacity violation.
        assert!(matches!(
            state.join_room("genboard-a", "p0"),
            JoinOutcome::Joined { .. }
        ));
    }

    #[test]
    fn test_new_joiner_receives_last_sync() {
        let state = AppState::new();
        assert!(matches!(state.join_room("genboard-a", "p1"), JoinOutcome::Joined { .. }));
        state.update_sync("genboard-a", "AAAA".to_string());

        match state.join_room("genboard-a", "p2") {
            JoinOutcome::Joined { initial_sync, peer_count, .. } => {
                assert_eq!(initial_sync.as_deref(), Some("AAAA"));
                assert_eq!(peer_count, 2);
            }
            JoinOutcome::Full => panic!("room unexpectedly full"),
        }
    }
}
