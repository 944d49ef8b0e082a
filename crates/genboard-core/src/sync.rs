//! WebSocket client for collaboration.
//!
//! Wire protocol and background-thread client for talking to the relay
//! server. CRDT payloads travel as base64 strings inside JSON frames.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent to the server
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

/// Messages received from the server
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

/// Ephemeral presence state for a peer.
///
/// Carried alongside the CRDT channel, never merged into the shared
/// document and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AwarenessState {
    pub user_id: String,
    pub name: String,
    /// Presence color, as a CSS hex string.
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected_ids: Vec<Uuid>,
}

/// Cursor position in world coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the WebSocket client
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Connected to server
    Connected,
    /// Disconnected from server
    Disconnected,
    /// Joined a room
    JoinedRoom {
        room: String,
        peer_count: usize,
        initial_sync: Option<Vec<u8>>,
    },
    /// A peer joined the room
    PeerJoined { peer_id: String },
    /// A peer left the room
    PeerLeft { peer_id: String },
    /// Received sync data from a peer
    SyncReceived { from: String, data: Vec<u8> },
    /// Received awareness update from a peer
    AwarenessReceived {
        from: String,
        peer_id: u64,
        state: AwarenessState,
    },
    /// Error occurred
    Error { message: String },
}

/// Encode CRDT bytes for transport.
pub fn encode_payload(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode a transport payload back to CRDT bytes.
pub fn decode_payload(input: &str) -> Option<Vec<u8>> {
    BASE64.decode(input).ok()
}

fn event_from_server_message(msg: ServerMessage) -> Option<SyncEvent> {
    let event = match msg {
        ServerMessage::Joined {
            room,
            peer_count,
            initial_sync,
        } => {
            let data = initial_sync.and_then(|s| decode_payload(&s));
            SyncEvent::JoinedRoom {
                room,
                peer_count,
                initial_sync: data,
            }
        }
        ServerMessage::PeerJoined { peer_id } => SyncEvent::PeerJoined { peer_id },
        ServerMessage::PeerLeft { peer_id } => SyncEvent::PeerLeft { peer_id },
        ServerMessage::Sync { from, data } => {
            let bytes = decode_payload(&data)?;
            SyncEvent::SyncReceived { from, data: bytes }
        }
        ServerMessage::Awareness {
            from,
            peer_id,
            state,
        } => SyncEvent::AwarenessReceived {
            from,
            peer_id,
            state,
        },
        ServerMessage::Error { message } => SyncEvent::Error { message },
    };
    Some(event)
}

/// Truncate a frame for debug logging without splitting a multibyte
/// character. Frames carry user-supplied text (names, object content), so
/// byte 100 can land mid-character.
fn log_preview(frame: &str) -> &str {
    if frame.len() <= 100 {
        return frame;
    }
    let mut end = 100;
    while !frame.is_char_boundary(end) {
        end -= 1;
    }
    &frame[..end]
}

mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client backed by a background thread.
    ///
    /// The thread owns the socket; callers send commands and drain events
    /// through channels so the canvas loop never blocks on the network.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<SyncEvent>,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SyncEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        /// Create a new disconnected WebSocket client.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a WebSocket server.
        pub fn connect(&mut self, url: &str) -> Result<(), String> {
            if self.cmd_tx.is_some() {
                return Err("Already connected".to_string());
            }

            let parsed_url = Url::parse(url).map_err(|e| format!("Invalid URL: {}", e))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(format!(
                    "Invalid WebSocket URL scheme: {}",
                    parsed_url.scheme()
                ));
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();

            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("WebSocket thread: connecting to {}", url);

                match connect(&url) {
                    Ok((mut socket, response)) => {
                        log::info!("WebSocket connected, status: {}", response.status());
                        let _ = event_tx.send(SyncEvent::Connected);

                        // Short read timeout so the loop can interleave
                        // outgoing commands with socket reads.
                        {
                            let stream = socket.get_mut();
                            match stream {
                                tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
                                    let _ =
                                        tcp.set_read_timeout(Some(Duration::from_millis(50)));
                                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                                }
                                #[allow(unreachable_patterns)]
                                _ => {
                                    log::debug!("non-plain stream, relying on read errors");
                                }
                            }
                        }

                        loop {
                            match cmd_rx.try_recv() {
                                Ok(WsCommand::Send(msg)) => {
                                    log::debug!("WebSocket sending: {}", log_preview(&msg));
                                    if let Err(e) = socket.send(Message::Text(msg)) {
                                        log::error!("WebSocket send error: {}", e);
                                        break;
                                    }
                                }
                                Ok(WsCommand::Close) => {
                                    log::info!("WebSocket close requested");
                                    let _ = socket.close(None);
                                    break;
                                }
                                Err(TryRecvError::Disconnected) => {
                                    log::info!("WebSocket command channel disconnected");
                                    break;
                                }
                                Err(TryRecvError::Empty) => {}
                            }

                            match socket.read() {
                                Ok(Message::Text(txt)) => {
                                    log::debug!("WebSocket received: {}", log_preview(&txt));
                                    match serde_json::from_str::<ServerMessage>(&txt) {
                                        Ok(server_msg) => {
                                            if let Some(event) =
                                                event_from_server_message(server_msg)
                                            {
                                                let _ = event_tx.send(event);
                                            }
                                        }
                                        Err(_) => {
                                            log::warn!("Failed to parse server message: {}", txt);
                                        }
                                    }
                                }
                                Ok(Message::Ping(data)) => {
                                    let _ = socket.send(Message::Pong(data));
                                }
                                Ok(Message::Close(_)) => {
                                    log::info!("WebSocket received close frame");
                                    break;
                                }
                                Ok(_) => {}
                                Err(tungstenite::Error::Io(ref e))
                                    if e.kind() == std::io::ErrorKind::WouldBlock
                                        || e.kind() == std::io::ErrorKind::TimedOut =>
                                {
                                    continue;
                                }
                                Err(e) => {
                                    log::error!("WebSocket read error: {}", e);
                                    break;
                                }
                            }
                        }

                        log::info!("WebSocket thread exiting");
                        let _ = event_tx.send(SyncEvent::Disconnected);
                    }
                    Err(e) => {
                        log::error!("WebSocket connection failed: {}", e);
                        let _ = event_tx.send(SyncEvent::Error {
                            message: format!("Connection failed: {}", e),
                        });
                    }
                }
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Send a text message.
        pub fn send(&self, msg: &str) -> Result<(), String> {
            if let Some(ref tx) = self.cmd_tx {
                tx.send(WsCommand::Send(msg.to_string()))
                    .map_err(|e| format!("Send failed: {}", e))
            } else {
                Err("Not connected".to_string())
            }
        }

        /// Poll for pending events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        SyncEvent::Connected => self.state = ConnectionState::Connected,
                        SyncEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        SyncEvent::Error { .. } => self.state = ConnectionState::Error,
                        _ => {}
                    }
                    self.events.push(event);
                }
            }

            std::mem::take(&mut self.events)
        }

        /// Get current connection state.
        pub fn state(&self) -> ConnectionState {
            self.state
        }

        /// Check if connected.
        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

pub use native_client::NativeWebSocket;
