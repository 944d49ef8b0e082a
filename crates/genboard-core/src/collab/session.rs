//! Room sessions bridging the shared document, presence, and the relay.

use crate::collab::SharedDoc;
use crate::object::{CanvasObject, ObjectId, ObjectPatch};
use crate::sync::{
    AwarenessState, ClientMessage, ConnectionState, CursorPosition, NativeWebSocket, SyncEvent,
    encode_payload,
};
use std::collections::HashMap;

/// Prefix for relay room names, so one relay can host multiple apps.
pub const ROOM_NAMESPACE: &str = "genboard";

/// Presence colors, assigned per user id.
pub const COLOR_PALETTE: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#FFD93D", "#95E1D3", "#C084FC", "#60A5FA", "#F472B6", "#34D399",
];

/// Default relay endpoint for local development.
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3030/ws";

fn pick_color(user_id: &str) -> &'static str {
    let hash = user_id
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    COLOR_PALETTE[hash % COLOR_PALETTE.len()]
}

/// Handle returned by the subscription methods; pass back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type ObjectsCallback = Box<dyn FnMut(&[CanvasObject]) + Send>;
type AwarenessCallback = Box<dyn FnMut(&[AwarenessState]) + Send>;

/// A collaborative editing session for one room.
///
/// Owns the shared document and the relay connection. Local mutations go
/// through this type so they hit the CRDT and the wire in one step; call
/// `poll` from the app loop to apply remote changes and presence updates.
pub struct CollabSession {
    doc: SharedDoc,
    socket: NativeWebSocket,
    room_id: String,
    current_room: Option<String>,
    awareness: AwarenessState,
    /// Remote presence, keyed by the relay's connection id.
    peers: HashMap<String, AwarenessState>,
    objects_callbacks: Vec<(u64, ObjectsCallback)>,
    awareness_callbacks: Vec<(u64, AwarenessCallback)>,
    next_subscription: u64,
}

impl CollabSession {
    /// Create a session for a room. Does not connect yet.
    pub fn new(
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        let awareness = AwarenessState {
            color: pick_color(&user_id).to_string(),
            user_id,
            name: user_name.into(),
            cursor: None,
            selected_ids: Vec::new(),
        };
        Self {
            doc: SharedDoc::new(),
            socket: NativeWebSocket::new(),
            room_id: room_id.into(),
            current_room: None,
            awareness,
            peers: HashMap::new(),
            objects_callbacks: Vec::new(),
            awareness_callbacks: Vec::new(),
            next_subscription: 0,
        }
    }

    /// The namespaced room name sent to the relay.
    pub fn room_name(&self) -> String {
        format!("{}-{}", ROOM_NAMESPACE, self.room_id)
    }

    /// This session's CRDT peer id.
    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    /// This user's presence state.
    pub fn awareness(&self) -> &AwarenessState {
        &self.awareness
    }

    /// Access the shared document.
    pub fn doc(&self) -> &SharedDoc {
        &self.doc
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.socket.state()
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_connected()
    }

    /// Whether the relay has confirmed the room join.
    pub fn is_in_room(&self) -> bool {
        self.current_room.is_some()
    }

    /// Connect to the relay and request to join the room.
    ///
    /// The join is queued behind the connection handshake; the room is
    /// confirmed when `poll` yields `SyncEvent::JoinedRoom`.
    pub fn connect(&mut self, url: &str) -> Result<(), String> {
        self.socket.connect(url)?;
        self.send(&ClientMessage::Join {
            room: self.room_name(),
        });
        self.send_awareness();
        Ok(())
    }

    /// Leave the room, drop the connection, and discard the replicated
    /// document. Presence for other peers is cleared immediately, so
    /// `get_other_users` on a torn-down session reports nobody.
    pub fn disconnect(&mut self) {
        if self.current_room.is_some() {
            self.send(&ClientMessage::Leave);
        }
        self.socket.disconnect();
        self.current_room = None;
        self.peers.clear();
        self.doc = SharedDoc::new();
    }

    // --- Object operations, mirrored to the wire ---

    /// Add an object to the shared document and broadcast.
    pub fn add_object(&mut self, object: &CanvasObject) {
        if let Err(e) = self.doc.put_object(object) {
            log::error!("CRDT insert failed: {}", e);
            return;
        }
        self.broadcast_sync();
    }

    /// Patch an object in the shared document and broadcast.
    pub fn update_object(&mut self, id: ObjectId, patch: &ObjectPatch) {
        if let Err(e) = self.doc.patch_object(id, patch) {
            log::error!("CRDT update failed: {}", e);
            return;
        }
        self.broadcast_sync();
    }

    /// Remove an object from the shared document and broadcast.
    pub fn remove_object(&mut self, id: ObjectId) {
        if let Err(e) = self.doc.remove_object(id) {
            log::error!("CRDT delete failed: {}", e);
            return;
        }
        self.broadcast_sync();
    }

    // --- Presence ---

    /// Update the local cursor position (world coordinates).
    pub fn set_cursor(&mut self, x: f64, y: f64) {
        self.awareness.cursor = Some(CursorPosition { x, y });
        self.send_awareness();
    }

    /// Clear the local cursor, e.g. when the pointer leaves the canvas.
    pub fn clear_cursor(&mut self) {
        self.awareness.cursor = None;
        self.send_awareness();
    }

    /// Broadcast the local selection.
    pub fn set_selected(&mut self, ids: Vec<ObjectId>) {
        self.awareness.selected_ids = ids;
        self.send_awareness();
    }

    /// Presence of the other peers in the room. Empty when disconnected.
    pub fn get_other_users(&self) -> Vec<AwarenessState> {
        self.peers.values().cloned().collect()
    }

    // --- Change subscriptions ---

    /// Register a callback fired whenever remote edits change the object
    /// set. The callback receives the full merged object list.
    pub fn on_objects_change(
        &mut self,
        callback: impl FnMut(&[CanvasObject]) + Send + 'static,
    ) -> Subscription {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.objects_callbacks.push((id, Box::new(callback)));
        Subscription(id)
    }

    /// Register a callback fired whenever peer presence changes.
    pub fn on_awareness_change(
        &mut self,
        callback: impl FnMut(&[AwarenessState]) + Send + 'static,
    ) -> Subscription {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.awareness_callbacks.push((id, Box::new(callback)));
        Subscription(id)
    }

    /// Remove a previously registered callback.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        self.objects_callbacks.retain(|(id, _)| *id != subscription.0);
        self.awareness_callbacks.retain(|(id, _)| *id != subscription.0);
    }

    // --- Event pump ---

    /// Drain socket events, fold remote updates into the document and the
    /// peer table, and fire subscriptions. Returns the raw events for
    /// callers that want connection-state details.
    pub fn poll(&mut self) -> Vec<SyncEvent> {
        let events = self.socket.poll_events();
        self.apply_events(&events);
        events
    }

    /// Fold a batch of transport events into local state: import remote
    /// CRDT bytes, update the peer table, and fire subscriptions.
    fn apply_events(&mut self, events: &[SyncEvent]) {
        let mut objects_changed = false;
        let mut peers_changed = false;

        for event in events {
            match event {
                SyncEvent::JoinedRoom {
                    room, initial_sync, ..
                } => {
                    self.current_room = Some(room.clone());
                    if let Some(bytes) = initial_sync {
                        match self.doc.import(bytes) {
                            Ok(()) => objects_changed = true,
                            Err(e) => log::warn!("initial sync import failed: {}", e),
                        }
                    }
                    // Share anything drafted before the join confirmed.
                    if self.doc.object_count() > 0 {
                        self.broadcast_sync();
                    }
                    self.send_awareness();
                }
                SyncEvent::SyncReceived { from, data } => {
                    match self.doc.import(data) {
                        Ok(()) => objects_changed = true,
                        Err(e) => log::warn!("sync import from {} failed: {}", from, e),
                    }
                }
                SyncEvent::AwarenessReceived { from, state, .. } => {
                    self.peers.insert(from.clone(), state.clone());
                    peers_changed = true;
                }
                SyncEvent::PeerLeft { peer_id } => {
                    if self.peers.remove(peer_id).is_some() {
                        peers_changed = true;
                    }
                }
                SyncEvent::Disconnected => {
                    self.current_room = None;
                    if !self.peers.is_empty() {
                        self.peers.clear();
                        peers_changed = true;
                    }
                }
                _ => {}
            }
        }

        if objects_changed {
            let objects = self.doc.objects();
            for (_, callback) in &mut self.objects_callbacks {
                callback(&objects);
            }
        }
        if peers_changed {
            let peers: Vec<AwarenessState> = self.peers.values().cloned().collect();
            for (_, callback) in &mut self.awareness_callbacks {
                callback(&peers);
            }
        }
    }

    fn broadcast_sync(&mut self) {
        if !self.is_in_room() {
            return;
        }
        let data = encode_payload(&self.doc.export_snapshot());
        self.send(&ClientMessage::Sync { data });
    }

    fn send_awareness(&mut self) {
        let msg = ClientMessage::Awareness {
            peer_id: self.doc.peer_id(),
            state: self.awareness.clone(),
        };
        self.send(&msg);
    }

    fn send(&self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = self.socket.send(&json) {
                    log::debug!("send skipped: {}", e);
                }
            }
            Err(e) => log::error!("message serialization failed: {}", e),
        }
    }
}

impl Drop for CollabSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_room_name_is_namespaced() {
        let session = CollabSession::new("design-review", "u1", "Ada");
        assert_eq!(session.room_name(), "genboard-design-review");
    }

    #[test]
    fn test_color_assignment_is_stable() {
        let a = CollabSession::new("r", "alice", "Alice");
        let b = CollabSession::new("r", "alice", "Alice");
        assert_eq!(a.awareness().color, b.awareness().color);
        assert!(COLOR_PALETTE.contains(&a.awareness().color.as_str()));
    }

    #[test]
    fn test_local_edits_apply_without_connection() {
        let mut session = CollabSession::new("r", "u1", "Ada");
        let object = CanvasObject::text("offline", 0.0, 0.0);
        session.add_object(&object);

        assert_eq!(session.doc().object_count(), 1);

        session.update_object(object.id, &ObjectPatch::position(9.0, 9.0));
        assert_eq!(session.doc().get_object(object.id).unwrap().x, 9.0);

        session.remove_object(object.id);
        assert_eq!(session.doc().object_count(), 0);
    }

    #[test]
    fn test_other_users_empty_after_disconnect() {
        let mut session = CollabSession::new("r", "u1", "Ada");
        session.add_object(&CanvasObject::text("gone", 0.0, 0.0));
        session.disconnect();
        assert!(session.get_other_users().is_empty());
        assert!(!session.is_in_room());
        // Teardown also discards the replicated document.
        assert_eq!(session.doc().object_count(), 0);
    }

    #[test]
    fn test_remote_sync_fires_objects_callback() {
        let mut remote = SharedDoc::new();
        let object = CanvasObject::text("from peer", 10.0, 20.0);
        remote.put_object(&object).unwrap();

        let mut session = CollabSession::new("r", "u1", "Ada");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        session.on_objects_change(move |objects| {
            *seen_cb.lock().unwrap() = objects.to_vec();
        });

        session.apply_events(&[SyncEvent::SyncReceived {
            from: "conn-1".to_string(),
            data: remote.export_snapshot(),
        }]);

        // The bytes were imported and the callback saw the merged state.
        assert_eq!(session.doc().object_count(), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, object.id);
    }

    #[test]
    fn test_joined_room_imports_initial_sync() {
        let mut remote = SharedDoc::new();
        let object = CanvasObject::text("history", 0.0, 0.0);
        remote.put_object(&object).unwrap();

        let mut session = CollabSession::new("r", "u1", "Ada");
        session.apply_events(&[SyncEvent::JoinedRoom {
            room: "genboard-r".to_string(),
            peer_count: 2,
            initial_sync: Some(remote.export_snapshot()),
        }]);

        assert!(session.is_in_room());
        assert_eq!(session.doc().object_count(), 1);
        assert!(session.doc().get_object(object.id).is_some());
    }

    #[test]
    fn test_awareness_events_update_peer_table() {
        let mut session = CollabSession::new("r", "u1", "Ada");
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let snapshots_cb = snapshots.clone();
        session.on_awareness_change(move |peers| {
            snapshots_cb.lock().unwrap().push(peers.to_vec());
        });

        let peer_state = AwarenessState {
            user_id: "u2".to_string(),
            name: "Grace".to_string(),
            color: "#4ECDC4".to_string(),
            cursor: Some(CursorPosition { x: 1.0, y: 2.0 }),
            selected_ids: Vec::new(),
        };
        session.apply_events(&[SyncEvent::AwarenessReceived {
            from: "conn-2".to_string(),
            peer_id: 42,
            state: peer_state.clone(),
        }]);
        assert_eq!(session.get_other_users(), vec![peer_state]);

        session.apply_events(&[SyncEvent::PeerLeft {
            peer_id: "conn-2".to_string(),
        }]);
        assert!(session.get_other_users().is_empty());

        // One firing per change: peer arrival, then departure.
        let snapshots = snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].len(), 1);
        assert_eq!(snapshots[0][0].name, "Grace");
        assert!(snapshots[1].is_empty());
    }

    #[test]
    fn test_unsubscribe_removes_callback() {
        let mut session = CollabSession::new("r", "u1", "Ada");
        let hits = Arc::new(Mutex::new(0u32));
        let hits_cb = hits.clone();
        let sub = session.on_objects_change(move |_| {
            *hits_cb.lock().unwrap() += 1;
        });
        session.unsubscribe(sub);

        // No registered callbacks remain, so polling fires nothing.
        session.poll();
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_selection_broadcast_updates_local_state() {
        let mut session = CollabSession::new("r", "u1", "Ada");
        let id = uuid::Uuid::new_v4();
        session.set_selected(vec![id]);
        assert_eq!(session.awareness().selected_ids, vec![id]);

        session.set_cursor(3.0, 4.0);
        assert_eq!(
            session.awareness().cursor,
            Some(CursorPosition { x: 3.0, y: 4.0 })
        );
        session.clear_cursor();
        assert!(session.awareness().cursor.is_none());
    }
}
