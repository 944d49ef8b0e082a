//! Object store: the canonical in-memory scene graph.
//!
//! Owns the object array, selection, and snapshot-based undo/redo. All
//! operations are synchronous and run on the calling thread; operations on
//! missing ids are no-ops rather than errors.

use crate::object::{CanvasObject, ObjectId, ObjectPatch};
use std::collections::HashSet;

/// Maximum number of history snapshots to keep.
pub const MAX_HISTORY: usize = 50;

/// Offset applied to duplicated objects.
pub const DUPLICATE_OFFSET: f64 = 20.0;

/// The canonical scene graph plus selection and history state.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    objects: Vec<CanvasObject>,
    selection: HashSet<ObjectId>,
    /// Snapshot ring: full copies of the object array.
    history: Vec<Vec<CanvasObject>>,
    /// Cursor into `history`; always a valid index.
    history_index: usize,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    /// Create an empty store with the blank state as the first snapshot.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            selection: HashSet::new(),
            history: vec![Vec::new()],
            history_index: 0,
        }
    }

    /// Create a store over an existing object array (e.g. a loaded project).
    pub fn with_objects(objects: Vec<CanvasObject>) -> Self {
        Self {
            history: vec![objects.clone()],
            history_index: 0,
            objects,
            selection: HashSet::new(),
        }
    }

    // --- Queries ---

    pub fn objects(&self) -> &[CanvasObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&CanvasObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut CanvasObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    /// Objects in paint order, back to front.
    pub fn objects_ordered(&self) -> Vec<&CanvasObject> {
        let mut ordered: Vec<&CanvasObject> = self.objects.iter().collect();
        ordered.sort_by_key(|o| o.z_index);
        ordered
    }

    pub fn selection(&self) -> &HashSet<ObjectId> {
        &self.selection
    }

    pub fn is_selected(&self, id: ObjectId) -> bool {
        self.selection.contains(&id)
    }

    /// Selected objects in insertion order (deterministic).
    pub fn selected_objects(&self) -> Vec<&CanvasObject> {
        self.objects
            .iter()
            .filter(|o| self.selection.contains(&o.id))
            .collect()
    }

    // --- Mutations ---

    /// Add an object: assigns `z_index = max + 1` (0 if empty), appends, and
    /// records a history snapshot. Returns the object's id.
    pub fn add_object(&mut self, mut object: CanvasObject) -> ObjectId {
        object.z_index = self
            .objects
            .iter()
            .map(|o| o.z_index)
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);
        let id = object.id;
        self.objects.push(object);
        self.save_to_history();
        id
    }

    /// Shallow-merge a patch into an object. Does not snapshot history,
    /// so in-progress drags can stream updates and commit once. No-op on a
    /// missing id.
    pub fn update_object(&mut self, id: ObjectId, patch: &ObjectPatch) {
        if let Some(object) = self.get_mut(id) {
            object.apply_patch(patch);
        }
    }

    /// Delete an object, prune it from the selection, clear any child
    /// `derived_from` pointers to it, and snapshot.
    pub fn delete_object(&mut self, id: ObjectId) {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != id);
        if self.objects.len() == before {
            return;
        }
        self.selection.remove(&id);
        self.clear_derivation_pointers(id);
        self.save_to_history();
    }

    /// Delete all selected objects.
    pub fn delete_selected(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        let doomed = std::mem::take(&mut self.selection);
        self.objects.retain(|o| !doomed.contains(&o.id));
        for id in &doomed {
            self.clear_derivation_pointers(*id);
        }
        self.save_to_history();
    }

    /// Deleting a parent orphans its derivatives: their `derived_from` is
    /// cleared rather than left dangling or cascading the delete.
    fn clear_derivation_pointers(&mut self, deleted: ObjectId) {
        for object in &mut self.objects {
            if object.derived_from == Some(deleted) {
                object.derived_from = None;
            }
        }
    }

    /// Duplicate the selection: each clone keeps every field except id and
    /// z_index, offset by +20/+20. The new clones become the selection.
    pub fn duplicate_selected(&mut self) -> Vec<ObjectId> {
        let clones: Vec<CanvasObject> = self
            .selected_objects()
            .into_iter()
            .map(|source| {
                let mut copy = source.cloned_with_new_id();
                copy.x += DUPLICATE_OFFSET;
                copy.y += DUPLICATE_OFFSET;
                copy
            })
            .collect();

        let mut new_ids = Vec::with_capacity(clones.len());
        for clone in clones {
            new_ids.push(self.add_object(clone));
        }
        self.selection = new_ids.iter().copied().collect();
        new_ids
    }

    // --- Selection ---

    /// Select an object. `additive = false` replaces the selection,
    /// `additive = true` toggles membership.
    pub fn select_object(&mut self, id: ObjectId, additive: bool) {
        if self.get(id).is_none() {
            return;
        }
        if additive {
            if !self.selection.remove(&id) {
                self.selection.insert(id);
            }
        } else {
            self.selection.clear();
            self.selection.insert(id);
        }
    }

    pub fn select_all(&mut self) {
        self.selection = self.objects.iter().map(|o| o.id).collect();
    }

    pub fn deselect_all(&mut self) {
        self.selection.clear();
    }

    // --- Z-order ---

    /// Raise an object above everything else: `z_index = max + 1`.
    /// No-op if it is already strictly on top.
    pub fn bring_to_front(&mut self, id: ObjectId) {
        let Some(others_max) = self
            .objects
            .iter()
            .filter(|o| o.id != id)
            .map(|o| o.z_index)
            .max()
        else {
            return;
        };
        if let Some(object) = self.get_mut(id) {
            if object.z_index <= others_max {
                object.z_index = others_max + 1;
                self.save_to_history();
            }
        }
    }

    /// Lower an object below everything else: `z_index = min - 1`.
    /// No-op if it is already strictly at the bottom.
    pub fn send_to_back(&mut self, id: ObjectId) {
        let Some(others_min) = self
            .objects
            .iter()
            .filter(|o| o.id != id)
            .map(|o| o.z_index)
            .min()
        else {
            return;
        };
        if let Some(object) = self.get_mut(id) {
            if object.z_index >= others_min {
                object.z_index = others_min - 1;
                self.save_to_history();
            }
        }
    }

    /// Swap z_index with the next object above. No-op if already frontmost.
    pub fn bring_forward(&mut self, id: ObjectId) {
        let Some(current) = self.get(id).map(|o| o.z_index) else {
            return;
        };
        let Some(neighbor) = self
            .objects
            .iter()
            .filter(|o| o.id != id && o.z_index > current)
            .min_by_key(|o| o.z_index)
            .map(|o| (o.id, o.z_index))
        else {
            return;
        };
        self.swap_z(id, current, neighbor);
    }

    /// Swap z_index with the next object below. No-op if already backmost.
    pub fn send_backward(&mut self, id: ObjectId) {
        let Some(current) = self.get(id).map(|o| o.z_index) else {
            return;
        };
        let Some(neighbor) = self
            .objects
            .iter()
            .filter(|o| o.id != id && o.z_index < current)
            .max_by_key(|o| o.z_index)
            .map(|o| (o.id, o.z_index))
        else {
            return;
        };
        self.swap_z(id, current, neighbor);
    }

    fn swap_z(&mut self, id: ObjectId, current: i64, neighbor: (ObjectId, i64)) {
        if let Some(object) = self.get_mut(neighbor.0) {
            object.z_index = current;
        }
        if let Some(object) = self.get_mut(id) {
            object.z_index = neighbor.1;
        }
        self.save_to_history();
    }

    // --- History ---

    /// Push a deep copy of the current object array, truncating any redo
    /// branch. Evicts the oldest snapshot once the ring exceeds [`MAX_HISTORY`].
    pub fn save_to_history(&mut self) {
        self.history.truncate(self.history_index + 1);
        self.history.push(self.objects.clone());
        while self.history.len() > MAX_HISTORY {
            self.history.remove(0);
        }
        self.history_index = self.history.len() - 1;
    }

    /// Step the cursor back and restore that snapshot. Clears the selection.
    /// No-op at the oldest snapshot.
    pub fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.objects = self.history[self.history_index].clone();
        self.selection.clear();
        true
    }

    /// Step the cursor forward and restore that snapshot. Clears the
    /// selection. No-op at the newest snapshot.
    pub fn redo(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.objects = self.history[self.history_index].clone();
        self.selection.clear();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history_index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history_index + 1 < self.history.len()
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.history.len()
    }

    // --- Replication glue ---

    /// Replace the live object array with a remote replica's state.
    ///
    /// Remote updates are mutations of the same kind as local ones but do
    /// not touch the local-only history; selection is pruned to surviving
    /// ids.
    pub fn replace_objects(&mut self, objects: Vec<CanvasObject>) {
        self.objects = objects;
        let live: HashSet<ObjectId> = self.objects.iter().map(|o| o.id).collect();
        self.selection.retain(|id| live.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectKind, ShapeType};
    use uuid::Uuid;

    fn rect(x: f64, y: f64) -> CanvasObject {
        CanvasObject::shape(ShapeType::Rectangle, x, y, 100.0, 100.0)
    }

    #[test]
    fn test_add_assigns_z_index() {
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        let b = store.add_object(rect(10.0, 10.0));
        assert_eq!(store.get(a).unwrap().z_index, 0);
        assert_eq!(store.get(b).unwrap().z_index, 1);
    }

    #[test]
    fn test_update_missing_id_is_noop() {
        let mut store = ObjectStore::new();
        store.add_object(rect(0.0, 0.0));
        store.update_object(Uuid::new_v4(), &ObjectPatch::position(5.0, 5.0));
        assert_eq!(store.objects()[0].x, 0.0);
    }

    #[test]
    fn test_delete_prunes_selection() {
        let mut store = ObjectStore::new();
        let id = store.add_object(rect(0.0, 0.0));
        store.select_object(id, false);
        store.delete_object(id);
        assert!(store.is_empty());
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_delete_parent_clears_child_pointer() {
        let mut store = ObjectStore::new();
        let parent = store.add_object(rect(0.0, 0.0));
        let child = store.add_object(rect(10.0, 10.0).derived_from(parent));
        store.delete_object(parent);
        assert!(store.get(child).unwrap().derived_from.is_none());
    }

    #[test]
    fn test_duplicate_offset_and_selection() {
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        let b = store.add_object(rect(50.0, 50.0));
        store.select_object(a, false);
        store.select_object(b, true);

        let new_ids = store.duplicate_selected();
        assert_eq!(new_ids.len(), 2);
        assert!(!new_ids.contains(&a));
        assert!(!new_ids.contains(&b));
        // Selection is exactly the new ids
        assert_eq!(
            store.selection(),
            &new_ids.iter().copied().collect::<HashSet<_>>()
        );
        // Each clone is offset from its source
        let first = store.get(new_ids[0]).unwrap();
        assert_eq!(first.x, DUPLICATE_OFFSET);
        assert_eq!(first.y, DUPLICATE_OFFSET);
        let second = store.get(new_ids[1]).unwrap();
        assert_eq!(second.x, 50.0 + DUPLICATE_OFFSET);
    }

    #[test]
    fn test_additive_selection_toggles() {
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        let b = store.add_object(rect(1.0, 1.0));
        store.select_object(a, false);
        store.select_object(b, true);
        assert_eq!(store.selection().len(), 2);
        store.select_object(b, true);
        assert!(!store.is_selected(b));
        store.select_object(b, false);
        assert_eq!(store.selection().len(), 1);
        assert!(store.is_selected(b));
    }

    #[test]
    fn test_bring_to_front_strict_max() {
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        let _b = store.add_object(rect(1.0, 1.0));
        let c = store.add_object(rect(2.0, 2.0));
        let previous_max = store.get(c).unwrap().z_index;

        store.bring_to_front(a);
        let z = store.get(a).unwrap().z_index;
        assert!(z > previous_max);
        assert!(store
            .objects()
            .iter()
            .all(|o| o.id == a || o.z_index < z));
    }

    #[test]
    fn test_z_order_scenario() {
        // A at z 0, B at z 1; send B to back, then bring A forward.
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        let b = store.add_object(rect(1.0, 1.0));

        store.send_to_back(b);
        assert_eq!(store.get(b).unwrap().z_index, -1);

        // A is already the strict maximum, so bring_to_front is a no-op.
        store.bring_to_front(a);
        assert_eq!(store.get(a).unwrap().z_index, 0);
    }

    #[test]
    fn test_bring_forward_swaps_neighbors() {
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        let b = store.add_object(rect(1.0, 1.0));
        store.bring_forward(a);
        assert_eq!(store.get(a).unwrap().z_index, 1);
        assert_eq!(store.get(b).unwrap().z_index, 0);
        // Already frontmost: no-op
        store.bring_forward(a);
        assert_eq!(store.get(a).unwrap().z_index, 1);
    }

    #[test]
    fn test_send_backward_noop_at_bottom() {
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        store.send_backward(a);
        assert_eq!(store.get(a).unwrap().z_index, 0);
    }

    #[test]
    fn test_undo_redo_inverse() {
        let mut store = ObjectStore::new();
        store.add_object(rect(0.0, 0.0));
        let id = store.add_object(rect(10.0, 10.0));
        store.update_object(id, &ObjectPatch::position(99.0, 99.0));
        store.save_to_history();

        let before = store.objects().to_vec();
        assert!(store.undo());
        assert_ne!(store.objects(), &before[..]);
        assert!(store.redo());
        assert_eq!(store.objects(), &before[..]);
    }

    #[test]
    fn test_undo_clears_selection() {
        let mut store = ObjectStore::new();
        let id = store.add_object(rect(0.0, 0.0));
        store.select_object(id, false);
        assert!(store.undo());
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_mutation_truncates_redo_branch() {
        let mut store = ObjectStore::new();
        store.add_object(rect(0.0, 0.0));
        assert!(store.undo());
        assert!(store.can_redo());
        store.add_object(rect(5.0, 5.0));
        assert!(!store.can_redo());
    }

    #[test]
    fn test_undo_at_oldest_is_noop() {
        let mut store = ObjectStore::new();
        assert!(!store.undo());
        assert!(!store.redo());
    }

    #[test]
    fn test_history_bound() {
        let mut store = ObjectStore::new();
        for i in 0..51 {
            store.add_object(rect(i as f64, 0.0));
        }
        assert_eq!(store.history_len(), MAX_HISTORY);
        // The most recent snapshot is the live state
        assert!(!store.can_redo());
        assert!(store.can_undo());
    }

    #[test]
    fn test_replace_objects_prunes_selection() {
        let mut store = ObjectStore::new();
        let keep = store.add_object(rect(0.0, 0.0));
        let drop = store.add_object(rect(1.0, 1.0));
        store.select_object(keep, false);
        store.select_object(drop, true);

        let remaining: Vec<CanvasObject> = store
            .objects()
            .iter()
            .filter(|o| o.id == keep)
            .cloned()
            .collect();
        store.replace_objects(remaining);
        assert_eq!(store.selection().len(), 1);
        assert!(store.is_selected(keep));
    }

    #[test]
    fn test_ordered_iteration_sorts_by_z() {
        let mut store = ObjectStore::new();
        let a = store.add_object(rect(0.0, 0.0));
        let b = store.add_object(rect(1.0, 1.0));
        store.send_to_back(b);
        let order: Vec<ObjectId> = store.objects_ordered().iter().map(|o| o.id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_kind_patch_replaces_payload() {
        let mut store = ObjectStore::new();
        let id = store.add_object(CanvasObject::text("before", 0.0, 0.0));
        store.update_object(
            id,
            &ObjectPatch {
                kind: Some(ObjectKind::Image {
                    src: "after.png".to_string(),
                }),
                ..ObjectPatch::default()
            },
        );
        assert!(matches!(
            store.get(id).unwrap().kind,
            ObjectKind::Image { .. }
        ));
    }
}
