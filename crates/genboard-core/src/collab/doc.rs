//! Loro document schema and operations.

use crate::object::{CanvasObject, ObjectId, ObjectPatch};
use loro::{ExportMode, LoroDoc, LoroMap, LoroResult, LoroValue, ValueOrContainer};

/// Key for the objects map in the document.
pub const OBJECTS_KEY: &str = "objects";

/// A CRDT-backed document for collaborative editing.
///
/// Wraps a `LoroDoc` holding a single map keyed by object id. Each value
/// is the full object as a JSON string, so concurrent edits to the same
/// object resolve by last-writer-wins on the whole object rather than
/// field-by-field merging. Edits to different objects always merge.
pub struct SharedDoc {
    doc: LoroDoc,
}

impl SharedDoc {
    /// Create a new empty shared document.
    pub fn new() -> Self {
        Self { doc: LoroDoc::new() }
    }

    /// Create a shared document from a snapshot.
    pub fn from_snapshot(bytes: &[u8]) -> LoroResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self { doc })
    }

    /// Get the underlying LoroDoc.
    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    fn objects_map(&self) -> LoroMap {
        self.doc.get_map(OBJECTS_KEY)
    }

    /// Get the number of objects in the document.
    pub fn object_count(&self) -> usize {
        self.objects_map().len()
    }

    /// Check whether an object is present.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects_map().get(&id.to_string()).is_some()
    }

    /// Insert or replace an object.
    pub fn put_object(&mut self, object: &CanvasObject) -> LoroResult<()> {
        let json = serde_json::to_string(object).map_err(|e| {
            loro::LoroError::DecodeError(e.to_string().into_boxed_str())
        })?;
        self.objects_map()
            .insert(&object.id.to_string(), json.as_str())?;
        self.doc.commit();
        Ok(())
    }

    /// Apply a shallow patch to an object.
    ///
    /// The patched object is re-inserted wholesale, which is what gives
    /// concurrent edits whole-object LWW semantics. Unknown ids are
    /// ignored so a patch racing a remote delete resolves to the delete.
    pub fn patch_object(&mut self, id: ObjectId, patch: &ObjectPatch) -> LoroResult<()> {
        let Some(mut object) = self.get_object(id) else {
            return Ok(());
        };
        object.apply_patch(patch);
        self.put_object(&object)
    }

    /// Remove an object.
    pub fn remove_object(&mut self, id: ObjectId) -> LoroResult<()> {
        self.objects_map().delete(&id.to_string())?;
        self.doc.commit();
        Ok(())
    }

    /// Get a single object by id.
    pub fn get_object(&self, id: ObjectId) -> Option<CanvasObject> {
        match self.objects_map().get(&id.to_string()) {
            Some(ValueOrContainer::Value(LoroValue::String(json))) => {
                serde_json::from_str(&json).ok()
            }
            _ => None,
        }
    }

    /// Get all objects, unordered. Values that fail to parse are skipped.
    pub fn objects(&self) -> Vec<CanvasObject> {
        let value = self.objects_map().get_deep_value();
        let mut result = Vec::new();
        if let LoroValue::Map(map) = value {
            for object_value in map.values() {
                if let LoroValue::String(json) = object_value {
                    match serde_json::from_str::<CanvasObject>(json) {
                        Ok(object) => result.push(object),
                        Err(e) => log::warn!("skipping unparseable object: {}", e),
                    }
                }
            }
        }
        result
    }

    /// Export the full document as a snapshot.
    pub fn export_snapshot(&self) -> Vec<u8> {
        self.doc.export(ExportMode::Snapshot).unwrap_or_default()
    }

    /// Export updates since a version vector.
    pub fn export_updates(&self, since: &loro::VersionVector) -> Vec<u8> {
        self.doc.export(ExportMode::updates(since)).unwrap_or_default()
    }

    /// Import a snapshot or update from another peer.
    pub fn import(&mut self, bytes: &[u8]) -> LoroResult<()> {
        self.doc.import(bytes)?;
        Ok(())
    }

    /// Get the current version vector.
    pub fn version(&self) -> loro::VersionVector {
        self.doc.oplog_vv()
    }

    /// Get the peer ID of this document.
    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }
}

impl Default for SharedDoc {
    fn default() -> Self {
        Self::new()
    }
}
