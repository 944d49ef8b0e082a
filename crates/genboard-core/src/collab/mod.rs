//! Real-time collaboration.
//!
//! The shared document ([`SharedDoc`]) holds the replicated object set;
//! [`CollabSession`] ties it to a relay connection and ephemeral presence.
//! Convergence comes from the CRDT layer, so replicas that have seen the
//! same set of updates hold the same objects regardless of delivery order.

mod doc;
mod session;

pub use doc::{OBJECTS_KEY, SharedDoc};
pub use session::{COLOR_PALETTE, CollabSession, DEFAULT_RELAY_URL, ROOM_NAMESPACE, Subscription};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{CanvasObject, ObjectPatch};
    use crate::store::ObjectStore;

    // Remote state flows into the local store through replace_objects, the
    // same path the app uses from CollabSession::on_objects_change.
    #[test]
    fn test_remote_objects_replace_local_store() {
        let mut remote = SharedDoc::new();
        let object = CanvasObject::text("from peer", 10.0, 10.0);
        remote.put_object(&object).unwrap();

        let mut local_doc = SharedDoc::from_snapshot(&remote.export_snapshot()).unwrap();
        let mut store = ObjectStore::new();
        store.replace_objects(local_doc.objects());

        assert_eq!(store.objects().len(), 1);
        assert_eq!(store.objects()[0].id, object.id);

        // A remote delete prunes the store on the next replace.
        local_doc.remove_object(object.id).unwrap();
        store.select_object(object.id, false);
        store.replace_objects(local_doc.objects());
        assert!(store.objects().is_empty());
        assert!(store.selection().is_empty());
    }

    #[test]
    fn test_three_replicas_converge() {
        let mut a = SharedDoc::new();
        let base = CanvasObject::text("base", 0.0, 0.0);
        a.put_object(&base).unwrap();
        let snapshot = a.export_snapshot();

        let mut b = SharedDoc::from_snapshot(&snapshot).unwrap();
        let mut c = SharedDoc::from_snapshot(&snapshot).unwrap();

        a.patch_object(base.id, &ObjectPatch::position(5.0, 0.0)).unwrap();
        b.put_object(&CanvasObject::text("b adds", 1.0, 1.0)).unwrap();
        c.remove_object(base.id).unwrap();

        // Full mesh exchange, in different orders per replica.
        let (ua, ub, uc) = (a.export_snapshot(), b.export_snapshot(), c.export_snapshot());
        a.import(&ub).unwrap();
        a.import(&uc).unwrap();
        b.import(&uc).unwrap();
        b.import(&ua).unwrap();
        c.import(&ua).unwrap();
        c.import(&ub).unwrap();

        let canonical: Vec<_> = {
            let mut objs = a.objects();
            objs.sort_by_key(|o| o.id);
            objs
        };
        for doc in [&b, &c] {
            let mut objs = doc.objects();
            objs.sort_by_key(|o| o.id);
            assert_eq!(objs, canonical);
        }
    }
}
