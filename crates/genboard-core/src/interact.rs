//! Interaction glue: hit-testing, drag/transform controllers, and the
//! context-action contract exposed to the UI layer.

use crate::lineage::generated_meta;
use crate::object::{CanvasObject, ObjectId, ObjectPatch, MIN_OBJECT_SIZE};
use crate::project::now_millis;
use crate::store::ObjectStore;
use crate::viewport::Viewport;
use kurbo::Point;

/// Top-most visible object containing the given world point, if any.
///
/// Containment is tested against each object's rendered axis-aligned rect;
/// ties resolve to the highest z_index.
pub fn object_at_point(store: &ObjectStore, world: Point) -> Option<ObjectId> {
    store
        .objects_ordered()
        .into_iter()
        .rev()
        .find(|o| o.visible && o.bounds().contains(world))
        .map(|o| o.id)
}

/// All visible objects containing the point, front to back.
pub fn objects_at_point(store: &ObjectStore, world: Point) -> Vec<ObjectId> {
    store
        .objects_ordered()
        .into_iter()
        .rev()
        .filter(|o| o.visible && o.bounds().contains(world))
        .map(|o| o.id)
        .collect()
}

/// An in-progress drag of the current selection.
///
/// Movement streams through `update_object` without snapshotting; the
/// snapshot happens once on commit, after optional grid quantization.
#[derive(Debug)]
pub struct DragSession {
    ids: Vec<ObjectId>,
    last: Point,
}

impl DragSession {
    /// Begin dragging the current selection from a world-space anchor.
    /// Locked objects stay put and are excluded.
    pub fn begin(store: &ObjectStore, anchor: Point) -> Self {
        let ids = store
            .selected_objects()
            .into_iter()
            .filter(|o| !o.locked)
            .map(|o| o.id)
            .collect();
        Self { ids, last: anchor }
    }

    /// Move the drag to a new world point, translating every dragged object.
    pub fn update(&mut self, store: &mut ObjectStore, world: Point) {
        let dx = world.x - self.last.x;
        let dy = world.y - self.last.y;
        self.last = world;
        for &id in &self.ids {
            if let Some(object) = store.get(id) {
                let patch = ObjectPatch::position(object.x + dx, object.y + dy);
                store.update_object(id, &patch);
            }
        }
    }

    /// Commit: quantize final positions when snap-to-grid is on, then take
    /// a single history snapshot for the whole gesture.
    pub fn commit(self, store: &mut ObjectStore, viewport: &Viewport) {
        if viewport.snap_to_grid {
            for &id in &self.ids {
                if let Some(object) = store.get(id) {
                    let snapped = viewport.snap_point(Point::new(object.x, object.y));
                    store.update_object(id, &ObjectPatch::position(snapped.x, snapped.y));
                }
            }
        }
        if !self.ids.is_empty() {
            store.save_to_history();
        }
    }
}

/// Shared transform-handle controller: applies uniform resize/rotate to the
/// whole current selection.
#[derive(Debug, Default)]
pub struct TransformHandles;

impl TransformHandles {
    /// Scale every selected object's size by `factor`.
    ///
    /// If any resulting dimension would fall below the 5-unit minimum the
    /// transform is rejected outright and every object keeps its prior size.
    /// Returns whether the resize was applied.
    pub fn resize_selection(store: &mut ObjectStore, factor: f64) -> bool {
        let targets: Vec<(ObjectId, f64, f64)> = store
            .selected_objects()
            .into_iter()
            .filter(|o| !o.locked)
            .map(|o| (o.id, o.width * factor, o.height * factor))
            .collect();
        if targets.is_empty() {
            return false;
        }
        if targets
            .iter()
            .any(|(_, w, h)| *w < MIN_OBJECT_SIZE || *h < MIN_OBJECT_SIZE)
        {
            return false;
        }
        for (id, width, height) in targets {
            store.update_object(id, &ObjectPatch::size(width, height));
        }
        store.save_to_history();
        true
    }

    /// Rotate every selected object by `delta_degrees`.
    pub fn rotate_selection(store: &mut ObjectStore, delta_degrees: f64) {
        let targets: Vec<(ObjectId, f64)> = store
            .selected_objects()
            .into_iter()
            .filter(|o| !o.locked)
            .map(|o| (o.id, o.rotation + delta_degrees))
            .collect();
        if targets.is_empty() {
            return;
        }
        for (id, rotation) in targets {
            store.update_object(
                id,
                &ObjectPatch {
                    rotation: Some(rotation),
                    ..ObjectPatch::default()
                },
            );
        }
        store.save_to_history();
    }
}

/// Closed set of context-menu actions the UI can request.
///
/// `Generate` identifiers are forwarded verbatim to the external generation
/// endpoints; the engine never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextAction {
    Duplicate,
    Delete,
    BringToFront,
    SendToBack,
    Lock,
    Unlock,
    Hide,
    Show,
    Group,
    Download,
    Generate(String),
}

impl ContextAction {
    /// Parse an action identifier; unknown identifiers become `Generate`
    /// operations forwarded as-is.
    pub fn parse(id: &str) -> Self {
        match id {
            "duplicate" => Self::Duplicate,
            "delete" => Self::Delete,
            "bringToFront" => Self::BringToFront,
            "sendToBack" => Self::SendToBack,
            "lock" => Self::Lock,
            "unlock" => Self::Unlock,
            "hide" => Self::Hide,
            "show" => Self::Show,
            "group" => Self::Group,
            "download" => Self::Download,
            other => Self::Generate(other.to_string()),
        }
    }
}

/// Result of dispatching a context action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The store mutation was applied.
    Applied,
    /// The caller must handle it (group/download UI, generation request
    /// carrying the source image's data URL).
    Deferred(ContextAction),
}

/// Dispatch a context action against a target object.
pub fn apply_action(store: &mut ObjectStore, id: ObjectId, action: ContextAction) -> ActionOutcome {
    match action {
        ContextAction::Duplicate => {
            store.select_object(id, false);
            store.duplicate_selected();
            ActionOutcome::Applied
        }
        ContextAction::Delete => {
            store.delete_object(id);
            ActionOutcome::Applied
        }
        ContextAction::BringToFront => {
            store.bring_to_front(id);
            ActionOutcome::Applied
        }
        ContextAction::SendToBack => {
            store.send_to_back(id);
            ActionOutcome::Applied
        }
        ContextAction::Lock => {
            store.update_object(
                id,
                &ObjectPatch {
                    locked: Some(true),
                    ..ObjectPatch::default()
                },
            );
            ActionOutcome::Applied
        }
        ContextAction::Unlock => {
            store.update_object(
                id,
                &ObjectPatch {
                    locked: Some(false),
                    ..ObjectPatch::default()
                },
            );
            ActionOutcome::Applied
        }
        ContextAction::Hide => {
            store.update_object(
                id,
                &ObjectPatch {
                    visible: Some(false),
                    ..ObjectPatch::default()
                },
            );
            ActionOutcome::Applied
        }
        ContextAction::Show => {
            store.update_object(
                id,
                &ObjectPatch {
                    visible: Some(true),
                    ..ObjectPatch::default()
                },
            );
            ActionOutcome::Applied
        }
        deferred @ (ContextAction::Group
        | ContextAction::Download
        | ContextAction::Generate(_)) => ActionOutcome::Deferred(deferred),
    }
}

/// Place images returned by a generation endpoint onto the canvas.
///
/// Each URL becomes a new Image object stamped with `derived_from` and a
/// generation counter one deeper than the source. Results are laid out in a
/// row next to the source (or at the origin if the source is gone).
pub fn place_generated(
    store: &mut ObjectStore,
    source_id: ObjectId,
    feature: &str,
    urls: &[String],
) -> Vec<ObjectId> {
    let (base_x, base_y, width, height, parent) = match store.get(source_id) {
        Some(source) => {
            let b = source.bounds();
            (b.x1 + 20.0, b.y0, source.width, source.height, Some(source_id))
        }
        None => (0.0, 0.0, 512.0, 512.0, None),
    };
    let meta = generated_meta(store.get(source_id), feature, None, now_millis());

    let mut ids = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        let mut object = CanvasObject::image(
            url.clone(),
            base_x + i as f64 * (width + 20.0),
            base_y,
            width,
            height,
        )
        .with_meta(meta.clone());
        object.derived_from = parent;
        ids.push(store.add_object(object));
    }
    ids
}
