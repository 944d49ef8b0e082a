//! Canvas object model.
//!
//! Every element on the board is a [`CanvasObject`]: shared geometry and
//! paint-order state plus a tagged [`ObjectKind`] payload. The serde
//! representation (camelCase, `type` discriminant) is the wire schema used
//! both for persistence blobs and for CRDT replication payloads.

use kurbo::Rect;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum width/height an object may have after any transform.
pub const MIN_OBJECT_SIZE: f64 = 5.0;

/// Unique identifier for canvas objects.
pub type ObjectId = Uuid;

/// Variant payload for a canvas object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ObjectKind {
    /// A raster image, referenced by URL or data URL.
    Image { src: String },
    /// A text block.
    Text {
        text: String,
        font_size: f64,
        font_family: String,
        fill: String,
    },
    /// A vector shape.
    Shape {
        shape_type: ShapeType,
        fill: String,
        stroke: String,
        stroke_width: f64,
    },
    /// A frame outline used to group content visually.
    Frame { stroke: String, stroke_width: f64 },
}

/// Geometric primitive for [`ObjectKind::Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeType {
    Rectangle,
    Ellipse,
    Triangle,
    Line,
}

/// Provenance of generated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Name of the generation feature that produced the object.
    pub feature: String,
    /// Prompt text, if the feature used one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Lineage depth counter: parent generation + 1, 0 for roots.
    pub generation: u32,
    /// Opaque feature parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Creation time in unix milliseconds.
    pub timestamp: u64,
}

/// An object on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasObject {
    /// Unique, immutable identifier.
    pub id: ObjectId,
    #[serde(flatten)]
    pub kind: ObjectKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
    /// Opacity in [0, 1].
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Paint/selection order; totally ordered, not necessarily contiguous.
    #[serde(default)]
    pub z_index: i64,
    /// Parent in the derivation forest, if this object was generated from
    /// another one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ObjectMeta>,
}

fn default_scale() -> f64 {
    1.0
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl CanvasObject {
    /// Create a new object with a fresh id at the given position and size.
    ///
    /// Size is clamped to [`MIN_OBJECT_SIZE`]; the store assigns `z_index`
    /// when the object is added.
    pub fn new(kind: ObjectKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            x,
            y,
            width: width.max(MIN_OBJECT_SIZE),
            height: height.max(MIN_OBJECT_SIZE),
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            opacity: 1.0,
            locked: false,
            visible: true,
            z_index: 0,
            derived_from: None,
            meta: None,
        }
    }

    /// Convenience constructor for an image object.
    pub fn image(src: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(ObjectKind::Image { src: src.into() }, x, y, width, height)
    }

    /// Convenience constructor for a text object with default typography.
    pub fn text(text: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(
            ObjectKind::Text {
                text: text.into(),
                font_size: 16.0,
                font_family: "Inter".to_string(),
                fill: "#000000".to_string(),
            },
            x,
            y,
            200.0,
            40.0,
        )
    }

    /// Convenience constructor for a shape object.
    pub fn shape(shape_type: ShapeType, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(
            ObjectKind::Shape {
                shape_type,
                fill: "#cccccc".to_string(),
                stroke: "#000000".to_string(),
                stroke_width: 2.0,
            },
            x,
            y,
            width,
            height,
        )
    }

    /// Convenience constructor for a frame object.
    pub fn frame(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(
            ObjectKind::Frame {
                stroke: "#888888".to_string(),
                stroke_width: 1.0,
            },
            x,
            y,
            width,
            height,
        )
    }

    /// Set the derivation parent.
    pub fn derived_from(mut self, parent: ObjectId) -> Self {
        self.derived_from = Some(parent);
        self
    }

    /// Attach provenance metadata.
    pub fn with_meta(mut self, meta: ObjectMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Clone into a new object with a fresh id, used when duplicating.
    pub fn cloned_with_new_id(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy
    }

    /// Axis-aligned bounding box of the rendered rect in world space.
    ///
    /// Accounts for scale; rotation is ignored on purpose, the rendered rect
    /// used for hit-testing and context actions is the unrotated AABB.
    pub fn bounds(&self) -> Rect {
        let w = self.width * self.scale_x.abs();
        let h = self.height * self.scale_y.abs();
        Rect::new(self.x, self.y, self.x + w, self.y + h)
    }

    /// Apply a shallow-merge patch, clamping size and opacity.
    pub fn apply_patch(&mut self, patch: &ObjectPatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(width) = patch.width {
            self.width = width.max(MIN_OBJECT_SIZE);
        }
        if let Some(height) = patch.height {
            self.height = height.max(MIN_OBJECT_SIZE);
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(scale_x) = patch.scale_x {
            self.scale_x = scale_x;
        }
        if let Some(scale_y) = patch.scale_y {
            self.scale_y = scale_y;
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity.clamp(0.0, 1.0);
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(z_index) = patch.z_index {
            self.z_index = z_index;
        }
        if let Some(ref derived_from) = patch.derived_from {
            self.derived_from = *derived_from;
        }
        if let Some(ref kind) = patch.kind {
            self.kind = kind.clone();
        }
        if let Some(ref meta) = patch.meta {
            self.meta = Some(meta.clone());
        }
    }
}

/// A shallow-merge update to an object: only the present fields change.
///
/// The same payload drives local store updates and replicated-map updates,
/// where it is merged field-wise into the last known object value. Patches
/// stay in-process; replication always carries full objects, so this type
/// only serializes (for logging and debugging).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    /// `Some(None)` clears the derivation parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<Option<ObjectId>>,
    /// Replaces the whole variant payload.
    #[serde(flatten)]
    pub kind: Option<ObjectKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ObjectMeta>,
}

impl ObjectPatch {
    /// A patch that only moves the object.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// A patch that only resizes the object.
    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_schema_field_names() {
        let obj = CanvasObject::image("https://example.com/a.png", 10.0, 20.0, 100.0, 50.0);
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["src"], "https://example.com/a.png");
        assert!(json.get("zIndex").is_some());
        assert!(json.get("scaleX").is_some());
        // Absent parent is omitted entirely
        assert!(json.get("derivedFrom").is_none());
    }

    #[test]
    fn test_roundtrip() {
        let parent = Uuid::new_v4();
        let obj = CanvasObject::text("hello", 0.0, 0.0)
            .derived_from(parent)
            .with_meta(ObjectMeta {
                feature: "remove-background".to_string(),
                prompt: None,
                generation: 2,
                parameters: None,
                timestamp: 1234,
            });
        let json = serde_json::to_string(&obj).unwrap();
        let back: CanvasObject = serde_json::from_str(&json).unwrap();
        assert_eq!(obj, back);
    }

    #[test]
    fn test_size_clamped_at_construction() {
        let obj = CanvasObject::frame(0.0, 0.0, 1.0, -3.0);
        assert!(obj.width >= MIN_OBJECT_SIZE);
        assert!(obj.height >= MIN_OBJECT_SIZE);
    }

    #[test]
    fn test_patch_clamps_size_and_opacity() {
        let mut obj = CanvasObject::shape(ShapeType::Rectangle, 0.0, 0.0, 100.0, 100.0);
        obj.apply_patch(&ObjectPatch {
            width: Some(1.0),
            opacity: Some(3.0),
            ..ObjectPatch::default()
        });
        assert_eq!(obj.width, MIN_OBJECT_SIZE);
        assert_eq!(obj.opacity, 1.0);
    }

    #[test]
    fn test_patch_clears_derivation_parent() {
        let parent = Uuid::new_v4();
        let mut obj = CanvasObject::image("x", 0.0, 0.0, 10.0, 10.0).derived_from(parent);
        obj.apply_patch(&ObjectPatch {
            derived_from: Some(None),
            ..ObjectPatch::default()
        });
        assert!(obj.derived_from.is_none());
    }

    #[test]
    fn test_bounds_uses_scale() {
        let mut obj = CanvasObject::image("x", 10.0, 10.0, 100.0, 50.0);
        obj.scale_x = 2.0;
        let b = obj.bounds();
        assert_eq!(b.width(), 200.0);
        assert_eq!(b.height(), 50.0);
    }
}
