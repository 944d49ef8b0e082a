//! Viewport transform: zoom, pan, and grid snapping.
//!
//! Maps world coordinates to screen coordinates via
//! `screen = world * zoom + pan`. Hit-testing, cursor rendering, and the
//! minimap all go through the same conversion.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom level.
pub const MIN_ZOOM: f64 = 0.1;
/// Maximum allowed zoom level.
pub const MAX_ZOOM: f64 = 5.0;
/// Multiplicative wheel-zoom step (10% per notch).
pub const ZOOM_STEP: f64 = 1.1;
/// Default grid cell size in world units.
pub const DEFAULT_GRID_SIZE: f64 = 20.0;

/// The view transform plus grid state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    pub pan: Vec2,
    pub grid_visible: bool,
    pub snap_to_grid: bool,
    pub grid_size: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            grid_visible: true,
            snap_to_grid: false,
            grid_size: DEFAULT_GRID_SIZE,
        }
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a screen point to world coordinates.
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.zoom,
            (screen.y - self.pan.y) / self.zoom,
        )
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point::new(
            world.x * self.zoom + self.pan.x,
            world.y * self.zoom + self.pan.y,
        )
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Zoom by `factor`, keeping the world point under `screen_point` fixed.
    ///
    /// The world point is computed with the old zoom/pan, the new zoom is
    /// clamped, and the pan is recomputed so the anchor stays put.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }
        let anchor = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        self.pan = Vec2::new(
            screen_point.x - anchor.x * self.zoom,
            screen_point.y - anchor.y * self.zoom,
        );
    }

    /// One wheel notch in: +10%.
    pub fn zoom_in_at(&mut self, screen_point: Point) {
        self.zoom_at(screen_point, ZOOM_STEP);
    }

    /// One wheel notch out: -10%.
    pub fn zoom_out_at(&mut self, screen_point: Point) {
        self.zoom_at(screen_point, 1.0 / ZOOM_STEP);
    }

    /// Quantize a world value to the nearest grid multiple.
    pub fn snap(&self, value: f64) -> f64 {
        (value / self.grid_size).round() * self.grid_size
    }

    /// Quantize a world point to the grid.
    pub fn snap_point(&self, point: Point) -> Point {
        Point::new(self.snap(point.x), self.snap(point.y))
    }

    /// Reset zoom and pan to the identity transform.
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_conversion() {
        let viewport = Viewport::new();
        let p = Point::new(123.0, 456.0);
        assert_eq!(viewport.screen_to_world(p), p);
        assert_eq!(viewport.world_to_screen(p), p);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut viewport = Viewport::new();
        viewport.zoom = 1.5;
        viewport.pan = Vec2::new(30.0, -20.0);

        let screen = Point::new(400.0, 300.0);
        let world = viewport.screen_to_world(screen);
        let back = viewport.world_to_screen(world);
        assert!((back.x - screen.x).abs() < 1e-10);
        assert!((back.y - screen.y).abs() < 1e-10);
    }

    #[test]
    fn test_zoom_anchor_preserved() {
        // zoom 1, pan (0,0), pointer at (400,300), one wheel notch in.
        let mut viewport = Viewport::new();
        let pointer = Point::new(400.0, 300.0);
        let world_before = viewport.screen_to_world(pointer);

        viewport.zoom_in_at(pointer);
        assert!((viewport.zoom - 1.1).abs() < 1e-12);

        // pointer = world_before * 1.1 + new_pan, pixel-identical.
        let screen_after = viewport.world_to_screen(world_before);
        assert!((screen_after.x - pointer.x).abs() < 1e-9);
        assert!((screen_after.y - pointer.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_clamped() {
        let mut viewport = Viewport::new();
        viewport.zoom_at(Point::ZERO, 0.001);
        assert!((viewport.zoom - MIN_ZOOM).abs() < f64::EPSILON);

        viewport.zoom = 1.0;
        viewport.zoom_at(Point::ZERO, 1000.0);
        assert!((viewport.zoom - MAX_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snap_to_grid() {
        let viewport = Viewport::new();
        assert_eq!(viewport.snap(27.0), 20.0);
        assert_eq!(viewport.snap(31.0), 40.0);
        assert_eq!(viewport.snap(-9.0), 0.0);
        let snapped = viewport.snap_point(Point::new(43.0, 77.0));
        assert_eq!(snapped, Point::new(40.0, 80.0));
    }

    #[test]
    fn test_pan() {
        let mut viewport = Viewport::new();
        viewport.pan_by(Vec2::new(10.0, 20.0));
        assert_eq!(viewport.pan, Vec2::new(10.0, 20.0));
        let world = viewport.screen_to_world(Point::new(10.0, 20.0));
        assert_eq!(world, Point::ZERO);
    }
}
