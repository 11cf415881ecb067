use serde::{Deserialize, Serialize};

use crate::Point;

/// Pan/zoom state: `screen = translation + scale * world`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    pub tx: f32,
    pub ty: f32,
    pub scale: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            scale: 1.0,
            min_scale: 0.25,
            max_scale: 4.0,
        }
    }
}

impl ViewportTransform {
    pub fn with_bounds(min_scale: f32, max_scale: f32) -> Self {
        Self {
            min_scale,
            max_scale,
            ..Self::default()
        }
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        Point {
            x: self.tx + self.scale * world.x,
            y: self.ty + self.scale * world.y,
        }
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.tx) / self.scale,
            y: (screen.y - self.ty) / self.scale,
        }
    }

    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Rescales while keeping the world point under `anchor` fixed on screen.
    pub fn zoom_at(&mut self, anchor: Point, scale: f32) {
        let world = self.screen_to_world(anchor);
        self.scale = self.clamp_scale(scale);
        self.tx = anchor.x - self.scale * world.x;
        self.ty = anchor.y - self.scale * world.y;
    }

    pub fn zoom_by_wheel(&mut self, anchor: Point, delta_y: f32, sensitivity: f32) {
        let factor = (-delta_y * sensitivity).exp();
        self.zoom_at(anchor, self.scale * factor);
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.tx += dx;
        self.ty += dy;
    }

    /// Two-finger zoom: the distance ratio between the previous and current
    /// touch pairs scales around the current midpoint.
    pub fn pinch(&mut self, previous: (Point, Point), current: (Point, Point)) {
        let previous_distance = previous.0.distance(previous.1);
        let mut current_distance = current.0.distance(current.1);
        if current_distance == 0.0 {
            current_distance = previous_distance;
        }
        let factor = if previous_distance > 0.0 {
            current_distance / previous_distance
        } else {
            1.0
        };
        let anchor = current.0.midpoint(current.1);
        self.zoom_at(anchor, self.scale * factor);
    }
}
