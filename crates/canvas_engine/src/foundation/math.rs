//! Math utilities and types
//!
//! Provides the `nalgebra` aliases used across the engine together with the
//! two rectangle types the UI layer works in:
//!
//! - [`Recti`]: integer pixel rectangles (view layout, atlas placement)
//! - [`Rect`]: float rectangles, usually normalized to the canvas (clip and scissor)
//!
//! All rectangles use a top-left origin with Y pointing down.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix4, Point2, Point3, UnitQuaternion, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 2D integer vector type
pub type Vec2i = Vector2<i32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Integer rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Recti {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub w: i32,
    /// Height
    pub h: i32,
}

impl Recti {
    /// Create a new rectangle
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Exclusive right edge
    pub const fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Exclusive bottom edge
    pub const fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// True when the rectangle covers no pixels
    pub const fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    /// Check whether two rectangles share at least one pixel
    pub const fn intersects(&self, other: &Self) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }

    /// Check whether `other` lies completely inside this rectangle
    pub const fn contains(&self, other: &Self) -> bool {
        other.x >= self.x && other.y >= self.y && other.right() <= self.right() && other.bottom() <= self.bottom()
    }

    /// Grow the rectangle by `amount` on the right and bottom edges
    pub const fn expanded(&self, amount: i32) -> Self {
        Self::new(self.x, self.y, self.w + amount, self.h + amount)
    }
}

/// Float rectangle, typically normalized so the full canvas is `(0, 0, 1, 1)`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
}

impl Rect {
    /// Create a new rectangle
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// The whole normalized area
    pub const fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Right edge
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Bottom edge
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Overlapping area of two rectangles.
    ///
    /// Disjoint inputs produce a zero-sized rectangle positioned at the
    /// clamped corner, so the result is always contained in both inputs.
    pub fn intersection(&self, other: &Self) -> Self {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());

        Self::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }

    /// Check whether `other` lies inside this rectangle (within `epsilon`)
    pub fn contains_rect(&self, other: &Self, epsilon: f32) -> bool {
        other.x >= self.x - epsilon
            && other.y >= self.y - epsilon
            && other.right() <= self.right() + epsilon
            && other.bottom() <= self.bottom() + epsilon
    }

    /// Scale a normalized rectangle up to a pixel rectangle of the given target
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_pixels(&self, width: u32, height: u32) -> Recti {
        let (width, height) = (width as f32, height as f32);
        let x0 = (self.x * width).round() as i32;
        let y0 = (self.y * height).round() as i32;
        let x1 = (self.right() * width).round() as i32;
        let y1 = (self.bottom() * height).round() as i32;
        Recti::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

/// Round half away from zero, matching integer pixel snapping in layout
#[allow(clippy::cast_possible_truncation)]
pub fn round_to_int(value: f32) -> i32 {
    value.round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recti_intersects() {
        let a = Recti::new(0, 0, 100, 100);
        let b = Recti::new(100, 0, 10, 10);
        let c = Recti::new(99, 99, 10, 10);

        assert!(!a.intersects(&b), "touching edges do not overlap");
        assert!(a.intersects(&c));
        assert!(a.contains(&Recti::new(10, 10, 90, 90)));
        assert!(!a.contains(&c));
    }

    #[test]
    fn test_rect_intersection_is_contained() {
        let parent = Rect::new(0.1, 0.1, 0.5, 0.5);
        let own = Rect::new(0.4, 0.0, 0.5, 0.3);

        let clip = own.intersection(&parent);
        assert!(parent.contains_rect(&clip, 1e-6));
        assert!(own.contains_rect(&clip, 1e-6));
        assert!((clip.x - 0.4).abs() < 1e-6);
        assert!((clip.h - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_rect_disjoint_intersection_is_empty() {
        let a = Rect::new(0.0, 0.0, 0.2, 0.2);
        let b = Rect::new(0.5, 0.5, 0.2, 0.2);

        let clip = a.intersection(&b);
        assert_eq!(clip.w, 0.0);
        assert_eq!(clip.h, 0.0);
    }

    #[test]
    fn test_rect_to_pixels() {
        let rect = Rect::new(0.25, 0.5, 0.5, 0.25);
        assert_eq!(rect.to_pixels(800, 600), Recti::new(200, 300, 400, 150));
    }
}
