//! # Camera
//!
//! Render-target camera: which target area it draws into and the projection
//! used there.
//!
//! ## Design Principles
//! - **Target-relative viewport**: the viewport is a normalized rectangle of the
//!   target, so it survives resizes
//! - **External projection**: renderers with special needs (the canvas pins its
//!   origin to the top-left corner) override the computed projection

use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::foundation::Rect;
use crate::render::driver::Viewport;

/// Camera drawing into a render target
///
/// # Coordinate System
/// The viewport rectangle uses a top-left origin. [`Camera::viewport`]
/// converts it to the bottom-left origin the driver expects.
#[derive(Debug, Clone)]
pub struct Camera {
    target_width: u32,
    target_height: u32,
    viewport_rect: Rect,
    orthographic: bool,
    orthographic_size: f32,
    field_of_view: f32,
    near_clip: f32,
    far_clip: f32,
    view_matrix: Mat4,
    external_projection: Option<Mat4>,
}

impl Camera {
    /// Create a perspective camera covering the whole target
    ///
    /// # Arguments
    /// * `target_width` - Render target width in pixels
    /// * `target_height` - Render target height in pixels
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            viewport_rect: Rect::full(),
            orthographic: false,
            orthographic_size: 1.0,
            field_of_view: 45.0_f32.to_radians(),
            near_clip: 0.3,
            far_clip: 1000.0,
            view_matrix: Mat4::identity(),
            external_projection: None,
        }
    }

    /// Render target width in pixels
    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    /// Render target height in pixels
    pub fn target_height(&self) -> u32 {
        self.target_height
    }

    /// Update the target size after a resize
    pub fn set_target_size(&mut self, width: u32, height: u32) {
        if (width, height) != (self.target_width, self.target_height) {
            log::debug!(
                "Camera target resized: {}x{} -> {}x{}",
                self.target_width,
                self.target_height,
                width,
                height
            );
        }
        self.target_width = width;
        self.target_height = height;
    }

    /// Normalized viewport rectangle, top-left origin
    pub fn viewport_rect(&self) -> Rect {
        self.viewport_rect
    }

    /// Set the normalized viewport rectangle
    pub fn set_viewport_rect(&mut self, rect: Rect) {
        self.viewport_rect = rect;
    }

    /// Viewport in driver coordinates (pixels, bottom-left origin)
    #[allow(clippy::cast_sign_loss)]
    pub fn viewport(&self) -> Viewport {
        let pixels = self.viewport_rect.to_pixels(self.target_width, self.target_height);
        Viewport {
            left: pixels.x,
            bottom: self.target_height as i32 - pixels.bottom(),
            width: pixels.w as u32,
            height: pixels.h as u32,
        }
    }

    /// Whether the computed projection is orthographic
    pub fn is_orthographic(&self) -> bool {
        self.orthographic
    }

    /// Switch between orthographic and perspective projection
    pub fn set_orthographic(&mut self, orthographic: bool) {
        self.orthographic = orthographic;
    }

    /// Half of the vertical extent seen by an orthographic projection
    pub fn set_orthographic_size(&mut self, size: f32) {
        self.orthographic_size = size;
    }

    /// Near clipping plane
    pub fn near_clip(&self) -> f32 {
        self.near_clip
    }

    /// Far clipping plane
    pub fn far_clip(&self) -> f32 {
        self.far_clip
    }

    /// Set both clipping planes
    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near_clip = near;
        self.far_clip = far;
    }

    /// World-to-camera transform
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    /// Place the camera at `position` looking at `target`
    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.view_matrix = Mat4::look_at_rh(&Point3::from(position), &Point3::from(target), &up);
    }

    /// Override the computed projection
    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.external_projection = Some(projection);
    }

    /// Go back to the computed projection
    pub fn clear_projection_matrix(&mut self) {
        self.external_projection = None;
    }

    /// Projection matrix
    ///
    /// # Returns
    /// The external projection if one was set, otherwise a projection built
    /// from the orthographic flag, clip planes and viewport aspect
    pub fn projection_matrix(&self) -> Mat4 {
        if let Some(projection) = self.external_projection {
            return projection;
        }

        let aspect = self.aspect();
        if self.orthographic {
            let half_h = self.orthographic_size;
            let half_w = half_h * aspect;
            Mat4::new_orthographic(-half_w, half_w, -half_h, half_h, self.near_clip, self.far_clip)
        } else {
            Mat4::new_perspective(aspect, self.field_of_view, self.near_clip, self.far_clip)
        }
    }

    /// Projection times view
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix
    }

    /// Width over height of the viewport area, 1 for an empty viewport
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect(&self) -> f32 {
        let w = self.target_width as f32 * self.viewport_rect.w;
        let h = self.target_height as f32 * self.viewport_rect.h;
        if h > 0.0 {
            w / h
        } else {
            1.0
        }
    }
}
