//! Uniform block layouts shared by the engine and the built-in shaders
//!
//! All blocks are `#[repr(C)]` plain-old-data so they can be uploaded with
//! [`BufferDescriptor::from_slice`](crate::render::driver::BufferDescriptor::from_slice)
//! and read back byte-for-byte by a backend.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;
use crate::foundation::Color;

/// Uniform binding slots
pub mod binding {
    /// Camera and lighting block
    pub const PER_VIEW: usize = 0;
    /// Model matrix block
    pub const PER_RENDERABLE: usize = 1;
    /// Material parameters block
    pub const MATERIAL: usize = 2;
}

/// Sampler group binding slots
pub mod sampler_binding {
    /// Material textures
    pub const MATERIAL: usize = 0;
}

/// Per-view block: camera and the frame's lighting
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerViewUniforms {
    /// Projection times view, column-major
    pub view_projection: [[f32; 4]; 4],
    /// Ambient light color
    pub ambient_color: [f32; 4],
    /// Direction of the primary light, `w` unused
    pub light_direction: [f32; 4],
    /// Primary light color, `w` holds intensity
    pub light_color_intensity: [f32; 4],
}

impl PerViewUniforms {
    /// Block with the given camera matrix and neutral lighting
    pub fn new(view_projection: &Mat4) -> Self {
        Self {
            view_projection: (*view_projection).into(),
            ambient_color: Color::WHITE.to_array(),
            light_direction: [0.0, 0.0, -1.0, 0.0],
            light_color_intensity: [0.0; 4],
        }
    }
}

/// Per-renderable block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerRenderableUniforms {
    /// Model matrix, column-major
    pub model: [[f32; 4]; 4],
}

impl PerRenderableUniforms {
    /// Block holding `model`
    pub fn new(model: &Mat4) -> Self {
        Self { model: (*model).into() }
    }
}

/// Material block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialUniforms {
    /// Tint multiplied into the output color
    pub color: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes_are_vec4_aligned() {
        assert_eq!(std::mem::size_of::<PerViewUniforms>(), 112);
        assert_eq!(std::mem::size_of::<PerRenderableUniforms>(), 64);
        assert_eq!(std::mem::size_of::<MaterialUniforms>(), 16);
    }

    #[test]
    fn test_matrix_layout_is_column_major() {
        let m = Mat4::new_translation(&crate::foundation::math::Vec3::new(1.0, 2.0, 3.0));
        let block = PerRenderableUniforms::new(&m);
        assert_eq!(block.model[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
