//! Vertex layout for canvas geometry

use bytemuck::{Pod, Zeroable};

use super::driver::{Attribute, AttributeArray, ElementType, VertexAttribute, MAX_VERTEX_ATTRIBUTE_COUNT};
use crate::foundation::math::Vec3;
use crate::foundation::Color;

/// Interleaved canvas vertex
///
/// `uv2.x` carries the atlas layer a textured vertex samples from.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct CanvasVertex {
    /// Position in canvas pixels, Y down
    pub position: [f32; 3],
    /// Vertex color
    pub color: [f32; 4],
    /// Texture coordinate, top-left origin
    pub uv: [f32; 2],
    /// Secondary coordinate
    pub uv2: [f32; 2],
}

impl CanvasVertex {
    /// Byte size of one vertex
    #[allow(clippy::cast_possible_truncation)]
    pub const STRIDE: u8 = std::mem::size_of::<Self>() as u8;

    /// Vertex at `position` with no texture coordinates
    pub fn new(position: Vec3, color: Color, uv: [f32; 2]) -> Self {
        Self {
            position: [position.x, position.y, position.z],
            color: color.to_array(),
            uv,
            uv2: [0.0; 2],
        }
    }

    /// Attribute bits read by the canvas shader
    pub fn enabled_attributes() -> u32 {
        VertexAttribute::Position.bit() | VertexAttribute::Color.bit() | VertexAttribute::Uv0.bit() | VertexAttribute::Uv1.bit()
    }

    /// Attribute layout of a single interleaved buffer
    pub fn attributes() -> AttributeArray {
        let attribute = |offset: usize, element_type| Attribute {
            offset: offset as u32,
            stride: Self::STRIDE,
            buffer: 0,
            element_type,
            ..Attribute::default()
        };

        let mut attributes = [Attribute::default(); MAX_VERTEX_ATTRIBUTE_COUNT];
        attributes[VertexAttribute::Position.index()] = attribute(0, ElementType::Float3);
        attributes[VertexAttribute::Color.index()] = attribute(12, ElementType::Float4);
        attributes[VertexAttribute::Uv0.index()] = attribute(28, ElementType::Float2);
        attributes[VertexAttribute::Uv1.index()] = attribute(36, ElementType::Float2);
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_struct() {
        assert_eq!(CanvasVertex::STRIDE, 44);
        let attributes = CanvasVertex::attributes();
        let uv2 = attributes[VertexAttribute::Uv1.index()];
        assert_eq!(uv2.offset as usize, std::mem::offset_of!(CanvasVertex, uv2));
        assert_eq!(attributes[VertexAttribute::Tangents.index()].buffer, crate::render::driver::NO_BUFFER);
    }
}
