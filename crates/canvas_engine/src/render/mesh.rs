//! Retained GPU mesh
//!
//! Vertex and index buffers sized for a capacity, split into submeshes that
//! each own one render primitive. A mesh whose new contents still fit its
//! capacity is rewritten in place; callers reallocate when [`Mesh::fits`]
//! reports otherwise.

use crate::render::driver::{
    BufferDescriptor, BufferUsage, Driver, ElementType, IndexBufferHandle, PrimitiveType, RenderPrimitiveHandle,
    VertexBufferHandle,
};
use crate::render::vertex::CanvasVertex;

/// Contiguous index range drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Submesh {
    /// First index
    pub index_first: u32,
    /// Number of indices
    pub index_count: u32,
}

/// Mesh living in driver buffers
#[derive(Debug)]
pub struct Mesh {
    vertex_buffer: VertexBufferHandle,
    index_buffer: IndexBufferHandle,
    vertex_capacity: u32,
    index_capacity: u32,
    vertex_count: u32,
    index_count: u32,
    submeshes: Vec<Submesh>,
    primitives: Vec<RenderPrimitiveHandle>,
}

impl Mesh {
    /// Allocate buffers exactly fitting the data and upload it
    ///
    /// # Arguments
    /// * `vertices` - Interleaved vertex data
    /// * `indices` - 32-bit indices into `vertices`
    /// * `submeshes` - Index ranges, one draw each
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(driver: &mut dyn Driver, vertices: &[CanvasVertex], indices: &[u32], submeshes: &[Submesh]) -> Self {
        let vertex_capacity = vertices.len() as u32;
        let index_capacity = indices.len() as u32;
        log::debug!("Allocating mesh: {vertex_capacity} vertices, {index_capacity} indices");

        let vertex_buffer =
            driver.create_vertex_buffer(1, vertex_capacity, CanvasVertex::attributes(), BufferUsage::Dynamic);
        let index_buffer = driver.create_index_buffer(ElementType::UInt, index_capacity, BufferUsage::Dynamic);

        let mut mesh = Self {
            vertex_buffer,
            index_buffer,
            vertex_capacity,
            index_capacity,
            vertex_count: 0,
            index_count: 0,
            submeshes: Vec::new(),
            primitives: Vec::new(),
        };
        mesh.update(driver, vertices, indices, submeshes);
        mesh
    }

    /// Whether data of this size can be written without reallocating
    pub fn fits(&self, vertex_count: usize, index_count: usize) -> bool {
        vertex_count <= self.vertex_capacity as usize && index_count <= self.index_capacity as usize
    }

    /// Rewrite the mesh contents in place
    ///
    /// Panics when the data exceeds the capacity or a submesh reaches past
    /// the indices.
    #[allow(clippy::cast_possible_truncation)]
    pub fn update(&mut self, driver: &mut dyn Driver, vertices: &[CanvasVertex], indices: &[u32], submeshes: &[Submesh]) {
        assert!(
            self.fits(vertices.len(), indices.len()),
            "mesh update of {} vertices / {} indices exceeds capacity {} / {}",
            vertices.len(),
            indices.len(),
            self.vertex_capacity,
            self.index_capacity
        );
        for submesh in submeshes {
            assert!(
                submesh.index_first + submesh.index_count <= indices.len() as u32,
                "submesh {submesh:?} reaches past {} indices",
                indices.len()
            );
        }

        if !vertices.is_empty() {
            driver.update_vertex_buffer(self.vertex_buffer, 0, BufferDescriptor::from_slice(vertices), 0);
        }
        if !indices.is_empty() {
            driver.update_index_buffer(self.index_buffer, BufferDescriptor::from_slice(indices), 0);
        }
        self.vertex_count = vertices.len() as u32;
        self.index_count = indices.len() as u32;

        while self.primitives.len() > submeshes.len() {
            if let Some(primitive) = self.primitives.pop() {
                driver.destroy_render_primitive(primitive);
            }
        }
        while self.primitives.len() < submeshes.len() {
            let primitive = driver.create_render_primitive();
            driver.set_render_primitive_buffer(
                primitive,
                self.vertex_buffer,
                self.index_buffer,
                CanvasVertex::enabled_attributes(),
            );
            self.primitives.push(primitive);
        }

        let max_index = self.vertex_count.saturating_sub(1);
        for (primitive, submesh) in self.primitives.iter().zip(submeshes) {
            driver.set_render_primitive_range(
                *primitive,
                PrimitiveType::Triangles,
                submesh.index_first,
                0,
                max_index,
                submesh.index_count,
            );
        }
        self.submeshes = submeshes.to_vec();
    }

    /// Submesh ranges
    pub fn submeshes(&self) -> &[Submesh] {
        &self.submeshes
    }

    /// Render primitive drawing submesh `index`
    pub fn primitive(&self, index: usize) -> RenderPrimitiveHandle {
        self.primitives[index]
    }

    /// Vertices the buffers can hold
    pub fn vertex_capacity(&self) -> u32 {
        self.vertex_capacity
    }

    /// Indices the buffers can hold
    pub fn index_capacity(&self) -> u32 {
        self.index_capacity
    }

    /// Vertices currently written
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Indices currently written
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Release every driver resource of the mesh
    pub fn destroy(self, driver: &mut dyn Driver) {
        for primitive in self.primitives {
            driver.destroy_render_primitive(primitive);
        }
        driver.destroy_vertex_buffer(self.vertex_buffer);
        driver.destroy_index_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DriverConfig;
    use crate::render::backends::SoftwareDriver;

    fn quad_data(count: usize) -> (Vec<CanvasVertex>, Vec<u32>) {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for quad in 0..count {
            let base = (quad * 4) as u32;
            vertices.extend(std::iter::repeat(CanvasVertex::default()).take(4));
            indices.extend([0, 1, 2, 0, 2, 3].map(|i| base + i));
        }
        (vertices, indices)
    }

    #[test]
    fn test_update_in_place_tracks_primitives() {
        let mut driver = SoftwareDriver::new(&DriverConfig::default());
        let (vertices, indices) = quad_data(2);
        let two = [
            Submesh { index_first: 0, index_count: 6 },
            Submesh { index_first: 6, index_count: 6 },
        ];
        let mut mesh = Mesh::new(&mut driver, &vertices, &indices, &two);
        assert_eq!(mesh.submeshes().len(), 2);
        let first_primitive = mesh.primitive(0);

        let (vertices, indices) = quad_data(1);
        assert!(mesh.fits(vertices.len(), indices.len()));
        mesh.update(&mut driver, &vertices, &indices, &[Submesh { index_first: 0, index_count: 6 }]);

        assert_eq!(mesh.vertex_capacity(), 8);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.submeshes().len(), 1);
        assert_eq!(mesh.primitive(0), first_primitive);
        mesh.destroy(&mut driver);
    }

    #[test]
    #[should_panic(expected = "exceeds capacity")]
    fn test_update_past_capacity_panics() {
        let mut driver = SoftwareDriver::new(&DriverConfig::default());
        let (vertices, indices) = quad_data(1);
        let mut mesh = Mesh::new(&mut driver, &vertices, &indices, &[]);

        let (vertices, indices) = quad_data(2);
        mesh.update(&mut driver, &vertices, &indices, &[]);
    }
}
