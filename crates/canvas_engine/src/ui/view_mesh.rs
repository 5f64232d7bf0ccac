//! Per-view quads and their merge into one batched mesh

use std::cmp::Ordering;

use super::tree::ViewId;
use super::view::ViewContent;
use crate::foundation::math::{Vec2i, Vec3};
use crate::foundation::{Color, Rect};
use crate::render::{CanvasVertex, Submesh};

/// Quad emitted for one view during a canvas rebuild
#[derive(Debug, Clone)]
pub struct ViewMesh {
    /// View the quad belongs to
    pub view: ViewId,
    /// Corners: top-left, bottom-left, bottom-right, top-right
    pub vertices: Vec<CanvasVertex>,
    /// Two triangles over `vertices`
    pub indices: Vec<u32>,
    /// Source drawn in the quad
    pub content: ViewContent,
    /// Effective clip rectangle, normalized to the canvas
    pub clip_rect: Rect,
}

impl ViewMesh {
    /// Quad over already transformed corners
    pub fn quad(view: ViewId, corners: [Vec3; 4], color: Color, content: ViewContent, clip_rect: Rect) -> Self {
        let uvs = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];
        let vertices = corners
            .iter()
            .zip(uvs)
            .map(|(corner, uv)| CanvasVertex::new(*corner, color, uv))
            .collect();

        Self {
            view,
            vertices,
            indices: vec![0, 1, 2, 0, 2, 3],
            content,
            clip_rect,
        }
    }

    /// Atlas layer stamped into the vertices
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn layer(&self) -> u32 {
        self.vertices.first().map_or(0, |v| v.uv2[0] as u32)
    }

    /// Point-in-quad test against the four (possibly rotated) edges
    ///
    /// The test is strict: points on an edge or corner count as outside.
    #[allow(clippy::cast_precision_loss)]
    pub fn contains_point(&self, point: Vec2i) -> bool {
        let [v0, v1, v2, v3] = match self.vertices.as_slice() {
            [a, b, c, d, ..] => [a, b, c, d].map(|v| (v.position[0], v.position[1])),
            _ => return false,
        };
        let (px, py) = (point.x as f32, point.y as f32);

        let mut all_positive = true;
        let mut all_negative = true;
        for ((x0, y0), (x1, y1)) in [(v0, v1), (v1, v2), (v2, v3), (v3, v0)] {
            // line through both corners: a*x + b*y + c = 0
            let a = y1 - y0;
            let b = x0 - x1;
            let c = x1 * y0 - x0 * y1;
            let side = a * px + b * py + c;
            if side >= 0.0 {
                all_negative = false;
            }
            if side <= 0.0 {
                all_positive = false;
            }
        }

        all_positive || all_negative
    }
}

/// Placement order for atlas packing
///
/// Quads without content come first. Among the rest, wider sources come
/// first and equal widths are ordered by height, tallest first. The sort is
/// stable, so ties keep tree order.
pub fn atlas_order(meshes: &[ViewMesh]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..meshes.len()).collect();
    order.sort_by(|&a, &b| match (meshes[a].content.size(), meshes[b].content.size()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some((aw, ah)), Some((bw, bh))) => bw.cmp(&aw).then(bh.cmp(&ah)),
    });
    order
}

/// Quads merged into one vertex and index buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedBatch {
    /// All vertices
    pub vertices: Vec<CanvasVertex>,
    /// Indices, already offset into `vertices`
    pub indices: Vec<u32>,
    /// One range per clip rectangle and atlas layer run
    pub submeshes: Vec<Submesh>,
    /// Clip rectangle of each submesh
    pub clip_rects: Vec<Rect>,
    /// Atlas layer of each submesh
    pub layers: Vec<u32>,
}

impl MergedBatch {
    /// True when nothing is drawn
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

/// Merge the quads that carry content, in tree order
///
/// A new submesh starts whenever the clip rectangle or the atlas layer
/// differs from the previous merged quad. Quads without content are layout
/// containers and are dropped.
#[allow(clippy::cast_possible_truncation)]
pub fn merge_view_meshes(meshes: &[ViewMesh]) -> MergedBatch {
    let mut batch = MergedBatch::default();

    for mesh in meshes {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() || !mesh.content.is_some() {
            continue;
        }

        let index_offset = batch.vertices.len() as u32;
        let index_first = batch.indices.len() as u32;
        let index_count = mesh.indices.len() as u32;
        let layer = mesh.layer();

        let continues = batch.clip_rects.last() == Some(&mesh.clip_rect) && batch.layers.last() == Some(&layer);
        match batch.submeshes.last_mut() {
            Some(submesh) if continues => submesh.index_count += index_count,
            _ => {
                batch.submeshes.push(Submesh {
                    index_first,
                    index_count,
                });
                batch.clip_rects.push(mesh.clip_rect);
                batch.layers.push(layer);
            }
        }

        batch.vertices.extend_from_slice(&mesh.vertices);
        batch.indices.extend(mesh.indices.iter().map(|i| index_offset + i));
    }

    batch
}
