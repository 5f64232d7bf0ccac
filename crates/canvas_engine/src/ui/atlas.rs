//! # Texture Atlas
//!
//! Packs view content into fixed-size RGBA8 layers.
//!
//! ## Packing
//!
//! Every layer is a binary tree. A free leaf that fits a request (with
//! padding) shrinks to exactly the requested size and gains two children
//! covering the L-shaped remainder. Nodes never merge back and nothing is
//! evicted: the atlas only grows, a new layer at a time.
//!
//! ## Caching
//!
//! Placements are cached by source [`ResourceId`], so content shared by many
//! views is packed and copied once.

use std::collections::HashMap;

use crate::core::config::AtlasConfig;
use crate::foundation::Recti;
use crate::render::driver::{Driver, FilterMode, TextureFormat};
use crate::render::{RenderResult, ResourceId, Texture};

use super::view::ViewContent;
use super::view_mesh::ViewMesh;

/// Node of a layer's packing tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasTreeNode {
    /// Area covered; the placed rectangle once the node is split
    pub rect: Recti,
    /// Layer index
    pub layer: u32,
    /// Remainder after a placement, `None` for a free leaf
    pub children: Option<Box<[AtlasTreeNode; 2]>>,
}

impl AtlasTreeNode {
    fn leaf(rect: Recti, layer: u32) -> Self {
        Self {
            rect,
            layer,
            children: None,
        }
    }

    /// First free leaf, depth-first, that fits `width` x `height` plus padding
    fn find_free(&mut self, width: i32, height: i32, padding: i32) -> Option<&mut Self> {
        match self.children {
            None => (self.rect.w - padding >= width && self.rect.h - padding >= height).then_some(self),
            Some(ref mut children) => {
                let [left, right] = children.as_mut();
                match left.find_free(width, height, padding) {
                    Some(node) => Some(node),
                    None => right.find_free(width, height, padding),
                }
            }
        }
    }

    /// Shrink to `width` x `height` and hand the remainder to two children
    fn split(&mut self, width: i32, height: i32, padding: i32) {
        let r = self.rect;
        let remain_w = r.w - width - padding;
        let remain_h = r.h - height - padding;

        let (left, right) = if remain_w <= remain_h {
            (
                Recti::new(r.x + width + padding, r.y, remain_w, height),
                Recti::new(r.x, r.y + height + padding, r.w, remain_h),
            )
        } else {
            (
                Recti::new(r.x, r.y + height + padding, width, remain_h),
                Recti::new(r.x + width + padding, r.y, remain_w, r.h),
            )
        };

        self.rect = Recti::new(r.x, r.y, width, height);
        self.children = Some(Box::new([
            Self::leaf(left, self.layer),
            Self::leaf(right, self.layer),
        ]));
    }

    /// Placed rectangles in this subtree
    fn collect_placed(&self, out: &mut Vec<(u32, Recti)>) {
        if let Some(children) = &self.children {
            out.push((self.layer, self.rect));
            for child in children.iter() {
                child.collect_placed(out);
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map_or(0, |children| children.iter().map(Self::node_count).sum())
    }
}

/// Where a source landed in the atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasPlacement {
    /// Layer index
    pub layer: u32,
    /// Rectangle inside the layer, pixels
    pub rect: Recti,
}

/// Result of an allocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Placement of the source
    pub placement: AtlasPlacement,
    /// False when the placement came from the cache
    pub fresh: bool,
}

/// Binary-split packer over fixed-size layers, without any GPU state
#[derive(Debug, Clone)]
pub struct AtlasPacker {
    layer_size: i32,
    padding: i32,
    roots: Vec<AtlasTreeNode>,
    cache: HashMap<ResourceId, AtlasPlacement>,
}

impl AtlasPacker {
    /// Packer with no layers yet
    ///
    /// # Arguments
    /// * `layer_size` - Width and height of every layer
    /// * `padding` - Gap kept to the right of and below each placement
    pub fn new(layer_size: u32, padding: u32) -> Self {
        let layer_size = i32::try_from(layer_size).unwrap_or(i32::MAX);
        let padding = i32::try_from(padding).unwrap_or(i32::MAX);
        assert!(padding < layer_size, "atlas padding {padding} must be smaller than the layer size {layer_size}");
        Self {
            layer_size,
            padding,
            roots: Vec::new(),
            cache: HashMap::new(),
        }
    }

    /// Width and height of a layer
    #[allow(clippy::cast_sign_loss)]
    pub fn layer_size(&self) -> u32 {
        self.layer_size as u32
    }

    /// Number of layers
    pub fn layer_count(&self) -> usize {
        self.roots.len()
    }

    /// Tree of layer `index`
    pub fn layer_root(&self, index: usize) -> &AtlasTreeNode {
        &self.roots[index]
    }

    /// Total nodes across every layer
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(AtlasTreeNode::node_count).sum()
    }

    /// Every placed rectangle with its layer
    pub fn placed_rects(&self) -> Vec<(u32, Recti)> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.collect_placed(&mut out);
        }
        out
    }

    /// Cached placement of `id`
    pub fn cached(&self, id: ResourceId) -> Option<AtlasPlacement> {
        self.cache.get(&id).copied()
    }

    /// Append an empty layer
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_layer(&mut self) -> u32 {
        let index = self.roots.len() as u32;
        self.roots
            .push(AtlasTreeNode::leaf(Recti::new(0, 0, self.layer_size, self.layer_size), index));
        index
    }

    /// Place a `width` x `height` source identified by `id`
    ///
    /// Repeated requests for the same `id` return the cached placement and
    /// leave the trees untouched. A new layer is added when no existing one
    /// has room.
    ///
    /// Panics when the request is larger than a layer minus padding.
    pub fn allocate(&mut self, id: ResourceId, width: u32, height: u32) -> Allocation {
        let limit = self.layer_size - self.padding;
        let (w, h) = (
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        );
        assert!(
            w <= limit && h <= limit,
            "atlas request {width}x{height} does not fit a {size}x{size} layer with {padding}px padding",
            size = self.layer_size,
            padding = self.padding
        );

        if let Some(placement) = self.cached(id) {
            return Allocation {
                placement,
                fresh: false,
            };
        }

        let padding = self.padding;
        let layer = match self.roots.iter_mut().position(|root| root.find_free(w, h, padding).is_some()) {
            Some(index) => index,
            None => {
                let index = self.add_layer() as usize;
                log::info!("Atlas grew to {} layers", self.roots.len());
                index
            }
        };

        let Some(node) = self.roots[layer].find_free(w, h, padding) else {
            panic!("atlas request {width}x{height} does not fit an empty layer");
        };
        node.split(w, h, padding);

        let placement = AtlasPlacement {
            layer: node.layer,
            rect: node.rect,
        };
        self.cache.insert(id, placement);
        Allocation {
            placement,
            fresh: true,
        }
    }
}

/// Atlas owning its layer textures
#[derive(Debug)]
pub struct TextureAtlas {
    packer: AtlasPacker,
    filter: FilterMode,
    layers: Vec<Texture>,
}

impl TextureAtlas {
    /// Atlas with one empty layer
    pub fn new(driver: &mut dyn Driver, config: &AtlasConfig) -> RenderResult<Self> {
        let mut atlas = Self {
            packer: AtlasPacker::new(config.layer_size, config.padding),
            filter: config.filter,
            layers: Vec::new(),
        };
        atlas.packer.add_layer();
        atlas.sync_layers(driver)?;
        Ok(atlas)
    }

    /// The packing state
    pub fn packer(&self) -> &AtlasPacker {
        &self.packer
    }

    /// Layer textures
    pub fn layers(&self) -> &[Texture] {
        &self.layers
    }

    /// Filter used when sampling the layers
    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    /// Create textures for layers the packer added
    fn sync_layers(&mut self, driver: &mut dyn Driver) -> RenderResult<()> {
        let size = self.packer.layer_size();
        while self.layers.len() < self.packer.layer_count() {
            let layer = Texture::new(driver, size, size, TextureFormat::Rgba8, self.filter)?;
            layer.update_region(driver, 0, 0, size, size, vec![0; size as usize * size as usize * 4]);
            log::debug!("Created atlas layer {} ({size}x{size})", self.layers.len());
            self.layers.push(layer);
        }
        Ok(())
    }

    /// Place the content of `mesh` and remap its texture coordinates
    ///
    /// UVs become `uv * scale + offset` within the layer and the layer index
    /// is stamped into `uv2.x`. Returns whether the atlas pixels changed.
    #[allow(clippy::cast_precision_loss)]
    pub fn place(&mut self, driver: &mut dyn Driver, mesh: &mut ViewMesh) -> RenderResult<bool> {
        let (Some(id), Some((width, height))) = (mesh.content.id(), mesh.content.size()) else {
            return Ok(false);
        };

        let allocation = self.packer.allocate(id, width, height);
        let AtlasPlacement { layer, rect } = allocation.placement;

        if allocation.fresh {
            self.sync_layers(driver)?;
            let target = &self.layers[layer as usize];
            match &mesh.content {
                ViewContent::Texture(texture) => {
                    target.copy_region_from(driver, rect.x, rect.y, texture, Recti::new(0, 0, rect.w, rect.h));
                }
                ViewContent::Image(image) => {
                    #[allow(clippy::cast_sign_loss)]
                    target.update_region(driver, rect.x as u32, rect.y as u32, width, height, image.pixels().to_vec());
                }
                ViewContent::None => {}
            }
        }

        let size = self.packer.layer_size() as f32;
        let offset = [rect.x as f32 / size, rect.y as f32 / size];
        let scale = [rect.w as f32 / size, rect.h as f32 / size];
        for vertex in &mut mesh.vertices {
            vertex.uv = [vertex.uv[0] * scale[0] + offset[0], vertex.uv[1] * scale[1] + offset[1]];
            vertex.uv2[0] = layer as f32;
        }

        Ok(allocation.fresh)
    }

    /// Release every layer texture
    pub fn destroy(self, driver: &mut dyn Driver) {
        for layer in &self.layers {
            layer.destroy(driver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_split_orientation() {
        let mut packer = AtlasPacker::new(2048, 1);
        packer.add_layer();
        let first = packer.allocate(ResourceId::next(), 100, 100);

        assert!(first.fresh);
        assert_eq!(first.placement.rect, Recti::new(0, 0, 100, 100));

        let root = packer.layer_root(0);
        let children = root.children.as_ref().unwrap();
        assert_eq!(children[0].rect, Recti::new(101, 0, 1947, 100));
        assert_eq!(children[1].rect, Recti::new(0, 101, 2048, 1947));
    }

    #[test]
    fn test_wide_remainder_splits_the_other_way() {
        let mut packer = AtlasPacker::new(100, 1);
        packer.add_layer();
        packer.allocate(ResourceId::next(), 10, 80);

        let children = packer.layer_root(0).children.as_ref().unwrap();
        assert_eq!(children[0].rect, Recti::new(0, 81, 10, 19));
        assert_eq!(children[1].rect, Recti::new(11, 0, 89, 100));
    }

    #[test]
    fn test_two_requests_do_not_overlap() {
        let mut packer = AtlasPacker::new(2048, 1);
        packer.add_layer();
        let a = packer.allocate(ResourceId::next(), 100, 100).placement;
        let b = packer.allocate(ResourceId::next(), 100, 100).placement;

        assert_eq!(a.layer, b.layer);
        assert!(!a.rect.intersects(&b.rect));
        assert_eq!(b.rect, Recti::new(0, 101, 100, 100));
    }

    #[test]
    fn test_cache_is_idempotent() {
        let mut packer = AtlasPacker::new(256, 1);
        packer.add_layer();
        let id = ResourceId::next();
        let first = packer.allocate(id, 30, 40);
        let nodes = packer.node_count();
        let tree = packer.layer_root(0).clone();

        let second = packer.allocate(id, 30, 40);

        assert!(!second.fresh);
        assert_eq!(first.placement, second.placement);
        assert_eq!(packer.node_count(), nodes);
        assert_eq!(packer.layer_root(0), &tree);
    }

    #[test]
    fn test_packing_soundness() {
        let padding = 1;
        let mut packer = AtlasPacker::new(128, 1);
        packer.add_layer();
        let sizes = [(60, 20), (7, 90), (33, 33), (120, 5), (1, 1), (50, 64), (64, 50), (90, 7), (12, 12), (120, 120)];
        for round in 0..4 {
            for &(w, h) in &sizes {
                packer.allocate(ResourceId::next(), w + round, h + round);
            }
        }

        let placed = packer.placed_rects();
        assert_eq!(placed.len(), sizes.len() * 4);
        for (i, &(layer_a, a)) in placed.iter().enumerate() {
            assert!(Recti::new(0, 0, 128, 128).contains(&a.expanded(padding)), "{a:?} leaves its layer");
            for &(layer_b, b) in &placed[i + 1..] {
                if layer_a == layer_b {
                    assert!(!a.expanded(padding).intersects(&b), "{a:?} overlaps {b:?} or its padding");
                    assert!(!b.expanded(padding).intersects(&a), "{b:?} overlaps {a:?} or its padding");
                }
            }
        }
        assert!(packer.layer_count() > 1);
    }

    #[test]
    fn test_new_layer_when_full() {
        let mut packer = AtlasPacker::new(64, 1);
        packer.add_layer();
        let a = packer.allocate(ResourceId::next(), 63, 63).placement;
        let b = packer.allocate(ResourceId::next(), 10, 10).placement;

        assert_eq!(a.layer, 0);
        assert_eq!(b.layer, 1);
        assert_eq!(b.rect, Recti::new(0, 0, 10, 10));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_oversized_request_panics() {
        let mut packer = AtlasPacker::new(2048, 1);
        packer.add_layer();
        packer.allocate(ResourceId::next(), 2048, 2048);
    }
}
