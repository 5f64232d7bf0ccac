//! Canvas compositor
//!
//! Owns the view tree, the texture atlas and one retained mesh. Every
//! [`CanvasRenderer::prepare`] that finds the tree dirty lays it out, packs
//! the view contents into the atlas and merges the quads into as few
//! submeshes as clip rectangles and atlas layers allow. Each submesh draws
//! with its own material under its own scissor rectangle.

use std::path::{Path, PathBuf};

use super::atlas::TextureAtlas;
use super::touch::{Touch, TouchRouter};
use super::tree::{ViewId, ViewTree};
use super::view_mesh::{atlas_order, merge_view_meshes, MergedBatch, ViewMesh};
use crate::core::config::CanvasConfig;
use crate::foundation::math::{round_to_int, Mat4};
use crate::foundation::Rect;
use crate::render::driver::{
    BuiltinShader, Driver, Program, ProgramHandle, RasterState, SamplerParams, Viewport,
};
use crate::render::uniforms::{binding, sampler_binding};
use crate::render::{Camera, Image, Material, Mesh, RenderResult};

/// Retained UI compositor for one render target
pub struct CanvasRenderer {
    /// Projection and atlas parameters
    config: CanvasConfig,

    /// Every view the canvas knows, attached or not
    tree: ViewTree,

    /// Per-finger touch state
    touch: TouchRouter,

    /// Packed view contents
    atlas: TextureAtlas,

    /// Built-in canvas program shared by all materials
    program: ProgramHandle,

    /// Quads of the last rebuild, tree order
    view_meshes: Vec<ViewMesh>,

    /// Merged geometry, `None` while nothing is drawn
    mesh: Option<Mesh>,

    /// One material per submesh
    materials: Vec<Material>,
}

impl CanvasRenderer {
    /// Create an empty canvas with one atlas layer
    ///
    /// # Arguments
    /// * `driver` - Driver the atlas, program and meshes live in
    /// * `config` - Atlas and projection parameters
    /// * `width` - Initial canvas width in pixels
    /// * `height` - Initial canvas height in pixels
    pub fn new(driver: &mut dyn Driver, config: &CanvasConfig, width: u32, height: u32) -> RenderResult<Self> {
        let atlas = TextureAtlas::new(driver, &config.atlas)?;
        let program = driver.create_program(
            Program::builtin("canvas", BuiltinShader::Canvas)
                .uniform_block("PerView", binding::PER_VIEW)
                .uniform_block("Material", binding::MATERIAL)
                .sampler("atlas", sampler_binding::MATERIAL, 0),
        );
        log::info!("Canvas created: {width}x{height}, atlas layers of {}px", config.atlas.layer_size);

        Ok(Self {
            config: config.clone(),
            tree: ViewTree::new(width, height),
            touch: TouchRouter::new(),
            atlas,
            program,
            view_meshes: Vec::new(),
            mesh: None,
            materials: Vec::new(),
        })
    }

    /// The view tree
    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    /// The view tree, for creating and editing views
    pub fn tree_mut(&mut self) -> &mut ViewTree {
        &mut self.tree
    }

    /// Attach `view` as a root, drawn above the existing roots
    ///
    /// Panics if the view is already on the canvas or has a parent.
    pub fn add_view(&mut self, view: ViewId) {
        self.tree.attach_root(view);
        self.tree.mark_dirty();
    }

    /// Detach a root view; it stays alive in the tree
    pub fn remove_view(&mut self, view: ViewId) {
        self.tree.detach_root(view);
        self.tree.mark_dirty();
    }

    /// Detach every root view
    pub fn remove_all_views(&mut self) {
        self.tree.detach_all_roots();
    }

    /// Force a rebuild on the next prepare
    pub fn mark_dirty(&mut self) {
        self.tree.mark_dirty();
    }

    /// Resize the canvas; a size change triggers a rebuild
    pub fn resize(&mut self, width: u32, height: u32) {
        self.tree.set_canvas_size(width, height);
    }

    /// Route touches against the quads of the last rebuild
    pub fn handle_touches(&mut self, touches: &[Touch]) {
        for touch in touches {
            self.touch.route(&mut self.tree, &self.view_meshes, touch);
        }
    }

    /// Touch state, for inspection
    pub fn touch_router(&self) -> &TouchRouter {
        &self.touch
    }

    /// Point `camera` at the canvas and rebuild if anything changed
    ///
    /// The projection pins the canvas origin to the top-left corner of the
    /// viewport with Y pointing down, one unit per target pixel vertically.
    ///
    /// # Returns
    /// Whether a rebuild ran
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn prepare(&mut self, driver: &mut dyn Driver, camera: &mut Camera) -> RenderResult<bool> {
        let target_height = camera.target_height() as f32;
        let right = target_height * camera.aspect();
        camera.set_orthographic(true);
        camera.set_clip_planes(self.config.near_clip, self.config.far_clip);
        camera.set_projection_matrix(Mat4::new_orthographic(
            0.0,
            right,
            target_height,
            0.0,
            self.config.near_clip,
            self.config.far_clip,
        ));
        self.resize(round_to_int(right).max(0) as u32, camera.target_height());

        if !self.tree.take_dirty() {
            return Ok(false);
        }

        self.tree.update_layout();
        self.view_meshes.clear();
        self.tree.fill_meshes(&mut self.view_meshes);

        for index in atlas_order(&self.view_meshes) {
            if let Err(error) = self.atlas.place(driver, &mut self.view_meshes[index]) {
                self.tree.mark_dirty();
                return Err(error);
            }
        }

        let batch = merge_view_meshes(&self.view_meshes);
        self.upload(driver, &batch);

        log::debug!(
            "Canvas rebuilt: {} quads, {} submeshes, {} atlas layers",
            self.view_meshes.len(),
            batch.submeshes.len(),
            self.atlas.layers().len()
        );
        Ok(true)
    }

    fn upload(&mut self, driver: &mut dyn Driver, batch: &MergedBatch) {
        if batch.is_empty() {
            if let Some(mesh) = self.mesh.take() {
                mesh.destroy(driver);
            }
            for material in self.materials.drain(..) {
                material.destroy(driver);
            }
            return;
        }

        let fits = self
            .mesh
            .as_ref()
            .is_some_and(|mesh| mesh.fits(batch.vertices.len(), batch.indices.len()));
        if fits {
            if let Some(mesh) = self.mesh.as_mut() {
                mesh.update(driver, &batch.vertices, &batch.indices, &batch.submeshes);
            }
        } else {
            if let Some(mesh) = self.mesh.take() {
                mesh.destroy(driver);
            }
            self.mesh = Some(Mesh::new(driver, &batch.vertices, &batch.indices, &batch.submeshes));
        }

        if self.materials.len() != batch.submeshes.len() {
            for material in self.materials.drain(..) {
                material.destroy(driver);
            }
            for index in 0..batch.submeshes.len() {
                self.materials.push(Material::new(
                    driver,
                    format!("canvas_{index}"),
                    self.program,
                    RasterState::alpha_blended(),
                ));
            }
        }

        let params = SamplerParams::filtered(self.atlas.filter());
        let layers = self.atlas.layers();
        for ((material, clip_rect), layer) in self.materials.iter_mut().zip(&batch.clip_rects).zip(&batch.layers) {
            material.set_scissor_rect(*clip_rect);
            material.set_texture(layers[*layer as usize].handle(), params);
        }
    }

    /// Draw every submesh inside the current render pass
    ///
    /// The per-view uniforms must already be bound.
    pub fn draw(&mut self, driver: &mut dyn Driver, camera: &Camera) {
        let Some(mesh) = &self.mesh else {
            return;
        };
        let viewport = camera.viewport();

        for (index, material) in self.materials.iter_mut().enumerate() {
            material.bind(driver);
            let (left, bottom, width, height) = scissor_pixels(material.scissor_rect(), viewport);
            driver.set_viewport_scissor(left, bottom, width, height);
            driver.draw(&material.pipeline_state(), mesh.primitive(index));
        }
    }

    /// Quads of the last rebuild
    pub fn view_meshes(&self) -> &[ViewMesh] {
        &self.view_meshes
    }

    /// Merged mesh of the last rebuild
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// Per-submesh materials
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// The texture atlas
    pub fn atlas(&self) -> &TextureAtlas {
        &self.atlas
    }

    /// Write every atlas layer as `atlas_layer_<n>.png` under `dir`
    pub fn save_atlas_layers(&self, driver: &mut dyn Driver, dir: &Path) -> RenderResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut paths = Vec::new();
        for (index, layer) in self.atlas.layers().iter().enumerate() {
            let image = Image::from_raw(layer.width(), layer.height(), layer.read_back(driver))?;
            let path = dir.join(format!("atlas_layer_{index}.png"));
            image.save_png(&path)?;
            log::info!("Saved atlas layer {index} to {}", path.display());
            paths.push(path);
        }
        Ok(paths)
    }

    /// Release every driver resource the canvas owns
    pub fn destroy(self, driver: &mut dyn Driver) {
        if let Some(mesh) = self.mesh {
            mesh.destroy(driver);
        }
        for material in self.materials {
            material.destroy(driver);
        }
        self.atlas.destroy(driver);
        driver.destroy_program(self.program);
    }
}

/// Normalized top-left clip rectangle to a Y-up scissor inside `viewport`
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn scissor_pixels(rect: Rect, viewport: Viewport) -> (i32, i32, u32, u32) {
    let pixels = rect.to_pixels(viewport.width, viewport.height);
    (
        viewport.left + pixels.x,
        viewport.bottom + viewport.height as i32 - pixels.bottom(),
        pixels.w as u32,
        pixels.h as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DriverConfig;
    use crate::foundation::math::{Point3, Vec2, Vec2i};
    use crate::foundation::Color;
    use crate::render::backends::SoftwareDriver;
    use crate::ui::view::ViewAlignment;
    use std::rc::Rc;

    fn setup() -> (SoftwareDriver, CanvasRenderer, Camera) {
        let mut driver = SoftwareDriver::new(&DriverConfig::default());
        let canvas = CanvasRenderer::new(&mut driver, &CanvasConfig::default(), 800, 600).unwrap();
        (driver, canvas, Camera::new(800, 600))
    }

    fn image_view(canvas: &mut CanvasRenderer, size: i32, offset: i32) -> ViewId {
        let tree = canvas.tree_mut();
        let id = tree.create_view();
        let view = tree.view_mut(id);
        view.set_alignment(ViewAlignment::LEFT | ViewAlignment::TOP);
        view.set_pivot(Vec2::zeros());
        view.set_size(Vec2i::new(size, size));
        view.set_offset(Vec2i::new(offset, offset));
        view.set_image(Rc::new(Image::solid(size.unsigned_abs(), size.unsigned_abs(), Color::WHITE)));
        id
    }

    #[test]
    fn test_prepare_rebuilds_only_when_dirty() {
        let (mut driver, mut canvas, mut camera) = setup();
        let view = image_view(&mut canvas, 20, 0);
        canvas.add_view(view);

        assert!(canvas.prepare(&mut driver, &mut camera).unwrap());
        assert!(!canvas.prepare(&mut driver, &mut camera).unwrap());

        canvas.tree_mut().view_mut(view).set_offset(Vec2i::new(5, 5));
        assert!(canvas.prepare(&mut driver, &mut camera).unwrap());
        assert_eq!(canvas.tree().view(view).rect().x, 5);
    }

    #[test]
    fn test_projection_pins_top_left() {
        let (mut driver, mut canvas, mut camera) = setup();
        canvas.prepare(&mut driver, &mut camera).unwrap();

        let projection = camera.projection_matrix();
        let top_left = projection.transform_point(&Point3::new(0.0, 0.0, 0.0));
        let bottom_right = projection.transform_point(&Point3::new(800.0, 600.0, 0.0));
        approx::assert_relative_eq!(top_left.x, -1.0);
        approx::assert_relative_eq!(top_left.y, 1.0);
        approx::assert_relative_eq!(bottom_right.x, 1.0);
        approx::assert_relative_eq!(bottom_right.y, -1.0);
        assert_eq!(canvas.tree().canvas_size(), (800, 600));
    }

    #[test]
    fn test_containers_are_not_drawn() {
        let (mut driver, mut canvas, mut camera) = setup();
        let container = canvas.tree_mut().create_view();
        canvas.add_view(container);

        canvas.prepare(&mut driver, &mut camera).unwrap();

        assert_eq!(canvas.view_meshes().len(), 1);
        assert!(canvas.mesh().is_none());
        assert!(canvas.materials().is_empty());
    }

    #[test]
    fn test_mesh_is_updated_in_place_when_it_fits() {
        let (mut driver, mut canvas, mut camera) = setup();
        let a = image_view(&mut canvas, 10, 0);
        let b = image_view(&mut canvas, 10, 20);
        canvas.add_view(a);
        canvas.add_view(b);
        canvas.prepare(&mut driver, &mut camera).unwrap();
        assert_eq!(canvas.mesh().map(Mesh::vertex_capacity), Some(8));

        canvas.remove_view(b);
        canvas.prepare(&mut driver, &mut camera).unwrap();

        let mesh = canvas.mesh().unwrap();
        assert_eq!(mesh.vertex_capacity(), 8);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(canvas.materials().len(), 1);
    }

    #[test]
    fn test_clip_change_splits_submeshes() {
        let (mut driver, mut canvas, mut camera) = setup();
        let clip = image_view(&mut canvas, 100, 0);
        let inner = image_view(&mut canvas, 10, 0);
        let outer = image_view(&mut canvas, 10, 200);
        canvas.tree_mut().view_mut(clip).enable_clip_rect(true);
        canvas.tree_mut().add_subview(clip, inner);
        canvas.add_view(clip);
        canvas.add_view(outer);

        canvas.prepare(&mut driver, &mut camera).unwrap();

        let materials = canvas.materials();
        assert_eq!(materials.len(), 2);
        approx::assert_relative_eq!(materials[0].scissor_rect().w, 100.0 / 800.0);
        assert_eq!(materials[1].scissor_rect(), Rect::full());
        assert_eq!(materials[0].texture(), Some(canvas.atlas().layers()[0].handle()));
    }

    #[test]
    fn test_scissor_pixels_flip_to_y_up() {
        let viewport = Viewport {
            left: 0,
            bottom: 0,
            width: 800,
            height: 600,
        };
        assert_eq!(scissor_pixels(Rect::new(0.0, 0.0, 0.5, 0.5), viewport), (0, 300, 400, 300));
        assert_eq!(scissor_pixels(Rect::full(), viewport), (0, 0, 800, 600));
        assert_eq!(scissor_pixels(Rect::new(0.5, 0.5, 0.0, 0.0), viewport), (400, 300, 0, 0));
    }
}
