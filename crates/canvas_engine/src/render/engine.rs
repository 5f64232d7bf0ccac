//! Graphics engine facade
//!
//! Owns the driver, the swap chain and the default render target, and runs
//! one canvas frame per [`GraphicsEngine::render_frame`] call.

use std::path::Path;

use crate::core::config::{CanvasConfig, EngineConfig};
use crate::foundation::logging;
use crate::foundation::Color;
use crate::render::driver::{
    create_driver, BufferDescriptor, BufferUsage, Driver, RenderPassParams, RenderTargetHandle, SwapChainHandle,
    TargetBufferFlags, UniformBufferHandle,
};
use crate::render::uniforms::{binding, PerViewUniforms};
use crate::render::{Camera, Image, RenderContext, RenderResult};
use crate::ui::{CanvasRenderer, Touch};

/// High-level frame driver for a canvas
///
/// ## Frame sequence
///
/// 1. `begin_frame` on the driver
/// 2. touches routed against the quads of the previous rebuild
/// 3. canvas prepare (projection, rebuild when dirty)
/// 4. per-view uniforms uploaded from the camera and the render context
/// 5. one render pass on the default target: clear, draw every submesh
/// 6. present, then `end_frame` releases the frame's scheduled buffers
pub struct GraphicsEngine {
    /// Selected backend
    driver: Box<dyn Driver>,

    /// Presentation surface
    swap_chain: SwapChainHandle,

    /// Target drawing into the swap chain
    render_target: RenderTargetHandle,

    /// Camera the canvas configures each frame
    camera: Camera,

    /// Lights and ambient color for the per-view block
    context: RenderContext,

    /// Per-view uniform block, rewritten every frame
    per_view_buffer: UniformBufferHandle,

    /// Canvas settings for [`GraphicsEngine::create_canvas`]
    canvas_config: CanvasConfig,

    /// Surface size
    width: u32,
    height: u32,

    frame_count: u64,
}

impl GraphicsEngine {
    /// Validate `config`, initialize logging and create the driver objects
    ///
    /// # Errors
    /// Returns an error for an invalid configuration or a backend that is
    /// not available in this build
    pub fn new(config: &EngineConfig) -> RenderResult<Self> {
        logging::init(&config.logging);
        config.validate()?;

        let mut driver = create_driver(&config.driver)?;
        log::info!(
            "Initializing graphics engine: {} backend, {}x{}",
            config.driver.backend.name(),
            config.width,
            config.height
        );

        let swap_chain = driver.create_swap_chain(config.width, config.height);
        driver.make_current(swap_chain);
        let render_target = driver.create_default_render_target();
        let per_view_buffer = driver.create_uniform_buffer(std::mem::size_of::<PerViewUniforms>(), BufferUsage::Dynamic);

        Ok(Self {
            driver,
            swap_chain,
            render_target,
            camera: Camera::new(config.width, config.height),
            context: RenderContext::new(),
            per_view_buffer,
            canvas_config: config.canvas.clone(),
            width: config.width,
            height: config.height,
            frame_count: 0,
        })
    }

    /// The driver
    pub fn driver(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    /// Camera used for the canvas pass
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Mutable camera, e.g. to restrict the viewport
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Per-frame rendering context
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// Mutable rendering context
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.context
    }

    /// Surface size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Create a canvas sized to the surface
    pub fn create_canvas(&mut self) -> RenderResult<CanvasRenderer> {
        CanvasRenderer::new(self.driver.as_mut(), &self.canvas_config, self.width, self.height)
    }

    /// Replace the swap chain with one of the new size
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        log::info!("Resizing surface: {}x{} -> {width}x{height}", self.width, self.height);
        self.driver.destroy_swap_chain(self.swap_chain);
        self.swap_chain = self.driver.create_swap_chain(width, height);
        self.driver.make_current(self.swap_chain);
        self.camera.set_target_size(width, height);
        self.width = width;
        self.height = height;
    }

    /// Route `touches`, prepare `canvas` and draw it into the swap chain
    pub fn render_frame(&mut self, canvas: &mut CanvasRenderer, touches: &[Touch]) -> RenderResult<()> {
        self.frame_count += 1;
        let frame_id = self.frame_count;
        let driver = self.driver.as_mut();
        driver.begin_frame(frame_id);

        canvas.handle_touches(touches);
        if let Err(error) = canvas.prepare(driver, &mut self.camera) {
            log::error!("Canvas prepare failed in frame {frame_id}: {error}");
            driver.end_frame(frame_id);
            return Err(error);
        }

        driver.make_current(self.swap_chain);

        let uniforms = self.context.per_view_uniforms(&self.camera.view_projection());
        driver.load_uniform_buffer(self.per_view_buffer, BufferDescriptor::from_slice(&[uniforms]));
        driver.bind_uniform_buffer(binding::PER_VIEW, self.per_view_buffer);

        let params = RenderPassParams {
            clear: TargetBufferFlags::COLOR | TargetBufferFlags::DEPTH,
            viewport: self.camera.viewport(),
            clear_color: self.canvas_config.clear_color,
            ..RenderPassParams::default()
        };
        driver.begin_render_pass(self.render_target, &params);
        canvas.draw(driver, &self.camera);
        driver.end_render_pass();

        driver.commit(self.swap_chain);
        driver.end_frame(frame_id);
        log::trace!("Frame {frame_id} complete");
        Ok(())
    }

    /// RGBA8 pixels of the last presented frame, top row first
    pub fn read_frame_pixels(&mut self) -> Vec<u8> {
        self.driver
            .read_pixels(self.render_target, 0, 0, self.width, self.height)
    }

    /// Color of one pixel of the last frame, `(0, 0)` being top-left
    pub fn read_frame_pixel(&mut self, x: u32, y: u32) -> Color {
        let pixel = self.driver.read_pixels(self.render_target, x, y, 1, 1);
        Color::from_rgba8(pixel[0], pixel[1], pixel[2], pixel[3])
    }

    /// Write the last frame as a PNG
    pub fn save_frame_png(&mut self, path: &Path) -> RenderResult<()> {
        let image = Image::from_raw(self.width, self.height, self.read_frame_pixels())?;
        image.save_png(path)?;
        log::info!("Saved frame {} to {}", self.frame_count, path.display());
        Ok(())
    }

    /// Release the engine's driver objects; canvases must be destroyed first
    pub fn destroy(mut self) {
        self.driver.destroy_uniform_buffer(self.per_view_buffer);
        self.driver.destroy_render_target(self.render_target);
        self.driver.destroy_swap_chain(self.swap_chain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{BackendKind, RenderError};

    fn config(width: u32, height: u32) -> EngineConfig {
        let mut config = EngineConfig {
            width,
            height,
            ..EngineConfig::default()
        };
        config.canvas.clear_color = Color::new(0.0, 0.0, 1.0, 1.0);
        config
    }

    #[test]
    fn test_empty_canvas_clears() {
        let mut engine = GraphicsEngine::new(&config(16, 8)).unwrap();
        let mut canvas = engine.create_canvas().unwrap();

        engine.render_frame(&mut canvas, &[]).unwrap();

        let pixels = engine.read_frame_pixels();
        assert_eq!(pixels.len(), 16 * 8 * 4);
        assert!(pixels.chunks_exact(4).all(|p| p == [0, 0, 255, 255]));
        assert_eq!(engine.frame_count(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = GraphicsEngine::new(&config(0, 8));
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    #[test]
    fn test_native_backend_is_unavailable() {
        let mut config = config(8, 8);
        config.driver.backend = BackendKind::Vulkan;
        let result = GraphicsEngine::new(&config);
        assert!(matches!(result, Err(RenderError::BackendUnavailable(BackendKind::Vulkan))));
    }

    #[test]
    fn test_resize_updates_camera_and_canvas() {
        let mut engine = GraphicsEngine::new(&config(16, 8)).unwrap();
        let mut canvas = engine.create_canvas().unwrap();

        engine.resize(32, 16);
        engine.render_frame(&mut canvas, &[]).unwrap();

        assert_eq!(engine.camera().target_width(), 32);
        assert_eq!(canvas.tree().canvas_size(), (32, 16));
        assert_eq!(engine.read_frame_pixels().len(), 32 * 16 * 4);
    }

    #[test]
    fn test_read_back_right_after_resize() {
        let mut engine = GraphicsEngine::new(&config(16, 8)).unwrap();
        let mut canvas = engine.create_canvas().unwrap();
        engine.render_frame(&mut canvas, &[]).unwrap();

        engine.resize(24, 12);

        assert_eq!(engine.read_frame_pixels().len(), 24 * 12 * 4);
        engine.read_frame_pixel(23, 11);
    }
}
