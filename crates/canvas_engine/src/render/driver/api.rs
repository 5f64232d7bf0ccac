//! # Driver Command Interface
//!
//! The [`Driver`] trait is the single surface renderers talk to. Every call
//! takes or returns typed handles; backend-native objects never cross this
//! boundary.
//!
//! ## Contract
//!
//! - **Handles**: passing a destroyed or foreign handle is a programming error
//!   and panics.
//! - **Render passes**: `draw` and `set_viewport_scissor` are only valid between
//!   `begin_render_pass` and `end_render_pass`. Bindings persist across passes.
//! - **Uploads**: buffer descriptors are consumed by the call. Descriptors given
//!   to `schedule_destroy` are released after the current frame ends.
//! - **Coordinates**: viewports and scissors use a bottom-left origin (Y-up);
//!   `read_pixels` rows are returned top row first.

use super::handle::{
    FenceHandle, IndexBufferHandle, ProgramHandle, RenderPrimitiveHandle, RenderTargetHandle, SamplerGroupHandle,
    StreamHandle, SwapChainHandle, TextureHandle, UniformBufferHandle, VertexBufferHandle,
};
use super::program::Program;
use super::types::{
    AttributeArray, BufferDescriptor, BufferUsage, ElementType, FenceStatus, FilterMode, PixelBufferDescriptor,
    PrimitiveType, RasterState, RenderPassParams, SamplerGroup, TargetBufferFlags, TextureDesc, TextureFormat,
};
use super::BackendKind;
use crate::foundation::Recti;

/// Program plus fixed-function state for one draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineState {
    /// Shader program
    pub program: ProgramHandle,
    /// Rasterizer, blend and depth state
    pub raster: RasterState,
}

/// # Driver Trait
///
/// Backend-neutral GPU command interface. One implementation exists per
/// native API; the engine picks one at startup through
/// [`create_driver`](super::create_driver).
pub trait Driver {
    /// Which backend this is
    fn backend_kind(&self) -> BackendKind;

    // --- frame bracketing -------------------------------------------------

    /// Start recording frame `frame_id`
    fn begin_frame(&mut self, frame_id: u64);

    /// Finish frame `frame_id`; releases buffers scheduled for destruction
    fn end_frame(&mut self, frame_id: u64);

    /// Keep `buffer` alive until the current frame ends, then release it
    fn schedule_destroy(&mut self, buffer: BufferDescriptor);

    // --- capabilities -----------------------------------------------------

    /// Whether textures of `format` can be created and uploaded
    fn is_texture_format_supported(&self, format: TextureFormat) -> bool;

    /// Whether `format` can be rendered into
    fn is_render_target_format_supported(&self, format: TextureFormat) -> bool;

    /// Whether [`generate_mipmaps`](Self::generate_mipmaps) is available
    fn can_generate_mipmaps(&self) -> bool;

    // --- creation ---------------------------------------------------------

    /// Create a vertex buffer
    ///
    /// # Arguments
    /// * `buffer_count` - Number of separate data buffers
    /// * `vertex_count` - Vertices per buffer
    /// * `attributes` - Where each enabled attribute lives
    /// * `usage` - Update frequency hint
    fn create_vertex_buffer(
        &mut self,
        buffer_count: u8,
        vertex_count: u32,
        attributes: AttributeArray,
        usage: BufferUsage,
    ) -> VertexBufferHandle;

    /// Create an index buffer of 16- or 32-bit indices
    fn create_index_buffer(&mut self, element_type: ElementType, index_count: u32, usage: BufferUsage) -> IndexBufferHandle;

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle;

    /// Create a sampler group with `size` slots
    fn create_sampler_group(&mut self, size: usize) -> SamplerGroupHandle;

    /// Create a uniform buffer of `size` bytes
    fn create_uniform_buffer(&mut self, size: usize, usage: BufferUsage) -> UniformBufferHandle;

    /// Create an empty render primitive
    fn create_render_primitive(&mut self) -> RenderPrimitiveHandle;

    /// Create a program
    fn create_program(&mut self, program: Program) -> ProgramHandle;

    /// Create the target that renders into the current swap chain.
    ///
    /// Its depth buffer is created lazily on the first pass, sized from the
    /// swap chain.
    fn create_default_render_target(&mut self) -> RenderTargetHandle;

    /// Create an offscreen target from existing textures
    fn create_render_target(
        &mut self,
        flags: TargetBufferFlags,
        width: u32,
        height: u32,
        color: Option<TextureHandle>,
        depth: Option<TextureHandle>,
    ) -> RenderTargetHandle;

    /// Create a swap chain of the given size
    fn create_swap_chain(&mut self, width: u32, height: u32) -> SwapChainHandle;

    /// Create a fence signaled once previously submitted work completes
    fn create_fence(&mut self) -> FenceHandle;

    /// Wrap an externally produced texture id as a stream
    fn create_stream_from_texture_id(&mut self, external_id: u64, width: u32, height: u32) -> StreamHandle;

    // --- destruction ------------------------------------------------------

    /// Destroy a vertex buffer
    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle);
    /// Destroy an index buffer
    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle);
    /// Destroy a texture
    fn destroy_texture(&mut self, handle: TextureHandle);
    /// Destroy a sampler group
    fn destroy_sampler_group(&mut self, handle: SamplerGroupHandle);
    /// Destroy a uniform buffer
    fn destroy_uniform_buffer(&mut self, handle: UniformBufferHandle);
    /// Destroy a render primitive
    fn destroy_render_primitive(&mut self, handle: RenderPrimitiveHandle);
    /// Destroy a program
    fn destroy_program(&mut self, handle: ProgramHandle);
    /// Destroy a render target
    fn destroy_render_target(&mut self, handle: RenderTargetHandle);
    /// Destroy a swap chain
    fn destroy_swap_chain(&mut self, handle: SwapChainHandle);
    /// Destroy a fence
    fn destroy_fence(&mut self, handle: FenceHandle);
    /// Destroy a stream
    fn destroy_stream(&mut self, handle: StreamHandle);

    // --- updates ----------------------------------------------------------

    /// Write bytes into one buffer of a vertex buffer at `byte_offset`
    fn update_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        buffer_index: usize,
        data: BufferDescriptor,
        byte_offset: u32,
    );

    /// Write bytes into an index buffer at `byte_offset`
    fn update_index_buffer(&mut self, handle: IndexBufferHandle, data: BufferDescriptor, byte_offset: u32);

    /// Upload pixels into a sub-rectangle of a texture level
    ///
    /// `x`/`y` address the rectangle from the top-left texel.
    #[allow(clippy::too_many_arguments)]
    fn update_2d_image(
        &mut self,
        handle: TextureHandle,
        level: u8,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: PixelBufferDescriptor,
    );

    /// Copy a rectangle between textures on the device
    fn blit_texture(&mut self, dst: TextureHandle, dst_rect: Recti, src: TextureHandle, src_rect: Recti, filter: FilterMode);

    /// Fill every level below 0 from level 0
    fn generate_mipmaps(&mut self, handle: TextureHandle);

    /// Replace the contents of a uniform buffer
    fn load_uniform_buffer(&mut self, handle: UniformBufferHandle, data: BufferDescriptor);

    /// Replace the bindings of a sampler group
    fn update_sampler_group(&mut self, handle: SamplerGroupHandle, group: SamplerGroup);

    /// Resize a stream
    fn set_stream_dimensions(&mut self, handle: StreamHandle, width: u32, height: u32);

    /// Timestamp of the latest stream frame
    fn stream_timestamp(&self, handle: StreamHandle) -> i64;

    // --- primitives -------------------------------------------------------

    /// Attach buffers to a primitive
    ///
    /// # Arguments
    /// * `enabled_attributes` - Mask of [`VertexAttribute`](super::types::VertexAttribute) bits the draw fetches
    fn set_render_primitive_buffer(
        &mut self,
        handle: RenderPrimitiveHandle,
        vertex_buffer: VertexBufferHandle,
        index_buffer: IndexBufferHandle,
        enabled_attributes: u32,
    );

    /// Set the topology and index range a primitive draws
    #[allow(clippy::too_many_arguments)]
    fn set_render_primitive_range(
        &mut self,
        handle: RenderPrimitiveHandle,
        primitive_type: PrimitiveType,
        offset: u32,
        min_index: u32,
        max_index: u32,
        count: u32,
    );

    // --- passes and drawing -----------------------------------------------

    /// Make a swap chain the destination of the default render target
    fn make_current(&mut self, swap_chain: SwapChainHandle);

    /// Open a render pass on `target`, clearing as requested
    fn begin_render_pass(&mut self, target: RenderTargetHandle, params: &RenderPassParams);

    /// Close the open render pass
    fn end_render_pass(&mut self);

    /// Restrict drawing to a rectangle of the current target (Y-up)
    fn set_viewport_scissor(&mut self, left: i32, bottom: i32, width: u32, height: u32);

    /// Bind a whole uniform buffer to slot `index`
    fn bind_uniform_buffer(&mut self, index: usize, handle: UniformBufferHandle);

    /// Bind `size` bytes at `offset` of a uniform buffer to slot `index`
    fn bind_uniform_buffer_range(&mut self, index: usize, handle: UniformBufferHandle, offset: usize, size: usize);

    /// Bind a sampler group to slot `index`
    fn bind_samplers(&mut self, index: usize, handle: SamplerGroupHandle);

    /// Draw a primitive with the given pipeline state
    fn draw(&mut self, state: &PipelineState, primitive: RenderPrimitiveHandle);

    /// Present the swap chain
    fn commit(&mut self, swap_chain: SwapChainHandle);

    /// Wait for a fence
    fn wait(&mut self, fence: FenceHandle, timeout_ns: u64) -> FenceStatus;

    /// Read back tightly packed pixels of the target's color attachment
    ///
    /// `x`/`y` address the rectangle from the top-left pixel. The data uses
    /// the attachment's format.
    fn read_pixels(&mut self, target: RenderTargetHandle, x: u32, y: u32, width: u32, height: u32) -> Vec<u8>;

    /// Read back a texture level, tightly packed in the texture's format
    fn read_texture(&mut self, handle: TextureHandle, level: u8) -> Vec<u8>;
}
