//! # Software Backend
//!
//! A complete [`Driver`] running on the CPU. It owns every resource in
//! generation-checked handle tables and executes draws with an edge-function
//! rasterizer and the [`BuiltinShader`](crate::render::driver::BuiltinShader) programs.
//!
//! ## Restrictions
//!
//! - Color formats are `R8`, `RG8`, `RGB8` and `RGBA8`; depth is stored as `f32`.
//!   Compressed formats can be created but not uploaded, sampled or rendered.
//! - Programs without built-in stages are accepted and draw nothing.
//! - Strip topologies are not supported.
//! - Only mip level 0 is sampled.
//!
//! Work completes synchronously, so fences are always signaled and upload
//! buffers are released as soon as their contents are copied.

mod raster;
mod resources;
mod shaders;

use std::collections::HashSet;

use self::raster::Rasterizer;
use self::resources::{
    ColorBuffer, Surface, SwFence, SwIndexBuffer, SwProgram, SwRenderPrimitive, SwRenderTarget, SwSamplerGroup,
    SwStream, SwSwapChain, SwTexture, SwUniformBuffer, SwVertexBuffer, TargetAttachments, TexelStorage,
};
use self::shaders::{BoundSampler, ShadedVertex, UniformSlots, Varyings};
use crate::core::config::DriverConfig;
use crate::foundation::Recti;
use crate::render::driver::render_pass::{RenderPassState, RenderPassTracker};
use crate::render::driver::release::ReleaseQueue;
use crate::render::driver::{
    AttributeArray, BackendKind, BufferDescriptor, BufferUsage, Driver, ElementType, FenceHandle, FenceStatus,
    FilterMode, HandleTable, IndexBufferHandle, PipelineState, PixelBufferDescriptor, PrimitiveType, Program,
    ProgramHandle, RenderPassParams, RenderPrimitiveHandle, RenderTargetHandle, SamplerGroup, SamplerGroupHandle,
    ShaderStage, StreamHandle, SwapChainHandle, TargetBufferFlags, TextureDesc, TextureFormat, TextureHandle,
    UniformBufferHandle, VertexBufferHandle, MAX_SAMPLER_GROUP_BINDINGS, MAX_UNIFORM_BINDINGS,
};

#[derive(Debug, Clone, Copy)]
struct UniformBinding {
    handle: UniformBufferHandle,
    offset: usize,
    size: Option<usize>,
}

/// Surface and rectangles of the open render pass
struct ActivePass {
    surface: Surface,
    viewport: Recti,
    scissor: Recti,
}

/// CPU implementation of [`Driver`]
pub struct SoftwareDriver {
    frame_id: u64,

    vertex_buffers: HandleTable<VertexBufferHandle, SwVertexBuffer>,
    index_buffers: HandleTable<IndexBufferHandle, SwIndexBuffer>,
    textures: HandleTable<TextureHandle, SwTexture>,
    sampler_groups: HandleTable<SamplerGroupHandle, SwSamplerGroup>,
    uniform_buffers: HandleTable<UniformBufferHandle, SwUniformBuffer>,
    primitives: HandleTable<RenderPrimitiveHandle, SwRenderPrimitive>,
    programs: HandleTable<ProgramHandle, SwProgram>,
    render_targets: HandleTable<RenderTargetHandle, SwRenderTarget>,
    swap_chains: HandleTable<SwapChainHandle, SwSwapChain>,
    fences: HandleTable<FenceHandle, SwFence>,
    streams: HandleTable<StreamHandle, SwStream>,

    release_queue: ReleaseQueue,
    passes: RenderPassTracker,
    pass: Option<ActivePass>,
    current_swap_chain: Option<SwapChainHandle>,
    uniform_bindings: [Option<UniformBinding>; MAX_UNIFORM_BINDINGS],
    sampler_bindings: [Option<SamplerGroupHandle>; MAX_SAMPLER_GROUP_BINDINGS],
    warned_programs: HashSet<ProgramHandle>,
}

impl SoftwareDriver {
    /// Create an empty driver
    pub fn new(config: &DriverConfig) -> Self {
        log::debug!(
            "Software driver ignores frames_in_flight={}; work completes synchronously",
            config.frames_in_flight
        );
        Self {
            frame_id: 0,
            vertex_buffers: HandleTable::new("vertex buffer"),
            index_buffers: HandleTable::new("index buffer"),
            textures: HandleTable::new("texture"),
            sampler_groups: HandleTable::new("sampler group"),
            uniform_buffers: HandleTable::new("uniform buffer"),
            primitives: HandleTable::new("render primitive"),
            programs: HandleTable::new("program"),
            render_targets: HandleTable::new("render target"),
            swap_chains: HandleTable::new("swap chain"),
            fences: HandleTable::new("fence"),
            streams: HandleTable::new("stream"),
            release_queue: ReleaseQueue::default(),
            passes: RenderPassTracker::default(),
            pass: None,
            current_swap_chain: None,
            uniform_bindings: [None; MAX_UNIFORM_BINDINGS],
            sampler_bindings: [None; MAX_SAMPLER_GROUP_BINDINGS],
            warned_programs: HashSet::new(),
        }
    }

    fn assert_not_in_pass(&self, target: RenderTargetHandle, operation: &str) {
        if let RenderPassState::Active { target: active, .. } = self.passes.state() {
            assert!(active != target, "{operation} on a render target inside its own render pass");
        }
    }

    fn current_swap_chain(&self) -> SwapChainHandle {
        match self.current_swap_chain {
            Some(handle) => handle,
            None => panic!("the default render target needs a swap chain; call make_current first"),
        }
    }

    /// Color attachment of `target` as (format, width, pixels)
    fn color_attachment(&self, target: RenderTargetHandle) -> (TextureFormat, u32, &[u8]) {
        let rt = self.render_targets.get(target);
        match &rt.attachments {
            TargetAttachments::Default { .. } => {
                let swap_chain = self.swap_chains.get(self.current_swap_chain());
                (TextureFormat::Rgba8, swap_chain.width, &swap_chain.color)
            }
            TargetAttachments::Offscreen { color: Some(color), .. } => {
                let texture = self.textures.get(*color);
                (texture.desc.format, texture.desc.width, &texture.color_levels()[0])
            }
            TargetAttachments::Offscreen { color: None, .. } => panic!("render target has no color attachment"),
        }
    }

    fn texture_attachment(&self, handle: TextureHandle, width: u32, height: u32, usage: &str) {
        let texture = self.textures.get(handle);
        assert!(
            self.is_render_target_format_supported(texture.desc.format),
            "{usage} attachment format {:?} cannot be rendered into",
            texture.desc.format
        );
        assert!(
            texture.desc.width == width && texture.desc.height == height,
            "{usage} attachment is {}x{}, render target is {width}x{height}",
            texture.desc.width,
            texture.desc.height
        );
    }
}

/// Copy a `width`x`height` rectangle at (`x`, `y`) out of tightly packed rows
fn copy_rect(data: &[u8], stride_px: u32, bpp: usize, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * bpp;
    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for row in y..y + height {
        let start = (row as usize * stride_px as usize + x as usize) * bpp;
        out.extend_from_slice(&data[start..start + row_bytes]);
    }
    out
}

/// Sample an RGBA texel from a sub-rectangle of tightly packed data, clamped to the rectangle
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn sample_rect(format: TextureFormat, data: &[u8], stride_px: u32, rect: Recti, x: f32, y: f32, filter: FilterMode) -> [f32; 4] {
    let texel = |tx: i32, ty: i32| {
        let tx = tx.clamp(rect.x, rect.right() - 1) as usize;
        let ty = ty.clamp(rect.y, rect.bottom() - 1) as usize;
        resources::decode_texel(format, data, ty * stride_px as usize + tx)
    };
    match filter {
        FilterMode::Nearest => texel(x.floor() as i32, y.floor() as i32),
        FilterMode::Linear => {
            let (fx, fy) = (x - 0.5, y - 0.5);
            let (x0, y0) = (fx.floor(), fy.floor());
            let (tx, ty) = (fx - x0, fy - y0);
            let (x0, y0) = (x0 as i32, y0 as i32);
            let (a, b, c, d) = (texel(x0, y0), texel(x0 + 1, y0), texel(x0, y0 + 1), texel(x0 + 1, y0 + 1));
            let mut out = [0.0; 4];
            for (i, value) in out.iter_mut().enumerate() {
                let top = a[i] + (b[i] - a[i]) * tx;
                let bottom = c[i] + (d[i] - c[i]) * tx;
                *value = top + (bottom - top) * ty;
            }
            out
        }
    }
}

#[allow(clippy::cast_sign_loss)]
fn assert_rect_inside(rect: Recti, width: u32, height: u32, what: &str) {
    assert!(
        rect.x >= 0
            && rect.y >= 0
            && rect.w >= 0
            && rect.h >= 0
            && (rect.right() as u32) <= width
            && (rect.bottom() as u32) <= height,
        "{what} rectangle {rect:?} exceeds {width}x{height}"
    );
}

impl Driver for SoftwareDriver {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn begin_frame(&mut self, frame_id: u64) {
        self.frame_id = frame_id;
        log::trace!("begin frame {frame_id}");
    }

    fn end_frame(&mut self, frame_id: u64) {
        let released = self.release_queue.purge();
        log::trace!("end frame {frame_id}, released {released} upload buffers");
    }

    fn schedule_destroy(&mut self, buffer: BufferDescriptor) {
        self.release_queue.schedule_destroy(buffer);
    }

    fn is_texture_format_supported(&self, format: TextureFormat) -> bool {
        !format.is_compressed()
    }

    fn is_render_target_format_supported(&self, format: TextureFormat) -> bool {
        !format.is_compressed()
    }

    fn can_generate_mipmaps(&self) -> bool {
        true
    }

    fn create_vertex_buffer(
        &mut self,
        buffer_count: u8,
        vertex_count: u32,
        attributes: AttributeArray,
        _usage: BufferUsage,
    ) -> VertexBufferHandle {
        self.vertex_buffers
            .insert(SwVertexBuffer::new(buffer_count, vertex_count, attributes))
    }

    fn create_index_buffer(&mut self, element_type: ElementType, index_count: u32, _usage: BufferUsage) -> IndexBufferHandle {
        self.index_buffers.insert(SwIndexBuffer::new(element_type, index_count))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle {
        if !self.is_texture_format_supported(desc.format) {
            log::warn!("Creating texture with unsupported format {:?}; it cannot hold texels", desc.format);
        }
        self.textures.insert(SwTexture::new(*desc))
    }

    fn create_sampler_group(&mut self, size: usize) -> SamplerGroupHandle {
        self.sampler_groups.insert(SwSamplerGroup {
            group: SamplerGroup::new(size),
        })
    }

    fn create_uniform_buffer(&mut self, size: usize, _usage: BufferUsage) -> UniformBufferHandle {
        self.uniform_buffers.insert(SwUniformBuffer { data: vec![0; size] })
    }

    fn create_render_primitive(&mut self) -> RenderPrimitiveHandle {
        self.primitives.insert(SwRenderPrimitive::default())
    }

    fn create_program(&mut self, program: Program) -> ProgramHandle {
        log::debug!("Creating program '{}'", program.name);
        self.programs.insert(SwProgram { program })
    }

    fn create_default_render_target(&mut self) -> RenderTargetHandle {
        self.render_targets.insert(SwRenderTarget {
            flags: TargetBufferFlags::COLOR | TargetBufferFlags::DEPTH,
            width: 0,
            height: 0,
            attachments: TargetAttachments::Default {
                depth: None,
                depth_size: (0, 0),
            },
        })
    }

    fn create_render_target(
        &mut self,
        flags: TargetBufferFlags,
        width: u32,
        height: u32,
        color: Option<TextureHandle>,
        depth: Option<TextureHandle>,
    ) -> RenderTargetHandle {
        if let Some(color) = color {
            self.texture_attachment(color, width, height, "color");
        }
        if let Some(depth) = depth {
            self.texture_attachment(depth, width, height, "depth");
            assert!(
                self.textures.get(depth).desc.format.is_depth(),
                "depth attachment must use a depth format"
            );
        }
        self.render_targets.insert(SwRenderTarget {
            flags,
            width,
            height,
            attachments: TargetAttachments::Offscreen {
                color: color.filter(|_| flags.contains(TargetBufferFlags::COLOR)),
                depth: depth.filter(|_| flags.contains(TargetBufferFlags::DEPTH)),
            },
        })
    }

    fn create_swap_chain(&mut self, width: u32, height: u32) -> SwapChainHandle {
        log::debug!("Creating {width}x{height} swap chain");
        self.swap_chains.insert(SwSwapChain::new(width, height))
    }

    fn create_fence(&mut self) -> FenceHandle {
        self.fences.insert(SwFence { frame_id: self.frame_id })
    }

    fn create_stream_from_texture_id(&mut self, external_id: u64, width: u32, height: u32) -> StreamHandle {
        #[allow(clippy::cast_possible_wrap)]
        let timestamp = self.frame_id as i64;
        self.streams.insert(SwStream {
            external_id,
            width,
            height,
            timestamp,
        })
    }

    fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        self.vertex_buffers.remove(handle);
    }

    fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        self.index_buffers.remove(handle);
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(handle);
    }

    fn destroy_sampler_group(&mut self, handle: SamplerGroupHandle) {
        self.sampler_groups.remove(handle);
        for slot in &mut self.sampler_bindings {
            if *slot == Some(handle) {
                *slot = None;
            }
        }
    }

    fn destroy_uniform_buffer(&mut self, handle: UniformBufferHandle) {
        self.uniform_buffers.remove(handle);
        for slot in &mut self.uniform_bindings {
            if slot.is_some_and(|binding| binding.handle == handle) {
                *slot = None;
            }
        }
    }

    fn destroy_render_primitive(&mut self, handle: RenderPrimitiveHandle) {
        self.primitives.remove(handle);
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        self.programs.remove(handle);
        self.warned_programs.remove(&handle);
    }

    fn destroy_render_target(&mut self, handle: RenderTargetHandle) {
        self.assert_not_in_pass(handle, "destroy_render_target");
        self.render_targets.remove(handle);
    }

    fn destroy_swap_chain(&mut self, handle: SwapChainHandle) {
        self.swap_chains.remove(handle);
        if self.current_swap_chain == Some(handle) {
            self.current_swap_chain = None;
        }
    }

    fn destroy_fence(&mut self, handle: FenceHandle) {
        self.fences.remove(handle);
    }

    fn destroy_stream(&mut self, handle: StreamHandle) {
        self.streams.remove(handle);
    }

    fn update_vertex_buffer(
        &mut self,
        handle: VertexBufferHandle,
        buffer_index: usize,
        data: BufferDescriptor,
        byte_offset: u32,
    ) {
        let vb = self.vertex_buffers.get_mut(handle);
        assert!(
            buffer_index < vb.buffers.len(),
            "vertex buffer has {} buffers, cannot update buffer {buffer_index}",
            vb.buffers.len()
        );
        let buffer = &mut vb.buffers[buffer_index];
        let start = byte_offset as usize;
        let end = start + data.len();
        assert!(end <= buffer.len(), "vertex upload of {end} bytes overflows buffer of {}", buffer.len());
        buffer[start..end].copy_from_slice(data.data());
        data.release();
    }

    fn update_index_buffer(&mut self, handle: IndexBufferHandle, data: BufferDescriptor, byte_offset: u32) {
        let ib = self.index_buffers.get_mut(handle);
        let start = byte_offset as usize;
        let end = start + data.len();
        assert!(end <= ib.data.len(), "index upload of {end} bytes overflows buffer of {}", ib.data.len());
        ib.data[start..end].copy_from_slice(data.data());
        data.release();
    }

    fn update_2d_image(
        &mut self,
        handle: TextureHandle,
        level: u8,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: PixelBufferDescriptor,
    ) {
        let texture = self.textures.get_mut(handle);
        let desc = texture.desc;
        assert!(
            data.format == desc.format,
            "pixel data in {:?} cannot be uploaded to a {:?} texture",
            data.format,
            desc.format
        );
        let Some(bpp) = desc.format.bytes_per_pixel().filter(|_| !desc.format.is_depth()) else {
            panic!("texture format {:?} cannot be uploaded by the software backend", desc.format);
        };
        assert!(level < desc.levels.max(1), "texture has no mip level {level}");
        let (level_w, level_h) = desc.level_size(level);
        assert!(
            x + width <= level_w && y + height <= level_h,
            "upload rectangle ({x}, {y}, {width}, {height}) exceeds level {level} of {level_w}x{level_h}"
        );
        let row_bytes = width as usize * bpp;
        assert!(
            data.buffer.len() >= row_bytes * height as usize,
            "upload of {width}x{height} needs {} bytes, got {}",
            row_bytes * height as usize,
            data.buffer.len()
        );

        let dst = &mut texture.color_levels_mut()[usize::from(level)];
        for row in 0..height as usize {
            let src_start = row * row_bytes;
            let dst_start = ((y as usize + row) * level_w as usize + x as usize) * bpp;
            dst[dst_start..dst_start + row_bytes].copy_from_slice(&data.buffer.data()[src_start..src_start + row_bytes]);
        }
        data.buffer.release();
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn blit_texture(&mut self, dst: TextureHandle, dst_rect: Recti, src: TextureHandle, src_rect: Recti, filter: FilterMode) {
        let src_texture = self.textures.get(src);
        let src_desc = src_texture.desc;
        assert_rect_inside(src_rect, src_desc.width, src_desc.height, "blit source");
        let src_data = &src_texture.color_levels()[0];

        let dst_desc = self.textures.get(dst).desc;
        assert_rect_inside(dst_rect, dst_desc.width, dst_desc.height, "blit destination");

        let Some(dst_bpp) = dst_desc.format.bytes_per_pixel() else {
            panic!("cannot blit into a {:?} texture", dst_desc.format);
        };

        // Resolve into a temporary so src and dst may be the same texture
        let pixels = if src_desc.format == dst_desc.format && src_rect.w == dst_rect.w && src_rect.h == dst_rect.h {
            copy_rect(
                src_data,
                src_desc.width,
                dst_bpp,
                src_rect.x as u32,
                src_rect.y as u32,
                src_rect.w as u32,
                src_rect.h as u32,
            )
        } else {
            let sx = src_rect.w as f32 / dst_rect.w.max(1) as f32;
            let sy = src_rect.h as f32 / dst_rect.h.max(1) as f32;
            let mut out = Vec::with_capacity(dst_rect.w as usize * dst_rect.h as usize * dst_bpp);
            for dy in 0..dst_rect.h {
                for dx in 0..dst_rect.w {
                    let x = src_rect.x as f32 + (dx as f32 + 0.5) * sx;
                    let y = src_rect.y as f32 + (dy as f32 + 0.5) * sy;
                    let texel = sample_rect(src_desc.format, src_data, src_desc.width, src_rect, x, y, filter);
                    out.extend(texel.iter().take(dst_bpp).map(|&v| resources::quantize(v)));
                }
            }
            out
        };

        let dst_data = &mut self.textures.get_mut(dst).color_levels_mut()[0];
        let row_bytes = dst_rect.w as usize * dst_bpp;
        for row in 0..dst_rect.h as usize {
            let start = ((dst_rect.y as usize + row) * dst_desc.width as usize + dst_rect.x as usize) * dst_bpp;
            dst_data[start..start + row_bytes].copy_from_slice(&pixels[row * row_bytes..(row + 1) * row_bytes]);
        }
    }

    fn generate_mipmaps(&mut self, handle: TextureHandle) {
        let texture = self.textures.get_mut(handle);
        let desc = texture.desc;
        let channels = desc.format.channel_count();
        let levels = texture.color_levels_mut();

        for level in 1..levels.len() {
            #[allow(clippy::cast_possible_truncation)]
            let (pw, ph) = desc.level_size((level - 1) as u8);
            #[allow(clippy::cast_possible_truncation)]
            let (w, h) = desc.level_size(level as u8);
            let (upper, lower) = levels.split_at_mut(level);
            let parent = &upper[level - 1];
            let child = &mut lower[0];

            for y in 0..h as usize {
                for x in 0..w as usize {
                    for c in 0..channels {
                        let mut sum = 0u32;
                        let mut count = 0u32;
                        for (ox, oy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                            let (px, py) = ((x * 2 + ox).min(pw as usize - 1), (y * 2 + oy).min(ph as usize - 1));
                            sum += u32::from(parent[(py * pw as usize + px) * channels + c]);
                            count += 1;
                        }
                        #[allow(clippy::cast_possible_truncation)]
                        let average = ((sum + count / 2) / count) as u8;
                        child[(y * w as usize + x) * channels + c] = average;
                    }
                }
            }
        }
        log::trace!("generated {} mip levels", levels.len().saturating_sub(1));
    }

    fn load_uniform_buffer(&mut self, handle: UniformBufferHandle, data: BufferDescriptor) {
        let buffer = self.uniform_buffers.get_mut(handle);
        assert!(
            data.len() <= buffer.data.len(),
            "uniform upload of {} bytes overflows buffer of {}",
            data.len(),
            buffer.data.len()
        );
        buffer.data[..data.len()].copy_from_slice(data.data());
        data.release();
    }

    fn update_sampler_group(&mut self, handle: SamplerGroupHandle, group: SamplerGroup) {
        self.sampler_groups.get_mut(handle).group = group;
    }

    fn set_stream_dimensions(&mut self, handle: StreamHandle, width: u32, height: u32) {
        #[allow(clippy::cast_possible_wrap)]
        let timestamp = self.frame_id as i64;
        let stream = self.streams.get_mut(handle);
        log::trace!(
            "stream {} resized from {}x{} to {width}x{height}",
            stream.external_id,
            stream.width,
            stream.height
        );
        stream.width = width;
        stream.height = height;
        stream.timestamp = timestamp;
    }

    fn stream_timestamp(&self, handle: StreamHandle) -> i64 {
        self.streams.get(handle).timestamp
    }

    fn set_render_primitive_buffer(
        &mut self,
        handle: RenderPrimitiveHandle,
        vertex_buffer: VertexBufferHandle,
        index_buffer: IndexBufferHandle,
        enabled_attributes: u32,
    ) {
        assert!(self.vertex_buffers.contains(vertex_buffer), "invalid vertex buffer handle {vertex_buffer:?}");
        assert!(self.index_buffers.contains(index_buffer), "invalid index buffer handle {index_buffer:?}");
        let primitive = self.primitives.get_mut(handle);
        primitive.vertex_buffer = Some(vertex_buffer);
        primitive.index_buffer = Some(index_buffer);
        primitive.enabled_attributes = enabled_attributes;
    }

    fn set_render_primitive_range(
        &mut self,
        handle: RenderPrimitiveHandle,
        primitive_type: PrimitiveType,
        offset: u32,
        min_index: u32,
        max_index: u32,
        count: u32,
    ) {
        let primitive = self.primitives.get_mut(handle);
        primitive.primitive_type = primitive_type;
        primitive.offset = offset;
        primitive.min_index = min_index;
        primitive.max_index = max_index;
        primitive.count = count;
    }

    fn make_current(&mut self, swap_chain: SwapChainHandle) {
        assert!(self.swap_chains.contains(swap_chain), "invalid swap chain handle {swap_chain:?}");
        self.current_swap_chain = Some(swap_chain);
    }

    #[allow(clippy::cast_possible_wrap)]
    fn begin_render_pass(&mut self, target: RenderTargetHandle, params: &RenderPassParams) {
        self.passes.begin(target, *params);

        let current_swap_chain = self.current_swap_chain;
        let rt = self.render_targets.get_mut(target);
        let flags = rt.flags;
        let mut surface = match &mut rt.attachments {
            TargetAttachments::Default { depth, depth_size } => {
                let Some(handle) = current_swap_chain else {
                    panic!("the default render target needs a swap chain; call make_current first");
                };
                let swap_chain = self.swap_chains.get_mut(handle);
                let size = (swap_chain.width, swap_chain.height);

                if flags.contains(TargetBufferFlags::DEPTH) && (depth.is_none() || *depth_size != size) {
                    log::debug!("Creating {}x{} depth buffer for the default render target", size.0, size.1);
                    *depth = Some(vec![1.0; (size.0 * size.1) as usize]);
                    *depth_size = size;
                }
                rt.width = size.0;
                rt.height = size.1;

                Surface {
                    width: size.0,
                    height: size.1,
                    color: Some(ColorBuffer {
                        format: TextureFormat::Rgba8,
                        pixels: std::mem::take(&mut swap_chain.color),
                    }),
                    depth: depth.take(),
                    swap_chain: Some(handle),
                }
            }
            TargetAttachments::Offscreen { color, depth } => {
                let color = color.map(|handle| {
                    let texture = self.textures.get_mut(handle);
                    let format = texture.desc.format;
                    ColorBuffer {
                        format,
                        pixels: std::mem::take(&mut texture.color_levels_mut()[0]),
                    }
                });
                let depth = depth.map(|handle| match &mut self.textures.get_mut(handle).storage {
                    TexelStorage::Depth(values) => std::mem::take(values),
                    _ => panic!("depth attachment has no depth storage"),
                });
                Surface {
                    width: rt.width,
                    height: rt.height,
                    color,
                    depth,
                    swap_chain: None,
                }
            }
        };

        if params.clear.contains(TargetBufferFlags::COLOR) {
            if let Some(color) = surface.color.as_mut() {
                color.clear(params.clear_color);
            }
        }
        if params.clear.contains(TargetBufferFlags::DEPTH) {
            if let Some(depth) = surface.depth.as_mut() {
                depth.fill(params.clear_depth);
            }
        }

        let full = Recti::new(0, 0, surface.width as i32, surface.height as i32);
        let vp = params.viewport;
        let viewport = if vp.width == 0 || vp.height == 0 {
            full
        } else {
            // Y-up viewport to Y-down window rows
            let y = surface.height as i32 - (vp.bottom + vp.height as i32);
            Recti::new(vp.left, y, vp.width as i32, vp.height as i32)
        };

        log::trace!("begin render pass {viewport:?} clear={:?}", params.clear);
        self.pass = Some(ActivePass {
            surface,
            viewport,
            scissor: full,
        });
    }

    fn end_render_pass(&mut self) {
        let target = self.passes.end();
        let Some(pass) = self.pass.take() else {
            panic!("end_render_pass called without an active render pass");
        };
        let surface = pass.surface;

        let rt = self.render_targets.get_mut(target);
        match &mut rt.attachments {
            TargetAttachments::Default { depth, .. } => {
                *depth = surface.depth;
                if let (Some(handle), Some(color)) = (surface.swap_chain, surface.color) {
                    self.swap_chains.get_mut(handle).color = color.pixels;
                }
            }
            TargetAttachments::Offscreen { color, depth } => {
                if let (Some(handle), Some(buffer)) = (*color, surface.color) {
                    self.textures.get_mut(handle).color_levels_mut()[0] = buffer.pixels;
                }
                if let (Some(handle), Some(values)) = (*depth, surface.depth) {
                    self.textures.get_mut(handle).storage = TexelStorage::Depth(values);
                }
            }
        }
        log::trace!("end render pass");
    }

    #[allow(clippy::cast_possible_wrap)]
    fn set_viewport_scissor(&mut self, left: i32, bottom: i32, width: u32, height: u32) {
        self.passes.require_active("set_viewport_scissor");
        let Some(pass) = self.pass.as_mut() else {
            panic!("set_viewport_scissor called outside of a render pass");
        };
        let y = pass.surface.height as i32 - (bottom + height as i32);
        pass.scissor = Recti::new(left, y, width as i32, height as i32);
    }

    fn bind_uniform_buffer(&mut self, index: usize, handle: UniformBufferHandle) {
        assert!(index < MAX_UNIFORM_BINDINGS, "uniform binding {index} out of range");
        assert!(self.uniform_buffers.contains(handle), "invalid uniform buffer handle {handle:?}");
        self.uniform_bindings[index] = Some(UniformBinding {
            handle,
            offset: 0,
            size: None,
        });
    }

    fn bind_uniform_buffer_range(&mut self, index: usize, handle: UniformBufferHandle, offset: usize, size: usize) {
        assert!(index < MAX_UNIFORM_BINDINGS, "uniform binding {index} out of range");
        let len = self.uniform_buffers.get(handle).data.len();
        assert!(
            offset + size <= len,
            "uniform range {offset}..{} exceeds buffer of {len} bytes",
            offset + size
        );
        self.uniform_bindings[index] = Some(UniformBinding {
            handle,
            offset,
            size: Some(size),
        });
    }

    fn bind_samplers(&mut self, index: usize, handle: SamplerGroupHandle) {
        assert!(index < MAX_SAMPLER_GROUP_BINDINGS, "sampler group binding {index} out of range");
        assert!(self.sampler_groups.contains(handle), "invalid sampler group handle {handle:?}");
        self.sampler_bindings[index] = Some(handle);
    }

    fn draw(&mut self, state: &PipelineState, primitive: RenderPrimitiveHandle) {
        self.passes.require_active("draw");

        let program = &self.programs.get(state.program).program;
        let (Some(vertex_stage), Some(fragment_stage)) = (
            program.builtin_stage(ShaderStage::Vertex),
            program.builtin_stage(ShaderStage::Fragment),
        ) else {
            if self.warned_programs.insert(state.program) {
                log::warn!("Program '{}' has no built-in stages; the software backend skips its draws", program.name);
            }
            return;
        };

        let prim = self.primitives.get(primitive);
        let (Some(vb_handle), Some(ib_handle)) = (prim.vertex_buffer, prim.index_buffer) else {
            panic!("draw: render primitive has no vertex and index buffer attached");
        };
        match prim.primitive_type {
            PrimitiveType::Points | PrimitiveType::Lines | PrimitiveType::Triangles => {}
            other => panic!("primitive topology {other:?} is not supported by the software backend"),
        }

        let vb = self.vertex_buffers.get(vb_handle);
        let ib = self.index_buffers.get(ib_handle);
        let first = prim.offset as usize;
        let count = prim.count as usize;
        assert!(
            first + count <= ib.index_count as usize,
            "draw range {first}..{} exceeds index buffer of {}",
            first + count,
            ib.index_count
        );

        let mut uniforms: UniformSlots<'_> = [None; MAX_UNIFORM_BINDINGS];
        for (slot, binding) in self.uniform_bindings.iter().enumerate() {
            if let Some(binding) = binding {
                let data = &self.uniform_buffers.get(binding.handle).data;
                let end = binding.size.map_or(data.len(), |size| binding.offset + size);
                uniforms[slot] = Some(&data[binding.offset..end]);
            }
        }

        let samplers: Vec<BoundSampler<'_>> = program
            .samplers
            .iter()
            .filter_map(|info| {
                assert!(info.group < MAX_SAMPLER_GROUP_BINDINGS, "sampler group binding {} out of range", info.group);
                let group = self.sampler_bindings[info.group]?;
                let binding = self.sampler_groups.get(group).group.samplers().get(info.index).copied().flatten()?;
                Some(BoundSampler {
                    texture: self.textures.get(binding.texture),
                    params: binding.params,
                })
            })
            .collect();

        let indices: Vec<u32> = (first..first + count).map(|i| ib.index(i)).collect();
        let (Some(&lowest), Some(&highest)) = (indices.iter().min(), indices.iter().max()) else {
            return;
        };
        assert!(
            highest < vb.vertex_count,
            "index {highest} out of range for vertex buffer of {} vertices",
            vb.vertex_count
        );

        debug_assert!(
            prim.max_index <= prim.min_index || (lowest >= prim.min_index && highest <= prim.max_index),
            "indices {lowest}..={highest} fall outside the declared range {}..={}",
            prim.min_index,
            prim.max_index
        );

        let shaded: Vec<ShadedVertex> = (lowest..=highest)
            .map(|index| {
                let inputs = shaders::fetch_vertex(vb, prim.enabled_attributes, index);
                shaders::run_vertex(vertex_stage, &inputs, &uniforms)
            })
            .collect();
        let vertex = |index: u32| &shaded[(index - lowest) as usize];

        let Some(pass) = self.pass.as_mut() else {
            panic!("draw called outside of a render pass");
        };
        let mut raster = Rasterizer::new(&mut pass.surface, pass.viewport, pass.scissor, state.raster);
        let mut shade = |varyings: &Varyings| shaders::run_fragment(fragment_stage, varyings, &uniforms, &samplers);

        match prim.primitive_type {
            PrimitiveType::Triangles => {
                for tri in indices.chunks_exact(3) {
                    raster.triangle([vertex(tri[0]), vertex(tri[1]), vertex(tri[2])], &mut shade);
                }
            }
            PrimitiveType::Lines => {
                for line in indices.chunks_exact(2) {
                    raster.line([vertex(line[0]), vertex(line[1])], &mut shade);
                }
            }
            _ => {
                for &index in &indices {
                    raster.point(vertex(index), &mut shade);
                }
            }
        }

        log::trace!("draw {:?} with {count} indices", prim.primitive_type);
    }

    fn commit(&mut self, swap_chain: SwapChainHandle) {
        let swap_chain = self.swap_chains.get_mut(swap_chain);
        swap_chain.presented_frames += 1;
        log::trace!("present {} ({} frames)", self.frame_id, swap_chain.presented_frames);
    }

    fn wait(&mut self, fence: FenceHandle, _timeout_ns: u64) -> FenceStatus {
        let fence = self.fences.get(fence);
        log::trace!("fence from frame {} already signaled", fence.frame_id);
        FenceStatus::ConditionSatisfied
    }

    fn read_pixels(&mut self, target: RenderTargetHandle, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        self.assert_not_in_pass(target, "read_pixels");
        let rt = self.render_targets.get(target);
        let (rt_width, rt_height) = match rt.attachments {
            TargetAttachments::Default { .. } => {
                let swap_chain = self.swap_chains.get(self.current_swap_chain());
                (swap_chain.width, swap_chain.height)
            }
            TargetAttachments::Offscreen { .. } => (rt.width, rt.height),
        };
        assert!(
            x + width <= rt_width && y + height <= rt_height,
            "read rectangle ({x}, {y}, {width}, {height}) exceeds target of {rt_width}x{rt_height}"
        );

        let (format, stride, data) = self.color_attachment(target);
        let Some(bpp) = format.bytes_per_pixel() else {
            panic!("cannot read back a {format:?} attachment");
        };
        copy_rect(data, stride, bpp, x, y, width, height)
    }

    fn read_texture(&mut self, handle: TextureHandle, level: u8) -> Vec<u8> {
        let texture = self.textures.get(handle);
        match &texture.storage {
            TexelStorage::Color(levels) => {
                assert!(usize::from(level) < levels.len(), "texture has no mip level {level}");
                levels[usize::from(level)].clone()
            }
            TexelStorage::Depth(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            TexelStorage::Unsupported => panic!("cannot read back a {:?} texture", texture.desc.format),
        }
    }
}
