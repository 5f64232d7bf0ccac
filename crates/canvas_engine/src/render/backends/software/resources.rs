//! CPU-resident objects behind software driver handles

use crate::foundation::Color;
use crate::render::driver::{
    AttributeArray, ElementType, IndexBufferHandle, PrimitiveType, Program, SamplerGroup,
    SwapChainHandle, TargetBufferFlags, TextureDesc, TextureFormat, TextureHandle, VertexBufferHandle, NO_BUFFER,
};

pub(super) struct SwVertexBuffer {
    pub attributes: AttributeArray,
    pub vertex_count: u32,
    pub buffers: Vec<Vec<u8>>,
}

impl SwVertexBuffer {
    pub fn new(buffer_count: u8, vertex_count: u32, attributes: AttributeArray) -> Self {
        let buffers = (0..buffer_count)
            .map(|index| {
                let size = attributes
                    .iter()
                    .filter(|attr| attr.buffer != NO_BUFFER && attr.buffer == index)
                    .map(|attr| {
                        let stride = if attr.stride == 0 { attr.element_type.size() } else { usize::from(attr.stride) };
                        attr.offset as usize + stride * vertex_count as usize
                    })
                    .max()
                    .unwrap_or(0);
                vec![0; size]
            })
            .collect();

        Self {
            attributes,
            vertex_count,
            buffers,
        }
    }
}

pub(super) struct SwIndexBuffer {
    pub element_type: ElementType,
    pub index_count: u32,
    pub data: Vec<u8>,
}

impl SwIndexBuffer {
    pub fn new(element_type: ElementType, index_count: u32) -> Self {
        assert!(
            matches!(element_type, ElementType::UShort | ElementType::UInt),
            "index buffers hold 16- or 32-bit unsigned indices, got {element_type:?}"
        );
        Self {
            element_type,
            index_count,
            data: vec![0; element_type.size() * index_count as usize],
        }
    }

    /// Index `i`, little endian
    pub fn index(&self, i: usize) -> u32 {
        match self.element_type {
            ElementType::UShort => {
                let at = i * 2;
                u32::from(u16::from_le_bytes([self.data[at], self.data[at + 1]]))
            }
            _ => {
                let at = i * 4;
                u32::from_le_bytes([self.data[at], self.data[at + 1], self.data[at + 2], self.data[at + 3]])
            }
        }
    }
}

/// Texel storage of a texture
pub(super) enum TexelStorage {
    /// One byte vector per mip level, rows top first
    Color(Vec<Vec<u8>>),
    /// Level 0 depth values
    Depth(Vec<f32>),
    /// Formats the rasterizer cannot address
    Unsupported,
}

pub(super) struct SwTexture {
    pub desc: TextureDesc,
    pub storage: TexelStorage,
}

impl SwTexture {
    pub fn new(desc: TextureDesc) -> Self {
        let storage = if desc.format.is_depth() {
            Some(TexelStorage::Depth(vec![1.0; (desc.width * desc.height) as usize]))
        } else {
            desc.format.bytes_per_pixel().map(|bpp| {
                let levels = (0..desc.levels.max(1))
                    .map(|level| {
                        let (w, h) = desc.level_size(level);
                        vec![0; (w * h) as usize * bpp]
                    })
                    .collect();
                TexelStorage::Color(levels)
            })
        };

        Self {
            desc,
            storage: storage.unwrap_or(TexelStorage::Unsupported),
        }
    }

    pub fn color_levels(&self) -> &[Vec<u8>] {
        match &self.storage {
            TexelStorage::Color(levels) => levels,
            TexelStorage::Depth(_) => panic!("texture of format {:?} has no color texels", self.desc.format),
            TexelStorage::Unsupported => {
                panic!("texture format {:?} is not supported by the software backend", self.desc.format)
            }
        }
    }

    pub fn color_levels_mut(&mut self) -> &mut Vec<Vec<u8>> {
        let format = self.desc.format;
        match &mut self.storage {
            TexelStorage::Color(levels) => levels,
            TexelStorage::Depth(_) => panic!("texture of format {format:?} has no color texels"),
            TexelStorage::Unsupported => panic!("texture format {format:?} is not supported by the software backend"),
        }
    }
}

pub(super) struct SwUniformBuffer {
    pub data: Vec<u8>,
}

pub(super) struct SwSamplerGroup {
    pub group: SamplerGroup,
}

#[derive(Default)]
pub(super) struct SwRenderPrimitive {
    pub vertex_buffer: Option<VertexBufferHandle>,
    pub index_buffer: Option<IndexBufferHandle>,
    pub enabled_attributes: u32,
    pub primitive_type: PrimitiveType,
    pub offset: u32,
    pub min_index: u32,
    pub max_index: u32,
    pub count: u32,
}

pub(super) struct SwProgram {
    pub program: Program,
}

pub(super) enum TargetAttachments {
    /// Renders into the current swap chain; depth is allocated on first use
    Default { depth: Option<Vec<f32>>, depth_size: (u32, u32) },
    /// Renders into textures
    Offscreen {
        color: Option<TextureHandle>,
        depth: Option<TextureHandle>,
    },
}

pub(super) struct SwRenderTarget {
    pub flags: TargetBufferFlags,
    pub width: u32,
    pub height: u32,
    pub attachments: TargetAttachments,
}

pub(super) struct SwSwapChain {
    pub width: u32,
    pub height: u32,
    pub color: Vec<u8>,
    pub presented_frames: u64,
}

impl SwSwapChain {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color: vec![0; (width * height * 4) as usize],
            presented_frames: 0,
        }
    }
}

pub(super) struct SwFence {
    pub frame_id: u64,
}

pub(super) struct SwStream {
    pub external_id: u64,
    pub width: u32,
    pub height: u32,
    pub timestamp: i64,
}

/// Color buffer taken out of its owner for the length of a render pass
pub(super) struct ColorBuffer {
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

impl ColorBuffer {
    pub fn channels(&self) -> usize {
        self.format.channel_count()
    }

    pub fn read(&self, index: usize) -> [f32; 4] {
        decode_texel(self.format, &self.pixels, index)
    }

    pub fn write(&mut self, index: usize, color: [f32; 4]) {
        let channels = self.channels();
        let at = index * channels;
        for (c, value) in color.iter().take(channels).enumerate() {
            self.pixels[at + c] = quantize(*value);
        }
    }

    pub fn clear(&mut self, color: Color) {
        let texel = color.to_rgba8();
        let channels = self.channels();
        for chunk in self.pixels.chunks_exact_mut(channels) {
            chunk.copy_from_slice(&texel[..channels]);
        }
    }
}

/// Attachments of the target a pass renders into
pub(super) struct Surface {
    pub width: u32,
    pub height: u32,
    pub color: Option<ColorBuffer>,
    pub depth: Option<Vec<f32>>,
    /// Swap chain the color buffer came from, for default targets
    pub swap_chain: Option<SwapChainHandle>,
}

pub(super) fn quantize(value: f32) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let byte = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    byte
}

/// Read texel `index` of tightly packed 8-bit data as RGBA
pub(super) fn decode_texel(format: TextureFormat, data: &[u8], index: usize) -> [f32; 4] {
    let unorm = |b: u8| f32::from(b) / 255.0;
    let channels = format.channel_count();
    let at = index * channels;
    match channels {
        1 => [unorm(data[at]), 0.0, 0.0, 1.0],
        2 => [unorm(data[at]), unorm(data[at + 1]), 0.0, 1.0],
        3 => [unorm(data[at]), unorm(data[at + 1]), unorm(data[at + 2]), 1.0],
        _ => [unorm(data[at]), unorm(data[at + 1]), unorm(data[at + 2]), unorm(data[at + 3])],
    }
}
