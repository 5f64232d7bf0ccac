//! # Driver Types
//!
//! Backend-neutral descriptions of vertex layouts, texture formats, pipeline
//! state and render passes. Backends translate these into their native enums;
//! nothing in this module refers to a specific graphics API.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::handle::TextureHandle;
use crate::foundation::Color;

/// Maximum number of vertex attributes a primitive can enable
pub const MAX_VERTEX_ATTRIBUTE_COUNT: usize = 8;

/// Number of uniform buffer binding slots
pub const MAX_UNIFORM_BINDINGS: usize = 8;

/// Number of sampler group binding slots
pub const MAX_SAMPLER_GROUP_BINDINGS: usize = 4;

/// Marks an attribute slot that reads from no buffer
pub const NO_BUFFER: u8 = 0xFF;

/// Semantic slot of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexAttribute {
    /// Object-space position
    Position = 0,
    /// Tangent frame
    Tangents = 1,
    /// Per-vertex color
    Color = 2,
    /// Primary texture coordinates
    Uv0 = 3,
    /// Secondary texture coordinates (the canvas stores the atlas layer here)
    Uv1 = 4,
    /// Skinning bone indices
    BoneIndices = 5,
    /// Skinning bone weights
    BoneWeights = 6,
}

impl VertexAttribute {
    /// Bit for this attribute in an enabled-attributes mask
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }

    /// Slot index in an [`AttributeArray`]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Component type of a vertex attribute or index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Four signed bytes
    Byte4,
    /// Four unsigned bytes
    UByte4,
    /// Signed 16-bit integer
    Short,
    /// Unsigned 16-bit integer
    UShort,
    /// Signed 32-bit integer
    Int,
    /// Unsigned 32-bit integer
    UInt,
    /// One float
    Float,
    /// Two floats
    Float2,
    /// Three floats
    Float3,
    /// Four floats
    Float4,
}

impl ElementType {
    /// Size in bytes of one element
    pub const fn size(self) -> usize {
        match self {
            Self::Short | Self::UShort => 2,
            Self::Byte4 | Self::UByte4 | Self::Int | Self::UInt | Self::Float => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
        }
    }
}

bitflags! {
    /// Per-attribute flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeFlags: u8 {
        /// Integer components are normalized to `0..=1` (or `-1..=1`)
        const NORMALIZED = 1;
    }
}

/// Where one vertex attribute lives in the vertex buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    /// Byte offset of the first element
    pub offset: u32,
    /// Byte distance between consecutive vertices
    pub stride: u8,
    /// Buffer index inside the vertex buffer, or [`NO_BUFFER`]
    pub buffer: u8,
    /// Component type
    pub element_type: ElementType,
    /// Flags
    pub flags: AttributeFlags,
}

impl Default for Attribute {
    fn default() -> Self {
        Self {
            offset: 0,
            stride: 0,
            buffer: NO_BUFFER,
            element_type: ElementType::Float4,
            flags: AttributeFlags::empty(),
        }
    }
}

/// Attribute layout for a vertex buffer, indexed by [`VertexAttribute`]
pub type AttributeArray = [Attribute; MAX_VERTEX_ATTRIBUTE_COUNT];

/// Update frequency hint for buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    /// Written once
    #[default]
    Static,
    /// Rewritten occasionally
    Dynamic,
    /// Rewritten every frame
    Stream,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimitiveType {
    /// Point list
    Points,
    /// Line list
    Lines,
    /// Line strip
    LineStrip,
    /// Triangle list
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
}

/// Texel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// One 8-bit channel
    R8,
    /// Two 8-bit channels
    Rg8,
    /// Three 8-bit channels
    Rgb8,
    /// Four 8-bit channels
    Rgba8,
    /// 32-bit float depth
    Depth32F,
    /// Packed 24-bit depth and 8-bit stencil
    Depth24Stencil8,
    /// ETC2 compressed RGB
    Etc2Rgb8,
    /// ASTC 4x4 compressed RGBA
    Astc4x4Rgba,
}

impl TextureFormat {
    /// Bytes per texel for uncompressed formats
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::R8 => Some(1),
            Self::Rg8 => Some(2),
            Self::Rgb8 => Some(3),
            Self::Rgba8 | Self::Depth32F | Self::Depth24Stencil8 => Some(4),
            Self::Etc2Rgb8 | Self::Astc4x4Rgba => None,
        }
    }

    /// True for depth or depth-stencil formats
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32F | Self::Depth24Stencil8)
    }

    /// True for block-compressed formats
    pub const fn is_compressed(self) -> bool {
        matches!(self, Self::Etc2Rgb8 | Self::Astc4x4Rgba)
    }

    /// Number of color channels
    pub const fn channel_count(self) -> usize {
        match self {
            Self::R8 | Self::Depth32F | Self::Depth24Stencil8 => 1,
            Self::Rg8 => 2,
            Self::Rgb8 | Self::Etc2Rgb8 => 3,
            Self::Rgba8 | Self::Astc4x4Rgba => 4,
        }
    }
}

bitflags! {
    /// How a texture may be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u8 {
        /// Render target color attachment
        const COLOR_ATTACHMENT = 1 << 0;
        /// Render target depth attachment
        const DEPTH_ATTACHMENT = 1 << 1;
        /// Readable from shaders
        const SAMPLEABLE = 1 << 2;
        /// Writable from the CPU
        const UPLOADABLE = 1 << 3;
    }
}

/// Texture creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width of level 0
    pub width: u32,
    /// Height of level 0
    pub height: u32,
    /// Number of mip levels
    pub levels: u8,
    /// Texel format
    pub format: TextureFormat,
    /// Allowed usages
    pub usage: TextureUsage,
}

impl TextureDesc {
    /// A sampleable, uploadable 2D texture with one level
    pub const fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            levels: 1,
            format,
            usage: TextureUsage::SAMPLEABLE.union(TextureUsage::UPLOADABLE),
        }
    }

    /// Dimensions of mip `level`
    pub fn level_size(&self, level: u8) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    /// Nearest texel
    Nearest,
    /// Bilinear
    #[default]
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Clamp to the edge texel
    #[default]
    ClampToEdge,
    /// Tile
    Repeat,
    /// Tile, mirroring every other repetition
    MirroredRepeat,
}

/// Sampler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerParams {
    /// Magnification filter
    pub filter_mag: FilterMode,
    /// Minification filter
    pub filter_min: FilterMode,
    /// Horizontal wrap
    pub wrap_s: WrapMode,
    /// Vertical wrap
    pub wrap_t: WrapMode,
}

impl SamplerParams {
    /// Same filter both ways, clamped
    pub fn filtered(filter: FilterMode) -> Self {
        Self {
            filter_mag: filter,
            filter_min: filter,
            ..Self::default()
        }
    }
}

/// A texture bound together with its sampler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerBinding {
    /// Sampled texture
    pub texture: TextureHandle,
    /// Sampler state
    pub params: SamplerParams,
}

/// CPU-side contents of a sampler group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplerGroup {
    samplers: Vec<Option<SamplerBinding>>,
}

impl SamplerGroup {
    /// Group with `size` empty slots
    pub fn new(size: usize) -> Self {
        Self {
            samplers: vec![None; size],
        }
    }

    /// Bind a texture to slot `index`
    pub fn set_sampler(&mut self, index: usize, texture: TextureHandle, params: SamplerParams) {
        assert!(
            index < self.samplers.len(),
            "sampler index {index} out of range for group of {}",
            self.samplers.len()
        );
        self.samplers[index] = Some(SamplerBinding { texture, params });
    }

    /// Slot contents
    pub fn samplers(&self) -> &[Option<SamplerBinding>] {
        &self.samplers
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.samplers.len()
    }

    /// True when the group has no slots
    pub fn is_empty(&self) -> bool {
        self.samplers.is_empty()
    }
}

bitflags! {
    /// Attachments of a render target
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TargetBufferFlags: u8 {
        /// Color attachment
        const COLOR = 1 << 0;
        /// Depth attachment
        const DEPTH = 1 << 1;
        /// Stencil attachment
        const STENCIL = 1 << 2;
    }
}

/// Viewport in target pixels, origin at the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge
    pub left: i32,
    /// Bottom edge
    pub bottom: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Parameters for beginning a render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassParams {
    /// Attachments to clear on begin
    pub clear: TargetBufferFlags,
    /// Viewport (Y-up)
    pub viewport: Viewport,
    /// Clear color
    pub clear_color: Color,
    /// Clear depth
    pub clear_depth: f32,
    /// Clear stencil
    pub clear_stencil: u8,
}

impl Default for RenderPassParams {
    fn default() -> Self {
        Self {
            clear: TargetBufferFlags::empty(),
            viewport: Viewport::default(),
            clear_color: Color::TRANSPARENT,
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullingMode {
    /// Draw all faces
    #[default]
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
    /// Cull everything
    FrontAndBack,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunc {
    /// Never passes
    Never,
    /// Less than
    Less,
    /// Less or equal
    #[default]
    LessEqual,
    /// Equal
    Equal,
    /// Greater than
    Greater,
    /// Greater or equal
    GreaterEqual,
    /// Not equal
    NotEqual,
    /// Always passes
    Always,
}

impl CompareFunc {
    /// Evaluate `incoming <op> stored`
    pub fn test(self, incoming: f32, stored: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Less => incoming < stored,
            Self::LessEqual => incoming <= stored,
            Self::Equal => incoming == stored,
            Self::Greater => incoming > stored,
            Self::GreaterEqual => incoming >= stored,
            Self::NotEqual => incoming != stored,
            Self::Always => true,
        }
    }
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source color
    SrcColor,
    /// 1 - source color
    OneMinusSrcColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination color
    DstColor,
    /// 1 - destination color
    OneMinusDstColor,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendEquation {
    /// src + dst
    #[default]
    Add,
    /// src - dst
    Subtract,
    /// dst - src
    ReverseSubtract,
    /// min(src, dst)
    Min,
    /// max(src, dst)
    Max,
}

/// Rasterizer, blend and depth state for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterState {
    /// Face culling
    pub culling: CullingMode,
    /// Color blend equation
    pub blend_equation_rgb: BlendEquation,
    /// Alpha blend equation
    pub blend_equation_alpha: BlendEquation,
    /// Color source factor
    pub blend_src_rgb: BlendFactor,
    /// Color destination factor
    pub blend_dst_rgb: BlendFactor,
    /// Alpha source factor
    pub blend_src_alpha: BlendFactor,
    /// Alpha destination factor
    pub blend_dst_alpha: BlendFactor,
    /// Depth test
    pub depth_func: CompareFunc,
    /// Depth writes enabled
    pub depth_write: bool,
    /// Color writes enabled
    pub color_write: bool,
    /// Counter-clockwise winding is front-facing (in window space, Y-up)
    pub front_face_ccw: bool,
}

impl RasterState {
    /// Opaque geometry with depth testing
    pub const fn opaque() -> Self {
        Self {
            culling: CullingMode::Back,
            blend_equation_rgb: BlendEquation::Add,
            blend_equation_alpha: BlendEquation::Add,
            blend_src_rgb: BlendFactor::One,
            blend_dst_rgb: BlendFactor::Zero,
            blend_src_alpha: BlendFactor::One,
            blend_dst_alpha: BlendFactor::Zero,
            depth_func: CompareFunc::LessEqual,
            depth_write: true,
            color_write: true,
            front_face_ccw: true,
        }
    }

    /// Straight-alpha blending, no depth, no culling; what 2D overlays use
    pub const fn alpha_blended() -> Self {
        Self {
            culling: CullingMode::None,
            blend_equation_rgb: BlendEquation::Add,
            blend_equation_alpha: BlendEquation::Add,
            blend_src_rgb: BlendFactor::SrcAlpha,
            blend_dst_rgb: BlendFactor::OneMinusSrcAlpha,
            blend_src_alpha: BlendFactor::One,
            blend_dst_alpha: BlendFactor::OneMinusSrcAlpha,
            depth_func: CompareFunc::Always,
            depth_write: false,
            color_write: true,
            front_face_ccw: true,
        }
    }

    /// True unless blending reduces to a plain overwrite
    pub fn has_blending(&self) -> bool {
        !(self.blend_equation_rgb == BlendEquation::Add
            && self.blend_equation_alpha == BlendEquation::Add
            && self.blend_src_rgb == BlendFactor::One
            && self.blend_dst_rgb == BlendFactor::Zero
            && self.blend_src_alpha == BlendFactor::One
            && self.blend_dst_alpha == BlendFactor::Zero)
    }
}

impl Default for RasterState {
    fn default() -> Self {
        Self::opaque()
    }
}

/// Release callback attached to an upload buffer
pub type ReleaseCallback = Box<dyn FnOnce(Vec<u8>)>;

/// CPU bytes handed to the driver for an upload.
///
/// When a callback is attached the driver hands the bytes back through it
/// once it no longer needs them, which for scheduled destruction is after the
/// current frame ends.
pub struct BufferDescriptor {
    data: Vec<u8>,
    callback: Option<ReleaseCallback>,
}

impl BufferDescriptor {
    /// Wrap owned bytes
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, callback: None }
    }

    /// Copy a slice of plain-old-data values
    pub fn from_slice<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self::new(bytemuck::cast_slice(values).to_vec())
    }

    /// Attach a release callback
    pub fn with_callback(mut self, callback: impl FnOnce(Vec<u8>) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// The bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when there are no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Give the bytes back to their owner
    pub fn release(mut self) {
        if let Some(callback) = self.callback.take() {
            callback(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for BufferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferDescriptor")
            .field("len", &self.data.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Pixel upload: bytes plus the format they are laid out in
#[derive(Debug)]
pub struct PixelBufferDescriptor {
    /// Tightly packed rows, top row first
    pub buffer: BufferDescriptor,
    /// Layout of `buffer`
    pub format: TextureFormat,
}

impl PixelBufferDescriptor {
    /// Wrap tightly packed pixels
    pub fn new(data: Vec<u8>, format: TextureFormat) -> Self {
        Self {
            buffer: BufferDescriptor::new(data),
            format,
        }
    }
}

/// Result of waiting on a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The fenced work completed
    ConditionSatisfied,
    /// The timeout elapsed first
    TimeoutExpired,
    /// The fence cannot complete
    Error,
}
