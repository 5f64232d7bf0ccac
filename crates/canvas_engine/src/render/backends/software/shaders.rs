//! Built-in shading programs executed on the CPU
//!
//! Vertex inputs are fetched from the bound vertex buffers according to the
//! attribute layout, uniform blocks are read straight out of the bound
//! uniform buffer bytes, and textures are sampled with the bound sampler
//! state.

use bytemuck::Pod;

use super::resources::{decode_texel, SwTexture, SwVertexBuffer};
use crate::foundation::math::{Mat4, Vec4};
use crate::render::driver::{
    AttributeFlags, BuiltinShader, ElementType, FilterMode, SamplerParams, VertexAttribute, WrapMode,
    MAX_UNIFORM_BINDINGS, MAX_VERTEX_ATTRIBUTE_COUNT, NO_BUFFER,
};
use crate::render::uniforms::{binding, MaterialUniforms, PerRenderableUniforms, PerViewUniforms};

/// Interpolated per-vertex outputs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct Varyings {
    pub color: [f32; 4],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
}

impl Varyings {
    pub fn blend2(v: [&Self; 2], w: [f32; 2]) -> Self {
        Self::weighted(&v, &w)
    }

    pub fn blend3(v: [&Self; 3], w: [f32; 3]) -> Self {
        Self::weighted(&v, &w)
    }

    fn weighted(v: &[&Self], w: &[f32]) -> Self {
        let mut out = Self::default();
        for (varyings, &weight) in v.iter().zip(w) {
            for c in 0..4 {
                out.color[c] += varyings.color[c] * weight;
            }
            for c in 0..2 {
                out.uv0[c] += varyings.uv0[c] * weight;
                out.uv1[c] += varyings.uv1[c] * weight;
            }
        }
        out
    }
}

/// Output of the vertex stage
#[derive(Debug, Clone, Copy)]
pub(super) struct ShadedVertex {
    pub clip: Vec4,
    pub varyings: Varyings,
}

/// Uniform bytes bound to each slot for the current draw
pub(super) type UniformSlots<'a> = [Option<&'a [u8]>; MAX_UNIFORM_BINDINGS];

/// A texture plus sampler state resolved for the current draw
pub(super) struct BoundSampler<'a> {
    pub texture: &'a SwTexture,
    pub params: SamplerParams,
}

/// Raw attribute values of one vertex, indexed by [`VertexAttribute`]
pub(super) type VertexInputs = [[f32; 4]; MAX_VERTEX_ATTRIBUTE_COUNT];

/// Read all enabled attributes of vertex `index`
pub(super) fn fetch_vertex(vb: &SwVertexBuffer, enabled: u32, index: u32) -> VertexInputs {
    let mut inputs = [[0.0, 0.0, 0.0, 1.0]; MAX_VERTEX_ATTRIBUTE_COUNT];

    for (slot, attr) in vb.attributes.iter().enumerate() {
        if enabled & (1 << slot) == 0 || attr.buffer == NO_BUFFER {
            continue;
        }
        let size = attr.element_type.size();
        let stride = if attr.stride == 0 { size } else { usize::from(attr.stride) };
        let at = attr.offset as usize + stride * index as usize;
        let bytes = &vb.buffers[usize::from(attr.buffer)][at..at + size];
        inputs[slot] = decode_element(attr.element_type, attr.flags, bytes);
    }

    inputs
}

#[allow(clippy::cast_precision_loss)]
fn decode_element(element_type: ElementType, flags: AttributeFlags, bytes: &[u8]) -> [f32; 4] {
    let normalized = flags.contains(AttributeFlags::NORMALIZED);
    let float = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    let mut out = [0.0, 0.0, 0.0, 1.0];

    match element_type {
        ElementType::Float | ElementType::Float2 | ElementType::Float3 | ElementType::Float4 => {
            for (c, value) in out.iter_mut().take(element_type.size() / 4).enumerate() {
                *value = float(c * 4);
            }
        }
        ElementType::UByte4 => {
            for (c, value) in out.iter_mut().enumerate() {
                let raw = f32::from(bytes[c]);
                *value = if normalized { raw / 255.0 } else { raw };
            }
        }
        ElementType::Byte4 => {
            for (c, value) in out.iter_mut().enumerate() {
                let raw = f32::from(i8::from_le_bytes([bytes[c]]));
                *value = if normalized { (raw / 127.0).max(-1.0) } else { raw };
            }
        }
        ElementType::Short => {
            let raw = f32::from(i16::from_le_bytes([bytes[0], bytes[1]]));
            out[0] = if normalized { (raw / 32767.0).max(-1.0) } else { raw };
        }
        ElementType::UShort => {
            let raw = f32::from(u16::from_le_bytes([bytes[0], bytes[1]]));
            out[0] = if normalized { raw / 65535.0 } else { raw };
        }
        ElementType::Int => out[0] = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
        ElementType::UInt => out[0] = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
    }

    out
}

/// Read the uniform block bound at `slot` as `T`
fn uniform_block<T: Pod>(slots: &UniformSlots<'_>, slot: usize, shader: BuiltinShader) -> T {
    let Some(bytes) = slots[slot] else {
        panic!("{shader:?} shader reads uniform binding {slot}, but nothing is bound there");
    };
    let size = std::mem::size_of::<T>();
    assert!(
        bytes.len() >= size,
        "uniform binding {slot} holds {} bytes, {shader:?} shader needs {size}",
        bytes.len()
    );
    bytemuck::pod_read_unaligned(&bytes[..size])
}

/// Run the vertex stage of a built-in shader
pub(super) fn run_vertex(shader: BuiltinShader, inputs: &VertexInputs, uniforms: &UniformSlots<'_>) -> ShadedVertex {
    let position = inputs[VertexAttribute::Position.index()];
    let position = Vec4::new(position[0], position[1], position[2], 1.0);
    let per_view: PerViewUniforms = uniform_block(uniforms, binding::PER_VIEW, shader);
    let view_projection = Mat4::from(per_view.view_projection);

    let clip = match shader {
        BuiltinShader::Canvas => view_projection * position,
        BuiltinShader::VertexColor => {
            let renderable: PerRenderableUniforms = uniform_block(uniforms, binding::PER_RENDERABLE, shader);
            view_projection * Mat4::from(renderable.model) * position
        }
    };

    let uv = |attribute: VertexAttribute| {
        let v = inputs[attribute.index()];
        [v[0], v[1]]
    };

    ShadedVertex {
        clip,
        varyings: Varyings {
            color: inputs[VertexAttribute::Color.index()],
            uv0: uv(VertexAttribute::Uv0),
            uv1: uv(VertexAttribute::Uv1),
        },
    }
}

/// Run the fragment stage of a built-in shader
pub(super) fn run_fragment(
    shader: BuiltinShader,
    varyings: &Varyings,
    uniforms: &UniformSlots<'_>,
    samplers: &[BoundSampler<'_>],
) -> Option<[f32; 4]> {
    let color = varyings.color;
    match shader {
        BuiltinShader::Canvas => {
            let material: MaterialUniforms = uniform_block(uniforms, binding::MATERIAL, shader);
            let texel = samplers.first().map_or([1.0; 4], |s| sample(s, varyings.uv0));
            let mut out = [0.0; 4];
            for (c, value) in out.iter_mut().enumerate() {
                *value = texel[c] * color[c] * material.color[c];
            }
            (out[3] > 0.0).then_some(out)
        }
        BuiltinShader::VertexColor => {
            let material: MaterialUniforms = uniform_block(uniforms, binding::MATERIAL, shader);
            let per_view: PerViewUniforms = uniform_block(uniforms, binding::PER_VIEW, shader);
            let ambient = per_view.ambient_color;
            Some([
                color[0] * material.color[0] * ambient[0],
                color[1] * material.color[1] * ambient[1],
                color[2] * material.color[2] * ambient[2],
                color[3] * material.color[3],
            ])
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn wrap(coord: i32, size: u32, mode: WrapMode) -> usize {
    let size = size as i32;
    let wrapped = match mode {
        WrapMode::ClampToEdge => coord.clamp(0, size - 1),
        WrapMode::Repeat => coord.rem_euclid(size),
        WrapMode::MirroredRepeat => {
            let period = coord.rem_euclid(size * 2);
            if period < size {
                period
            } else {
                size * 2 - 1 - period
            }
        }
    };
    #[allow(clippy::cast_sign_loss)]
    let index = wrapped as usize;
    index
}

/// Sample level 0 of a texture; `(0, 0)` is the top-left corner
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub(super) fn sample(sampler: &BoundSampler<'_>, uv: [f32; 2]) -> [f32; 4] {
    let desc = sampler.texture.desc;
    let data = &sampler.texture.color_levels()[0];
    let (w, h) = (desc.width, desc.height);
    let params = sampler.params;
    let texel = |x: i32, y: i32| {
        let index = wrap(y, h, params.wrap_t) * w as usize + wrap(x, w, params.wrap_s);
        decode_texel(desc.format, data, index)
    };

    let u = uv[0] * w as f32;
    let v = uv[1] * h as f32;

    match params.filter_mag {
        FilterMode::Nearest => texel(u.floor() as i32, v.floor() as i32),
        FilterMode::Linear => {
            let (fu, fv) = (u - 0.5, v - 0.5);
            let (x0, y0) = (fu.floor(), fv.floor());
            let (tx, ty) = (fu - x0, fv - y0);
            let (x0, y0) = (x0 as i32, y0 as i32);

            let t00 = texel(x0, y0);
            let t10 = texel(x0 + 1, y0);
            let t01 = texel(x0, y0 + 1);
            let t11 = texel(x0 + 1, y0 + 1);

            let mut out = [0.0; 4];
            for (c, value) in out.iter_mut().enumerate() {
                let top = t00[c] + (t10[c] - t00[c]) * tx;
                let bottom = t01[c] + (t11[c] - t01[c]) * tx;
                *value = top + (bottom - top) * ty;
            }
            out
        }
    }
}
