//! Scanline-free edge-function rasterizer
//!
//! Triangles are walked over their scissored bounding box with edge functions
//! evaluated at pixel centers. Coverage follows the top-left fill rule, so
//! two triangles sharing an edge never both write a pixel along it.
//! Varyings are interpolated perspective-correct; depth is interpolated in
//! window space.
//!
//! Window coordinates here have their origin at the top-left pixel.

use super::resources::Surface;
use super::shaders::{ShadedVertex, Varyings};
use crate::foundation::Recti;
use crate::render::driver::{BlendEquation, BlendFactor, CullingMode, RasterState};

/// Vertex after perspective divide and viewport mapping
#[derive(Debug, Clone, Copy)]
struct WindowVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
}

/// Per-draw rasterization state over the surface of the active pass
pub(super) struct Rasterizer<'a> {
    surface: &'a mut Surface,
    viewport: Recti,
    /// Scissor already intersected with the viewport and the surface
    bounds: Recti,
    state: RasterState,
}

impl<'a> Rasterizer<'a> {
    pub fn new(surface: &'a mut Surface, viewport: Recti, scissor: Recti, state: RasterState) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let target = Recti::new(0, 0, surface.width as i32, surface.height as i32);
        let bounds = clip_rect(clip_rect(scissor, viewport), target);
        Self {
            surface,
            viewport,
            bounds,
            state,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_window(&self, vertex: &ShadedVertex) -> Option<WindowVertex> {
        let clip = vertex.clip;
        if clip.w <= f32::EPSILON {
            return None;
        }
        let inv_w = 1.0 / clip.w;
        let (nx, ny, nz) = (clip.x * inv_w, clip.y * inv_w, clip.z * inv_w);
        let vp = self.viewport;

        Some(WindowVertex {
            x: vp.x as f32 + (nx + 1.0) * 0.5 * vp.w as f32,
            y: vp.y as f32 + (1.0 - ny) * 0.5 * vp.h as f32,
            z: (nz + 1.0) * 0.5,
            inv_w,
        })
    }

    /// Rasterize one triangle, shading covered pixels with `shade`
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn triangle(&mut self, vertices: [&ShadedVertex; 3], shade: &mut impl FnMut(&Varyings) -> Option<[f32; 4]>) {
        let (Some(a), Some(b), Some(c)) = (
            self.to_window(vertices[0]),
            self.to_window(vertices[1]),
            self.to_window(vertices[2]),
        ) else {
            return;
        };

        let area = edge(&a, &b, c.x, c.y);
        if area == 0.0 {
            return;
        }

        // Y-down window space flips the winding seen in Y-up target space
        let ccw = area < 0.0;
        let front = ccw == self.state.front_face_ccw;
        let culled = match self.state.culling {
            CullingMode::None => false,
            CullingMode::Front => front,
            CullingMode::Back => !front,
            CullingMode::FrontAndBack => true,
        };
        if culled {
            return;
        }

        // Normalize to positive area so the fill rule sees one orientation
        let (v, attrs) = if area > 0.0 {
            ([a, b, c], [&vertices[0].varyings, &vertices[1].varyings, &vertices[2].varyings])
        } else {
            ([a, c, b], [&vertices[0].varyings, &vertices[2].varyings, &vertices[1].varyings])
        };
        let area = area.abs();

        let min_x = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor() as i32;
        let max_x = v.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;
        let min_y = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor() as i32;
        let max_y = v.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;

        let x0 = min_x.max(self.bounds.x);
        let x1 = max_x.min(self.bounds.right());
        let y0 = min_y.max(self.bounds.y);
        let y1 = max_y.min(self.bounds.bottom());

        let top_left = [is_top_left(&v[1], &v[2]), is_top_left(&v[2], &v[0]), is_top_left(&v[0], &v[1])];

        for py in y0..y1 {
            for px in x0..x1 {
                let (sx, sy) = (px as f32 + 0.5, py as f32 + 0.5);
                let w = [edge(&v[1], &v[2], sx, sy), edge(&v[2], &v[0], sx, sy), edge(&v[0], &v[1], sx, sy)];

                let covered = w
                    .iter()
                    .zip(top_left)
                    .all(|(&weight, tl)| weight > 0.0 || (weight == 0.0 && tl));
                if !covered {
                    continue;
                }

                let l = [w[0] / area, w[1] / area, w[2] / area];
                let z = l[0] * v[0].z + l[1] * v[1].z + l[2] * v[2].z;

                let pw = [l[0] * v[0].inv_w, l[1] * v[1].inv_w, l[2] * v[2].inv_w];
                let sum = pw[0] + pw[1] + pw[2];
                let varyings = Varyings::blend3(attrs, [pw[0] / sum, pw[1] / sum, pw[2] / sum]);

                if let Some(color) = shade(&varyings) {
                    self.write_fragment(px, py, z, color);
                }
            }
        }
    }

    /// Rasterize a one-pixel-wide line
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn line(&mut self, vertices: [&ShadedVertex; 2], shade: &mut impl FnMut(&Varyings) -> Option<[f32; 4]>) {
        let (Some(a), Some(b)) = (self.to_window(vertices[0]), self.to_window(vertices[1])) else {
            return;
        };

        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = (a.x + dx * t).floor() as i32;
            let y = (a.y + dy * t).floor() as i32;
            if !self.inside(x, y) {
                continue;
            }

            let wa = (1.0 - t) * a.inv_w;
            let wb = t * b.inv_w;
            let sum = wa + wb;
            let varyings = Varyings::blend2([&vertices[0].varyings, &vertices[1].varyings], [wa / sum, wb / sum]);
            let z = a.z + (b.z - a.z) * t;

            if let Some(color) = shade(&varyings) {
                self.write_fragment(x, y, z, color);
            }
        }
    }

    /// Rasterize a one-pixel point
    #[allow(clippy::cast_possible_truncation)]
    pub fn point(&mut self, vertex: &ShadedVertex, shade: &mut impl FnMut(&Varyings) -> Option<[f32; 4]>) {
        let Some(p) = self.to_window(vertex) else {
            return;
        };
        let (x, y) = (p.x.floor() as i32, p.y.floor() as i32);
        if !self.inside(x, y) {
            return;
        }
        if let Some(color) = shade(&vertex.varyings) {
            self.write_fragment(x, y, p.z, color);
        }
    }

    fn inside(&self, x: i32, y: i32) -> bool {
        x >= self.bounds.x && x < self.bounds.right() && y >= self.bounds.y && y < self.bounds.bottom()
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_fragment(&mut self, x: i32, y: i32, z: f32, color: [f32; 4]) {
        let index = y as usize * self.surface.width as usize + x as usize;

        if let Some(depth) = self.surface.depth.as_mut() {
            if !self.state.depth_func.test(z, depth[index]) {
                return;
            }
            if self.state.depth_write {
                depth[index] = z;
            }
        }

        if !self.state.color_write {
            return;
        }
        let Some(target) = self.surface.color.as_mut() else {
            return;
        };

        let out = if self.state.has_blending() {
            blend(&self.state, color, target.read(index))
        } else {
            color
        };
        target.write(index, out);
    }
}

fn edge(a: &WindowVertex, b: &WindowVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Top edges are horizontal and run right; left edges run up the screen
fn is_top_left(a: &WindowVertex, b: &WindowVertex) -> bool {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

fn clip_rect(a: Recti, b: Recti) -> Recti {
    let x0 = a.x.max(b.x);
    let y0 = a.y.max(b.y);
    let x1 = a.right().min(b.right());
    let y1 = a.bottom().min(b.bottom());
    Recti::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
}

fn factor(f: BlendFactor, src: [f32; 4], dst: [f32; 4], channel: usize) -> f32 {
    match f {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcColor => src[channel],
        BlendFactor::OneMinusSrcColor => 1.0 - src[channel],
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::OneMinusSrcAlpha => 1.0 - src[3],
        BlendFactor::DstColor => dst[channel],
        BlendFactor::OneMinusDstColor => 1.0 - dst[channel],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::OneMinusDstAlpha => 1.0 - dst[3],
    }
}

fn combine(equation: BlendEquation, s: f32, d: f32, sf: f32, df: f32) -> f32 {
    match equation {
        BlendEquation::Add => s * sf + d * df,
        BlendEquation::Subtract => s * sf - d * df,
        BlendEquation::ReverseSubtract => d * df - s * sf,
        BlendEquation::Min => s.min(d),
        BlendEquation::Max => s.max(d),
    }
}

fn blend(state: &RasterState, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (channel, value) in out.iter_mut().enumerate() {
        let (equation, sf, df) = if channel == 3 {
            (state.blend_equation_alpha, state.blend_src_alpha, state.blend_dst_alpha)
        } else {
            (state.blend_equation_rgb, state.blend_src_rgb, state.blend_dst_rgb)
        };
        *value = combine(
            equation,
            src[channel],
            dst[channel],
            factor(sf, src, dst, channel),
            factor(df, src, dst, channel),
        )
        .clamp(0.0, 1.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::resources::ColorBuffer;
    use super::*;
    use crate::foundation::math::Vec4;
    use crate::render::driver::TextureFormat;

    fn surface(width: u32, height: u32) -> Surface {
        Surface {
            width,
            height,
            color: Some(ColorBuffer {
                format: TextureFormat::R8,
                pixels: vec![0; (width * height) as usize],
            }),
            depth: None,
            swap_chain: None,
        }
    }

    /// Vertex given in pixel coordinates of an `size`x`size` target
    fn pixel_vertex(x: f32, y: f32, size: f32) -> ShadedVertex {
        ShadedVertex {
            clip: Vec4::new(x / size * 2.0 - 1.0, 1.0 - y / size * 2.0, 0.0, 1.0),
            varyings: Varyings::default(),
        }
    }

    fn covered(surface: &Surface) -> usize {
        surface.color.as_ref().map_or(0, |c| c.pixels.iter().filter(|&&p| p > 0).count())
    }

    #[test]
    fn test_shared_edge_written_once() {
        let mut target = surface(8, 8);
        let full = Recti::new(0, 0, 8, 8);
        let quad = [
            pixel_vertex(0.0, 0.0, 8.0),
            pixel_vertex(0.0, 8.0, 8.0),
            pixel_vertex(8.0, 8.0, 8.0),
            pixel_vertex(8.0, 0.0, 8.0),
        ];

        let mut hits = 0;
        {
            let mut raster = Rasterizer::new(&mut target, full, full, RasterState::alpha_blended());
            let mut shade = |_: &Varyings| {
                hits += 1;
                Some([1.0, 1.0, 1.0, 1.0])
            };
            raster.triangle([&quad[0], &quad[1], &quad[2]], &mut shade);
            raster.triangle([&quad[0], &quad[2], &quad[3]], &mut shade);
        }

        assert_eq!(hits, 64, "every pixel shaded exactly once");
        assert_eq!(covered(&target), 64);
    }

    #[test]
    fn test_scissor_limits_coverage() {
        let mut target = surface(8, 8);
        let full = Recti::new(0, 0, 8, 8);
        let tri = [
            pixel_vertex(0.0, 0.0, 8.0),
            pixel_vertex(0.0, 16.0, 8.0),
            pixel_vertex(16.0, 0.0, 8.0),
        ];

        {
            let mut raster = Rasterizer::new(&mut target, full, Recti::new(2, 2, 3, 3), RasterState::alpha_blended());
            raster.triangle([&tri[0], &tri[1], &tri[2]], &mut |_| Some([1.0; 4]));
        }

        assert_eq!(covered(&target), 9);
    }

    #[test]
    fn test_back_face_culling() {
        let mut target = surface(4, 4);
        let full = Recti::new(0, 0, 4, 4);
        // Clockwise in a Y-up target
        let tri = [
            pixel_vertex(0.0, 0.0, 4.0),
            pixel_vertex(4.0, 0.0, 4.0),
            pixel_vertex(0.0, 4.0, 4.0),
        ];

        let mut state = RasterState::opaque();
        state.depth_func = crate::render::driver::CompareFunc::Always;
        {
            let mut raster = Rasterizer::new(&mut target, full, full, state);
            raster.triangle([&tri[0], &tri[1], &tri[2]], &mut |_| Some([1.0; 4]));
        }
        assert_eq!(covered(&target), 0);

        state.culling = CullingMode::None;
        {
            let mut raster = Rasterizer::new(&mut target, full, full, state);
            raster.triangle([&tri[0], &tri[1], &tri[2]], &mut |_| Some([1.0; 4]));
        }
        assert!(covered(&target) > 0);
    }

    #[test]
    fn test_alpha_blend() {
        let state = RasterState::alpha_blended();
        let out = blend(&state, [1.0, 0.0, 0.0, 0.5], [0.0, 0.0, 1.0, 1.0]);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[2] - 0.5).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_line_covers_endpoints() {
        let mut target = surface(8, 8);
        let full = Recti::new(0, 0, 8, 8);
        let a = pixel_vertex(0.5, 0.5, 8.0);
        let b = pixel_vertex(7.5, 0.5, 8.0);
        {
            let mut raster = Rasterizer::new(&mut target, full, full, RasterState::alpha_blended());
            raster.line([&a, &b], &mut |_| Some([1.0; 4]));
        }
        assert_eq!(covered(&target), 8);
    }
}
