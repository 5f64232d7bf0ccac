//! Materials: program, tint and one texture, plus the scissor rect they draw under

use crate::foundation::{Color, Rect};
use crate::render::driver::{
    BufferDescriptor, BufferUsage, Driver, PipelineState, ProgramHandle, RasterState, SamplerGroup,
    SamplerGroupHandle, SamplerParams, TextureHandle, UniformBufferHandle,
};
use crate::render::uniforms::{binding, sampler_binding, MaterialUniforms};

/// Driver-backed material
///
/// The program is shared and not owned; the uniform buffer and sampler group
/// are owned and released by [`Material::destroy`]. Changes are uploaded
/// lazily by [`Material::bind`].
#[derive(Debug)]
pub struct Material {
    name: String,
    program: ProgramHandle,
    raster: RasterState,
    uniform_buffer: UniformBufferHandle,
    sampler_group: SamplerGroupHandle,
    color: Color,
    texture: Option<(TextureHandle, SamplerParams)>,
    scissor_rect: Rect,
    dirty: bool,
}

impl Material {
    /// Create a white, untextured material drawing with `program`
    pub fn new(driver: &mut dyn Driver, name: impl Into<String>, program: ProgramHandle, raster: RasterState) -> Self {
        let uniform_buffer = driver.create_uniform_buffer(std::mem::size_of::<MaterialUniforms>(), BufferUsage::Dynamic);
        let sampler_group = driver.create_sampler_group(1);
        Self {
            name: name.into(),
            program,
            raster,
            uniform_buffer,
            sampler_group,
            color: Color::WHITE,
            texture: None,
            scissor_rect: Rect::full(),
            dirty: true,
        }
    }

    /// Debug name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tint color
    pub fn color(&self) -> Color {
        self.color
    }

    /// Set the tint color
    pub fn set_color(&mut self, color: Color) {
        if self.color != color {
            self.color = color;
            self.dirty = true;
        }
    }

    /// Bound texture, if any
    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture.map(|(texture, _)| texture)
    }

    /// Sample `texture` with `params`
    pub fn set_texture(&mut self, texture: TextureHandle, params: SamplerParams) {
        if self.texture != Some((texture, params)) {
            self.texture = Some((texture, params));
            self.dirty = true;
        }
    }

    /// Scissor rectangle, normalized to the render target with a top-left origin
    pub fn scissor_rect(&self) -> Rect {
        self.scissor_rect
    }

    /// Set the scissor rectangle
    pub fn set_scissor_rect(&mut self, rect: Rect) {
        self.scissor_rect = rect;
    }

    /// Pipeline state for a draw with this material
    pub fn pipeline_state(&self) -> PipelineState {
        PipelineState {
            program: self.program,
            raster: self.raster,
        }
    }

    /// Upload pending changes and bind to the material slots
    pub fn bind(&mut self, driver: &mut dyn Driver) {
        if self.dirty {
            let block = MaterialUniforms {
                color: self.color.to_array(),
            };
            driver.load_uniform_buffer(self.uniform_buffer, BufferDescriptor::from_slice(&[block]));

            let mut group = SamplerGroup::new(1);
            if let Some((texture, params)) = self.texture {
                group.set_sampler(0, texture, params);
            }
            driver.update_sampler_group(self.sampler_group, group);
            self.dirty = false;
        }

        driver.bind_uniform_buffer(binding::MATERIAL, self.uniform_buffer);
        driver.bind_samplers(sampler_binding::MATERIAL, self.sampler_group);
    }

    /// Release the owned driver resources
    pub fn destroy(self, driver: &mut dyn Driver) {
        driver.destroy_uniform_buffer(self.uniform_buffer);
        driver.destroy_sampler_group(self.sampler_group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DriverConfig;
    use crate::render::backends::SoftwareDriver;
    use crate::render::driver::{BuiltinShader, FilterMode, Program, TextureDesc, TextureFormat};

    fn material(driver: &mut SoftwareDriver) -> Material {
        let program = driver.create_program(Program::builtin("canvas", BuiltinShader::Canvas));
        Material::new(driver, "test", program, RasterState::alpha_blended())
    }

    #[test]
    fn test_bind_uploads_only_changes() {
        let mut driver = SoftwareDriver::new(&DriverConfig::default());
        let mut material = material(&mut driver);
        assert!(material.dirty);

        material.bind(&mut driver);
        assert!(!material.dirty);

        material.set_color(Color::WHITE);
        assert!(!material.dirty);
        material.set_color(Color::BLACK);
        assert!(material.dirty);
        material.destroy(&mut driver);
    }

    #[test]
    fn test_texture_and_scissor() {
        let mut driver = SoftwareDriver::new(&DriverConfig::default());
        let mut material = material(&mut driver);
        let texture = driver.create_texture(&TextureDesc::new_2d(4, 4, TextureFormat::Rgba8));
        material.bind(&mut driver);

        let params = SamplerParams::filtered(FilterMode::Nearest);
        material.set_texture(texture, params);
        assert!(material.dirty);
        material.bind(&mut driver);
        material.set_texture(texture, params);
        assert!(!material.dirty);

        let half = Rect::new(0.0, 0.0, 0.5, 0.5);
        material.set_scissor_rect(half);
        assert_eq!(material.scissor_rect(), half);
        assert_eq!(material.texture(), Some(texture));
        assert_eq!(material.pipeline_state().raster, RasterState::alpha_blended());
    }
}
