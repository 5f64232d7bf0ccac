//! Lighting system
//!
//! Lights are owned by a [`RenderContext`] passed explicitly into each frame,
//! so there is no process-wide light list.

use crate::foundation::math::{Mat4, Vec3};
use crate::foundation::Color;
use crate::render::uniforms::PerViewUniforms;

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like sunlight)
    Directional,
    /// Point light (like a lightbulb)
    Point,
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// Light position (for point lights)
    pub position: Vec3,
    /// Light direction (for directional lights)
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Light range (for point lights)
    pub range: f32,
}

impl Light {
    /// Create a directional light
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            color,
            intensity,
            range: 0.0,
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            position,
            direction: Vec3::zeros(),
            color,
            intensity,
            range,
        }
    }
}

/// Per-frame rendering context: the active lights and ambient color
#[derive(Debug, Clone)]
pub struct RenderContext {
    lights: Vec<Light>,
    ambient_color: Color,
}

impl RenderContext {
    /// Context with no lights and white ambient
    pub fn new() -> Self {
        Self {
            lights: Vec::new(),
            ambient_color: Color::WHITE,
        }
    }

    /// Add a light, returning its index
    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// Remove the light at `index`
    pub fn remove_light(&mut self, index: usize) -> Option<Light> {
        (index < self.lights.len()).then(|| self.lights.remove(index))
    }

    /// Remove every light
    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }

    /// Active lights
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Ambient light color
    pub fn ambient_color(&self) -> Color {
        self.ambient_color
    }

    /// Set the ambient light color
    pub fn set_ambient_color(&mut self, color: Color) {
        self.ambient_color = color;
    }

    /// Fill the per-view block for a camera.
    ///
    /// The first directional light becomes the primary light; without one
    /// the light color is zero.
    pub fn per_view_uniforms(&self, view_projection: &Mat4) -> PerViewUniforms {
        let mut block = PerViewUniforms::new(view_projection);
        block.ambient_color = self.ambient_color.to_array();

        if let Some(light) = self.lights.iter().find(|l| l.light_type == LightType::Directional) {
            block.light_direction = [light.direction.x, light.direction.y, light.direction.z, 0.0];
            block.light_color_intensity = [light.color.x, light.color.y, light.color.z, light.intensity];
        }
        block
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_primary_light_is_first_directional() {
        let mut context = RenderContext::new();
        context.add_light(Light::point(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 0.0, 0.0), 5.0, 10.0));
        context.add_light(Light::directional(Vec3::new(0.0, -2.0, 0.0), Vec3::new(0.5, 0.5, 0.5), 0.8));
        context.set_ambient_color(Color::new(0.2, 0.2, 0.2, 1.0));

        let block = context.per_view_uniforms(&Mat4::identity());

        assert_relative_eq!(block.light_direction[1], -1.0);
        assert_relative_eq!(block.light_color_intensity[3], 0.8);
        assert_relative_eq!(block.ambient_color[0], 0.2);
    }

    #[test]
    fn test_remove_light() {
        let mut context = RenderContext::default();
        let index = context.add_light(Light::directional(Vec3::z(), Vec3::new(1.0, 1.0, 1.0), 1.0));
        assert!(context.remove_light(index).is_some());
        assert!(context.remove_light(index).is_none());

        let block = context.per_view_uniforms(&Mat4::identity());
        assert_eq!(block.light_color_intensity, [0.0; 4]);
    }
}
