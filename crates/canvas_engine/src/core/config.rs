//! Engine configuration
//!
//! Every struct here deserializes with defaults for missing fields, so a
//! config file only needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::logging::LoggingConfig;
use crate::foundation::Color;
use crate::render::driver::{BackendKind, FilterMode};

/// Driver selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Backend created at startup
    pub backend: BackendKind,
    /// Frames the CPU may run ahead of the GPU
    pub frames_in_flight: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Software,
            frames_in_flight: 2,
        }
    }
}

/// Atlas packing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Width and height of each atlas layer
    pub layer_size: u32,
    /// Gap kept between packed images
    pub padding: u32,
    /// Filter used when sampling the atlas
    pub filter: FilterMode,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            layer_size: 2048,
            padding: 1,
            filter: FilterMode::Linear,
        }
    }
}

/// Canvas compositor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Atlas packing
    pub atlas: AtlasConfig,
    /// Color the canvas pass clears to
    pub clear_color: Color,
    /// Near plane of the canvas projection
    pub near_clip: f32,
    /// Far plane of the canvas projection
    pub far_clip: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            atlas: AtlasConfig::default(),
            clear_color: Color::new(0.0, 0.0, 0.0, 1.0),
            near_clip: -1000.0,
            far_clip: 1000.0,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logger setup
    pub logging: LoggingConfig,
    /// Swap chain width
    pub width: u32,
    /// Swap chain height
    pub height: u32,
    /// Driver selection
    pub driver: DriverConfig,
    /// Canvas compositor
    pub canvas: CanvasConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            width: 800,
            height: 600,
            driver: DriverConfig::default(),
            canvas: CanvasConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "surface size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.driver.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("frames_in_flight must be at least 1".to_string()));
        }
        let atlas = &self.canvas.atlas;
        if atlas.layer_size == 0 || atlas.padding >= atlas.layer_size {
            return Err(ConfigError::Invalid(format!(
                "atlas padding {} leaves no room in a {} layer",
                atlas.padding, atlas.layer_size
            )));
        }
        if self.canvas.near_clip >= self.canvas.far_clip {
            return Err(ConfigError::Invalid("canvas near_clip must be below far_clip".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.canvas.atlas.layer_size, 2048);
        assert_eq!(config.canvas.atlas.padding, 1);
        assert_eq!(config.driver.backend, BackendKind::Software);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            width = 320

            [canvas.atlas]
            layer_size = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.width, 320);
        assert_eq!(config.height, 600);
        assert_eq!(config.canvas.atlas.layer_size, 256);
        assert_eq!(config.canvas.atlas.padding, 1);
    }

    #[test]
    fn test_ron_backend_selection() {
        let config: EngineConfig = ron::from_str("(driver: (backend: Vulkan))").unwrap();
        assert_eq!(config.driver.backend, BackendKind::Vulkan);
        assert_eq!(config.driver.frames_in_flight, 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.canvas.atlas.padding = 2048;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngineConfig::default();
        config.height = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.driver.frames_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("canvas_engine_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.toml");

        let mut config = EngineConfig::default();
        config.logging.filter = Some("debug".to_string());
        config.canvas.clear_color = Color::new(0.2, 0.3, 0.4, 1.0);
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = EngineConfig::load_from_file("engine.yaml");
        assert!(result.is_err());
    }
}
