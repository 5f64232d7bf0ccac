//! # GPU Driver Abstraction
//!
//! Handle-based command interface between renderers and graphics backends.
//!
//! ## Organization
//!
//! - **handle**: typed, generation-checked handles and the tables owning resources
//! - **types**: vertex layouts, formats, pipeline and render pass descriptions
//! - **program**: shader program descriptions
//! - **api**: the [`Driver`] trait
//! - **release**: deferred release of upload buffers
//! - **render_pass**: render pass state machine shared by backends
//!
//! The backend is chosen once, from configuration, by [`create_driver`].

pub mod api;
pub mod handle;
pub mod program;
pub mod release;
pub mod render_pass;
pub mod types;

use serde::{Deserialize, Serialize};

pub use api::{Driver, PipelineState};
pub use handle::{
    FenceHandle, HandleTable, IndexBufferHandle, ProgramHandle, RenderPrimitiveHandle, RenderTargetHandle,
    SamplerGroupHandle, StreamHandle, SwapChainHandle, TextureHandle, UniformBufferHandle, VertexBufferHandle,
};
pub use program::{BuiltinShader, Program, ShaderSource, ShaderStage};
pub use types::*;

use crate::core::config::DriverConfig;
use crate::render::backends::software::SoftwareDriver;
use crate::render::RenderError;

/// Native graphics API behind a [`Driver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// CPU rasterizer
    #[default]
    Software,
    /// Vulkan
    Vulkan,
    /// Direct3D 11
    Direct3D11,
    /// OpenGL ES 3
    OpenGlEs,
}

impl BackendKind {
    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Software => "Software",
            Self::Vulkan => "Vulkan",
            Self::Direct3D11 => "Direct3D 11",
            Self::OpenGlEs => "OpenGL ES",
        }
    }
}

/// Create the driver selected by `config`
pub fn create_driver(config: &DriverConfig) -> Result<Box<dyn Driver>, RenderError> {
    match config.backend {
        BackendKind::Software => {
            log::info!("Creating software driver ({} frames in flight)", config.frames_in_flight);
            Ok(Box::new(SoftwareDriver::new(config)))
        }
        other => {
            log::warn!("{} backend is not available in this build", other.name());
            Err(RenderError::BackendUnavailable(other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_software_driver() {
        let driver = create_driver(&DriverConfig::default());
        assert!(matches!(driver, Ok(d) if d.backend_kind() == BackendKind::Software));
    }

    #[test]
    fn test_native_backends_unavailable() {
        for backend in [BackendKind::Vulkan, BackendKind::Direct3D11, BackendKind::OpenGlEs] {
            let config = DriverConfig {
                backend,
                ..DriverConfig::default()
            };
            assert!(matches!(create_driver(&config), Err(RenderError::BackendUnavailable(kind)) if kind == backend));
        }
    }
}
