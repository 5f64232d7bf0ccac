//! # Rendering System
//!
//! Rendering layer of the canvas engine: a handle-based driver interface with
//! interchangeable backends, and the small set of GPU-facing collaborators
//! the UI compositor builds on.
//!
//! ## Architecture
//!
//! - **Driver**: backend-neutral command interface over typed handles ([`driver`])
//! - **Backends**: one implementation of the driver per native API ([`backends`])
//! - **Resources**: [`Texture`], [`Image`], retained [`Mesh`], [`Material`]
//! - **View state**: [`Camera`] and the per-frame [`RenderContext`] holding lights
//! - **Facade**: [`GraphicsEngine`] owns the driver and runs a frame
//!
//! ## Error Model
//!
//! Misusing the driver (stale handles, drawing outside a pass, unsupported
//! topologies) panics. Conditions that depend on the environment or on input
//! data (backend availability, formats, image files) return [`RenderError`].

pub mod backends;
pub mod camera;
pub mod driver;
pub mod engine;
pub mod image;
pub mod lighting;
pub mod material;
pub mod mesh;
pub mod texture;
pub mod uniforms;
pub mod vertex;

pub use camera::Camera;
pub use driver::{create_driver, BackendKind, Driver};
pub use engine::GraphicsEngine;
pub use image::Image;
pub use lighting::{Light, LightType, RenderContext};
pub use material::Material;
pub use mesh::{Mesh, Submesh};
pub use texture::{ResourceId, Texture};
pub use vertex::CanvasVertex;

use crate::config::ConfigError;
use driver::TextureFormat;

/// Errors from the rendering layer
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The configured backend is not compiled into this build
    #[error("{} backend is not available", .0.name())]
    BackendUnavailable(BackendKind),

    /// The active backend cannot store textures of this format
    #[error("Texture format {0:?} is not supported by the active backend")]
    UnsupportedFormat(TextureFormat),

    /// Pixel data does not match its declared dimensions
    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    /// Image decoding or encoding failed
    #[error("Image error: {0}")]
    Image(#[from] ::image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
