//! Core engine configuration

pub mod config;

pub use config::{AtlasConfig, CanvasConfig, DriverConfig, EngineConfig};
