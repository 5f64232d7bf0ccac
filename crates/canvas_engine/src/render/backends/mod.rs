//! # Backend Implementations
//!
//! Concrete [`Driver`](crate::render::driver::Driver) implementations.
//!
//! - **software**: CPU rasterizer, always available
//!
//! Native backends (Vulkan, Direct3D 11, OpenGL ES) share the same interface
//! and are selected through [`BackendKind`](crate::render::driver::BackendKind);
//! builds without them report the backend as unavailable at startup.

pub mod software;

pub use software::SoftwareDriver;
