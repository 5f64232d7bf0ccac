//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and rectangles
//! - Colors
//! - Logging utilities

pub mod color;
pub mod logging;
pub mod math;

pub use color::Color;
pub use math::{Rect, Recti};
