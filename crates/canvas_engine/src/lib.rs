//! # Canvas Engine
//!
//! A handle-based GPU driver abstraction and a retained UI compositor on
//! top of it.
//!
//! ## Features
//!
//! - **Driver interface**: typed handles, render passes and draws, with a
//!   CPU software backend; native backends are selectable but not built in
//! - **View tree**: alignment, pivot, margins, rotation/scale and clipping
//! - **Texture atlas**: binary-split packing into fixed-size layers
//! - **Canvas compositor**: view quads merged into one mesh, one draw per
//!   clip rectangle and atlas layer
//! - **Touch routing**: topmost-first hit testing with blocking handlers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canvas_engine::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     let mut engine = GraphicsEngine::new(&EngineConfig::default())?;
//!     let mut canvas = engine.create_canvas()?;
//!
//!     let panel = canvas.tree_mut().create_view();
//!     canvas.tree_mut().view_mut(panel).set_image(std::rc::Rc::new(Image::solid(64, 64, Color::WHITE)));
//!     canvas.add_view(panel);
//!
//!     engine.render_frame(&mut canvas, &[])?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod ui;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::{AtlasConfig, CanvasConfig, DriverConfig, EngineConfig},
        foundation::{
            math::{Mat4, Quat, Vec2, Vec2i, Vec3},
            Color, Rect, Recti,
        },
        render::{BackendKind, Camera, Driver, GraphicsEngine, Image, RenderContext, RenderError, Texture},
        ui::{
            CanvasRenderer, Margin, Touch, TouchEvent, TouchPhase, ViewAlignment, ViewId, ViewTree,
            VIEW_SIZE_FILL_PARENT,
        },
    };
}
