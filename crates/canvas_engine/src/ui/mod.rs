//! UI compositing
//!
//! Architecture:
//! - [`ViewTree`]: arena of [`View`]s with parent/child links and layout
//! - [`ViewMesh`]: one quad per view, rebuilt on every dirty prepare
//! - [`TextureAtlas`]: binary-split packing of view contents into layers
//! - [`CanvasRenderer`]: merges the quads into one mesh and draws it
//! - [`TouchRouter`]: hit-tests touches against the same quads

pub mod atlas;
pub mod canvas;
pub mod touch;
pub mod tree;
pub mod view;
pub mod view_mesh;

pub use atlas::{Allocation, AtlasPacker, AtlasPlacement, AtlasTreeNode, TextureAtlas};
pub use canvas::CanvasRenderer;
pub use touch::{Touch, TouchPhase, TouchRouter};
pub use tree::{ViewId, ViewTree};
pub use view::{Margin, TouchEvent, TouchHandler, View, ViewAlignment, ViewContent, VIEW_SIZE_FILL_PARENT};
pub use view_mesh::{atlas_order, merge_view_meshes, MergedBatch, ViewMesh};
