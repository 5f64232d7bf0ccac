//! View properties: alignment, sizing, transform, content and touch handlers
//!
//! A [`View`] only stores what the user sets plus the layout results; the
//! [`ViewTree`](super::tree::ViewTree) that owns it computes those results.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use super::tree::{ViewId, ViewTree};
use crate::foundation::math::{Mat4, Quat, Vec2, Vec2i};
use crate::foundation::{Color, Recti};
use crate::render::texture::ResourceId;
use crate::render::{Image, Texture};

/// Size component meaning "parent size minus margins"
pub const VIEW_SIZE_FILL_PARENT: i32 = -1;

bitflags! {
    /// Anchor point of a view inside its parent
    ///
    /// One horizontal and one vertical flag are expected. When several flags
    /// of one axis are set, `LEFT`/`TOP` win over the centers, which win over
    /// `RIGHT`/`BOTTOM`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewAlignment: u32 {
        /// Parent's left edge
        const LEFT = 0x01;
        /// Parent's horizontal center
        const H_CENTER = 0x02;
        /// Parent's right edge
        const RIGHT = 0x04;
        /// Parent's top edge
        const TOP = 0x10;
        /// Parent's vertical center
        const V_CENTER = 0x20;
        /// Parent's bottom edge
        const BOTTOM = 0x40;
    }
}

impl Default for ViewAlignment {
    fn default() -> Self {
        Self::H_CENTER | Self::V_CENTER
    }
}

/// Margins used by fill-parent sizing, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margin {
    /// Left
    pub left: i32,
    /// Top
    pub top: i32,
    /// Right
    pub right: i32,
    /// Bottom
    pub bottom: i32,
}

impl Margin {
    /// Create margins
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }
}

/// What a view draws inside its quad
#[derive(Debug, Clone, Default)]
pub enum ViewContent {
    /// Nothing; the view only takes part in layout and touch
    #[default]
    None,
    /// A driver texture, copied into the atlas on the device
    Texture(Rc<Texture>),
    /// CPU pixels, uploaded into the atlas
    Image(Rc<Image>),
}

impl ViewContent {
    /// Identity of the source, used as the atlas cache key
    pub fn id(&self) -> Option<ResourceId> {
        match self {
            Self::None => None,
            Self::Texture(texture) => Some(texture.id()),
            Self::Image(image) => Some(image.id()),
        }
    }

    /// Source size in pixels
    pub fn size(&self) -> Option<(u32, u32)> {
        match self {
            Self::None => None,
            Self::Texture(texture) => Some((texture.width(), texture.height())),
            Self::Image(image) => Some((image.width(), image.height())),
        }
    }

    /// True for texture and image content
    pub fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Touch notifications a view can handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchEvent {
    /// A finger went down inside the view
    DownInside,
    /// A finger moved while inside the view
    MoveInside,
    /// A finger lifted inside the view
    UpInside,
    /// A finger lifted, and a view above this one blocked the release
    UpOutside,
    /// A finger that went down on the view moved
    Drag,
}

impl TouchEvent {
    const COUNT: usize = 5;

    const fn index(self) -> usize {
        self as usize
    }
}

/// Touch callback
///
/// Receives the tree, the view the event is for and the touch position in
/// canvas pixels. Returning `true` blocks the event from views below.
pub type TouchHandler = Box<dyn FnMut(&mut ViewTree, ViewId, Vec2i) -> bool>;

/// Node of the view tree
pub struct View {
    pub(super) parent: Option<ViewId>,
    pub(super) subviews: Vec<ViewId>,
    pub(super) on_canvas: bool,
    color: Color,
    alignment: ViewAlignment,
    pivot: Vec2,
    size: Vec2i,
    offset: Vec2i,
    margin: Margin,
    local_rotation: Quat,
    local_scale: Vec2,
    clip_rect: bool,
    content: ViewContent,
    pub(super) rect: Recti,
    pub(super) vertex_matrix: Mat4,
    pub(super) handlers: [Option<TouchHandler>; TouchEvent::COUNT],
}

impl View {
    /// A centered 100x100 white view
    pub fn new() -> Self {
        Self {
            parent: None,
            subviews: Vec::new(),
            on_canvas: false,
            color: Color::WHITE,
            alignment: ViewAlignment::default(),
            pivot: Vec2::new(0.5, 0.5),
            size: Vec2i::new(100, 100),
            offset: Vec2i::zeros(),
            margin: Margin::default(),
            local_rotation: Quat::identity(),
            local_scale: Vec2::new(1.0, 1.0),
            clip_rect: false,
            content: ViewContent::None,
            rect: Recti::default(),
            vertex_matrix: Mat4::identity(),
            handlers: Default::default(),
        }
    }

    /// Parent view
    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    /// Child views in draw order
    pub fn subviews(&self) -> &[ViewId] {
        &self.subviews
    }

    /// Whether this view is a root of the canvas
    pub fn is_on_canvas(&self) -> bool {
        self.on_canvas
    }

    /// Vertex color tint
    pub fn color(&self) -> Color {
        self.color
    }

    /// Set the vertex color tint
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Anchor flags
    pub fn alignment(&self) -> ViewAlignment {
        self.alignment
    }

    /// Set the anchor flags
    pub fn set_alignment(&mut self, alignment: ViewAlignment) {
        self.alignment = alignment;
    }

    /// Pivot; (0, 0) is the top-left corner, (1, 1) the bottom-right
    pub fn pivot(&self) -> Vec2 {
        self.pivot
    }

    /// Set the pivot
    pub fn set_pivot(&mut self, pivot: Vec2) {
        self.pivot = pivot;
    }

    /// Requested size; components may be [`VIEW_SIZE_FILL_PARENT`]
    pub fn size(&self) -> Vec2i {
        self.size
    }

    /// Set the requested size
    pub fn set_size(&mut self, size: Vec2i) {
        self.size = size;
    }

    /// Offset from the anchor point, Y down
    pub fn offset(&self) -> Vec2i {
        self.offset
    }

    /// Set the offset
    pub fn set_offset(&mut self, offset: Vec2i) {
        self.offset = offset;
    }

    /// Margins
    pub fn margin(&self) -> Margin {
        self.margin
    }

    /// Set the margins
    pub fn set_margin(&mut self, margin: Margin) {
        self.margin = margin;
    }

    /// Rotation about the pivot
    pub fn local_rotation(&self) -> Quat {
        self.local_rotation
    }

    /// Set the rotation about the pivot
    pub fn set_local_rotation(&mut self, rotation: Quat) {
        self.local_rotation = rotation;
    }

    /// Scale about the pivot
    pub fn local_scale(&self) -> Vec2 {
        self.local_scale
    }

    /// Set the scale about the pivot
    pub fn set_local_scale(&mut self, scale: Vec2) {
        self.local_scale = scale;
    }

    /// Whether the view clips itself and its subviews
    pub fn is_clip_rect(&self) -> bool {
        self.clip_rect
    }

    /// Enable or disable clipping to the view's rectangle
    pub fn enable_clip_rect(&mut self, enable: bool) {
        self.clip_rect = enable;
    }

    /// Drawn content
    pub fn content(&self) -> &ViewContent {
        &self.content
    }

    /// Draw `texture` in the view's quad
    pub fn set_texture(&mut self, texture: Rc<Texture>) {
        self.content = ViewContent::Texture(texture);
    }

    /// Draw `image` in the view's quad
    pub fn set_image(&mut self, image: Rc<Image>) {
        self.content = ViewContent::Image(image);
    }

    /// Draw nothing
    pub fn clear_content(&mut self) {
        self.content = ViewContent::None;
    }

    /// Rectangle from the last layout, canvas pixels
    pub fn rect(&self) -> Recti {
        self.rect
    }

    /// Local-to-canvas matrix from the last layout
    pub fn vertex_matrix(&self) -> &Mat4 {
        &self.vertex_matrix
    }

    /// Install a touch callback, replacing any previous one for `event`
    pub fn set_touch_handler<F>(&mut self, event: TouchEvent, handler: F)
    where
        F: FnMut(&mut ViewTree, ViewId, Vec2i) -> bool + 'static,
    {
        self.handlers[event.index()] = Some(Box::new(handler));
    }

    /// Remove the touch callback for `event`
    pub fn clear_touch_handler(&mut self, event: TouchEvent) {
        self.handlers[event.index()] = None;
    }

    pub(super) fn take_handler(&mut self, event: TouchEvent) -> Option<TouchHandler> {
        self.handlers[event.index()].take()
    }

    pub(super) fn restore_handler(&mut self, event: TouchEvent, handler: TouchHandler) {
        let slot = &mut self.handlers[event.index()];
        if slot.is_none() {
            *slot = Some(handler);
        }
    }
}

impl Default for View {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("parent", &self.parent)
            .field("subviews", &self.subviews)
            .field("alignment", &self.alignment)
            .field("size", &self.size)
            .field("offset", &self.offset)
            .field("rect", &self.rect)
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}
