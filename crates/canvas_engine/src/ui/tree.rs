//! # View Tree
//!
//! Arena owning every view of one canvas, plus the layout pass.
//!
//! ## Ownership
//!
//! Views live in a slot map and refer to each other by [`ViewId`]. A parent
//! lists its children; a child records its parent as a plain id. Destroying a
//! view destroys its whole subtree, top-down.
//!
//! ## Layout
//!
//! Layout runs top-down from the roots: a view's rectangle is final before any
//! of its subviews is computed. Roots are laid out against the full canvas.
//! All coordinates are canvas pixels with the origin at the top-left corner
//! and Y pointing down.

use slotmap::{new_key_type, SlotMap};

use super::view::{TouchEvent, View, ViewAlignment, VIEW_SIZE_FILL_PARENT};
use super::view_mesh::ViewMesh;
use crate::foundation::math::{round_to_int, Mat4, Point3, Vec2i, Vec3};
use crate::foundation::{Rect, Recti};

new_key_type! {
    /// Key of a view inside its [`ViewTree`]
    ///
    /// An id is only meaningful in the tree that created it. Looking it up in
    /// another tree is not detected and may resolve to an unrelated view.
    pub struct ViewId;
}

/// Arena of views with the canvas roots
#[derive(Debug)]
pub struct ViewTree {
    views: SlotMap<ViewId, View>,
    roots: Vec<ViewId>,
    canvas_width: u32,
    canvas_height: u32,
    dirty: bool,
}

impl ViewTree {
    /// Empty tree for a canvas of the given size
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            views: SlotMap::with_key(),
            roots: Vec::new(),
            canvas_width,
            canvas_height,
            dirty: true,
        }
    }

    /// Insert a detached default view
    pub fn create_view(&mut self) -> ViewId {
        self.insert(View::new())
    }

    /// Insert a detached, preconfigured view
    pub fn insert(&mut self, view: View) -> ViewId {
        assert!(
            view.parent.is_none() && view.subviews.is_empty() && !view.on_canvas,
            "only detached views can be inserted into a tree"
        );
        self.views.insert(view)
    }

    /// Whether `id` refers to a live view
    pub fn contains(&self, id: ViewId) -> bool {
        self.views.contains_key(id)
    }

    /// Number of live views
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// True when the tree holds no views
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Look up a view
    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.get(id)
    }

    /// Look up a view, panicking on a stale id
    pub fn view(&self, id: ViewId) -> &View {
        match self.views.get(id) {
            Some(view) => view,
            None => panic!("invalid view id {id:?}: view was destroyed or never existed in this tree"),
        }
    }

    /// Mutable access to a view; marks the canvas dirty
    pub fn view_mut(&mut self, id: ViewId) -> &mut View {
        self.dirty = true;
        match self.views.get_mut(id) {
            Some(view) => view,
            None => panic!("invalid view id {id:?}: view was destroyed or never existed in this tree"),
        }
    }

    /// Views attached directly to the canvas, back to front
    pub fn roots(&self) -> &[ViewId] {
        &self.roots
    }

    /// Canvas size in pixels
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas_width, self.canvas_height)
    }

    /// Update the canvas size; a change marks the tree dirty
    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        if (width, height) != (self.canvas_width, self.canvas_height) {
            self.canvas_width = width;
            self.canvas_height = height;
            self.dirty = true;
        }
    }

    /// Whether a rebuild is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Request a rebuild
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Attach `child` below `parent`, drawn above the existing subviews
    ///
    /// Panics if `child` already has a parent or is a canvas root, or if it
    /// would become its own ancestor.
    pub fn add_subview(&mut self, parent: ViewId, child: ViewId) {
        let child_view = self.view(child);
        assert!(
            child_view.parent.is_none(),
            "view {child:?} already has parent {:?}",
            child_view.parent
        );
        assert!(!child_view.on_canvas, "view {child:?} is attached to the canvas and cannot also be a subview");
        assert!(!self.is_ancestor_or_self(child, parent), "adding {child:?} below {parent:?} would create a cycle");

        self.view_mut(parent).subviews.push(child);
        self.view_mut(child).parent = Some(parent);
    }

    /// Detach `child` from `parent`; the child stays alive
    pub fn remove_subview(&mut self, parent: ViewId, child: ViewId) {
        assert_eq!(
            self.view(child).parent,
            Some(parent),
            "view {child:?} is not a subview of {parent:?}"
        );
        self.view_mut(parent).subviews.retain(|&id| id != child);
        self.view_mut(child).parent = None;
    }

    /// Detach every subview of `parent`
    pub fn clear_subviews(&mut self, parent: ViewId) {
        let subviews = std::mem::take(&mut self.view_mut(parent).subviews);
        for child in subviews {
            self.view_mut(child).parent = None;
        }
    }

    pub(crate) fn attach_root(&mut self, id: ViewId) {
        let view = self.view(id);
        assert!(!view.on_canvas, "view {id:?} is already attached to the canvas");
        assert!(view.parent.is_none(), "view {id:?} is a subview and cannot also be a canvas root");
        self.view_mut(id).on_canvas = true;
        self.roots.push(id);
    }

    pub(crate) fn detach_root(&mut self, id: ViewId) {
        assert!(self.view(id).on_canvas, "view {id:?} is not attached to the canvas");
        self.view_mut(id).on_canvas = false;
        self.roots.retain(|&root| root != id);
    }

    pub(crate) fn detach_all_roots(&mut self) {
        for id in std::mem::take(&mut self.roots) {
            self.view_mut(id).on_canvas = false;
        }
        self.dirty = true;
    }

    /// Remove `id` and its whole subtree from the tree
    pub fn destroy_view(&mut self, id: ViewId) {
        if let Some(parent) = self.view(id).parent() {
            self.remove_subview(parent, id);
        }
        if self.view(id).on_canvas {
            self.detach_root(id);
        }

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(view) = self.views.remove(next) {
                pending.extend(view.subviews);
            }
        }
        self.dirty = true;
    }

    fn is_ancestor_or_self(&self, ancestor: ViewId, mut id: ViewId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.view(id).parent {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn canvas_rect(&self) -> Recti {
        Recti::new(0, 0, self.canvas_width as i32, self.canvas_height as i32)
    }

    /// Size after resolving fill-parent components
    pub fn calculated_size(&self, id: ViewId) -> Vec2i {
        let view = self.view(id);
        let mut size = view.size();
        if size.x == VIEW_SIZE_FILL_PARENT || size.y == VIEW_SIZE_FILL_PARENT {
            let parent_size = match view.parent {
                Some(parent) => self.calculated_size(parent),
                None => {
                    let canvas = self.canvas_rect();
                    Vec2i::new(canvas.w, canvas.h)
                }
            };
            let margin = view.margin();
            if size.x == VIEW_SIZE_FILL_PARENT {
                size.x = parent_size.x - (margin.left + margin.right);
            }
            if size.y == VIEW_SIZE_FILL_PARENT {
                size.y = parent_size.y - (margin.top + margin.bottom);
            }
        }
        size
    }

    /// Recompute every rectangle and vertex matrix, roots first
    pub fn update_layout(&mut self) {
        let canvas = self.canvas_rect();
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            self.layout_view(root, canvas, &Mat4::identity());
        }
    }

    fn layout_view(&mut self, id: ViewId, parent_rect: Recti, parent_matrix: &Mat4) {
        let view = &mut self.views[id];
        view.rect = resolve_rect(view, parent_rect);
        view.vertex_matrix = parent_matrix * local_matrix(view);

        let (rect, matrix) = (view.rect, view.vertex_matrix);
        for i in 0..self.views[id].subviews.len() {
            let child = self.views[id].subviews[i];
            self.layout_view(child, rect, &matrix);
        }
    }

    /// Clip rectangle a view applies to itself, normalized to the canvas
    ///
    /// # Returns
    /// The transformed view rectangle when clipping is enabled, the whole
    /// canvas otherwise
    #[allow(clippy::cast_precision_loss)]
    pub fn clip_rect(&self, id: ViewId) -> Rect {
        let view = self.view(id);
        if !view.is_clip_rect() {
            return Rect::full();
        }

        let corners = quad_corners(view);
        let width = self.canvas_width as f32;
        let height = self.canvas_height as f32;
        Rect::new(
            corners[0].x / width,
            corners[0].y / height,
            (corners[3].x - corners[0].x) / width,
            (corners[1].y - corners[0].y) / height,
        )
    }

    /// Append one quad per view, depth-first in draw order
    pub fn fill_meshes(&self, meshes: &mut Vec<ViewMesh>) {
        for &root in &self.roots {
            self.fill_view_meshes(root, Rect::full(), meshes);
        }
    }

    fn fill_view_meshes(&self, id: ViewId, parent_clip: Rect, meshes: &mut Vec<ViewMesh>) {
        let view = self.view(id);
        let clip = self.clip_rect(id).intersection(&parent_clip);

        meshes.push(ViewMesh::quad(id, quad_corners(view), view.color(), view.content().clone(), clip));

        for &child in view.subviews() {
            self.fill_view_meshes(child, clip, meshes);
        }
    }

    /// Run the `event` handler of `id`, returning whether it blocks
    ///
    /// The handler may freely mutate the tree, including destroying `id`.
    pub(crate) fn dispatch(&mut self, id: ViewId, event: TouchEvent, position: Vec2i) -> bool {
        let Some(mut handler) = self.views.get_mut(id).and_then(|view| view.take_handler(event)) else {
            return false;
        };
        let blocked = handler(self, id, position);
        if let Some(view) = self.views.get_mut(id) {
            view.restore_handler(event, handler);
        }
        blocked
    }
}

#[allow(clippy::cast_precision_loss)]
fn resolve_rect(view: &View, parent: Recti) -> Recti {
    let alignment = view.alignment();
    let mut anchor = Vec2i::zeros();

    if alignment.contains(ViewAlignment::LEFT) {
        anchor.x = 0;
    } else if alignment.contains(ViewAlignment::H_CENTER) {
        anchor.x = parent.w / 2;
    } else if alignment.contains(ViewAlignment::RIGHT) {
        anchor.x = parent.w;
    }

    if alignment.contains(ViewAlignment::TOP) {
        anchor.y = 0;
    } else if alignment.contains(ViewAlignment::V_CENTER) {
        anchor.y = parent.h / 2;
    } else if alignment.contains(ViewAlignment::BOTTOM) {
        anchor.y = parent.h;
    }

    let local = anchor + view.offset();
    let size = view.size();
    let pivot = view.pivot();
    let margin = view.margin();
    let mut rect = Recti::default();

    if size.x == VIEW_SIZE_FILL_PARENT {
        rect.x = parent.x + margin.left;
        rect.w = parent.w - (margin.left + margin.right);
    } else {
        rect.x = parent.x + local.x - round_to_int(pivot.x * size.x as f32);
        rect.w = size.x;
    }

    if size.y == VIEW_SIZE_FILL_PARENT {
        rect.y = parent.y + margin.top;
        rect.h = parent.h - (margin.top + margin.bottom);
    } else {
        rect.y = parent.y + local.y - round_to_int(pivot.y * size.y as f32);
        rect.h = size.y;
    }

    rect
}

/// Rotation and scale about the pivot, in canvas space
#[allow(clippy::cast_precision_loss)]
fn local_matrix(view: &View) -> Mat4 {
    let rect = view.rect;
    let pivot = view.pivot();
    let scale = view.local_scale();
    let pivot_pos = Vec3::new(
        rect.x as f32 + (pivot.x * rect.w as f32).round(),
        rect.y as f32 + (pivot.y * rect.h as f32).round(),
        0.0,
    );

    Mat4::new_translation(&pivot_pos)
        * view.local_rotation().to_homogeneous()
        * Mat4::new_nonuniform_scaling(&Vec3::new(scale.x, scale.y, 1.0))
        * Mat4::new_translation(&-pivot_pos)
}

/// Transformed corners: top-left, bottom-left, bottom-right, top-right
#[allow(clippy::cast_precision_loss)]
fn quad_corners(view: &View) -> [Vec3; 4] {
    let r = view.rect;
    let (x0, y0) = (r.x as f32, r.y as f32);
    let (x1, y1) = ((r.x + r.w) as f32, (r.y + r.h) as f32);
    [(x0, y0), (x0, y1), (x1, y1), (x1, y0)].map(|(x, y)| view.vertex_matrix.transform_point(&Point3::new(x, y, 0.0)).coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Quat, Vec2};
    use crate::ui::view::Margin;
    use approx::assert_relative_eq;

    fn top_left(tree: &mut ViewTree, size: (i32, i32), offset: (i32, i32)) -> ViewId {
        let id = tree.create_view();
        let view = tree.view_mut(id);
        view.set_alignment(ViewAlignment::LEFT | ViewAlignment::TOP);
        view.set_pivot(Vec2::new(0.0, 0.0));
        view.set_size(Vec2i::new(size.0, size.1));
        view.set_offset(Vec2i::new(offset.0, offset.1));
        id
    }

    #[test]
    fn test_top_left_alignment() {
        let mut tree = ViewTree::new(800, 600);
        let id = top_left(&mut tree, (50, 50), (10, 10));
        tree.attach_root(id);
        tree.update_layout();

        assert_eq!(tree.view(id).rect(), Recti::new(10, 10, 50, 50));
    }

    #[test]
    fn test_default_view_is_centered() {
        let mut tree = ViewTree::new(800, 600);
        let id = tree.create_view();
        tree.attach_root(id);
        tree.update_layout();

        assert_eq!(tree.view(id).rect(), Recti::new(350, 250, 100, 100));
    }

    #[test]
    fn test_fill_parent_uses_margins() {
        let mut tree = ViewTree::new(800, 600);
        let parent = top_left(&mut tree, (400, 300), (100, 50));
        let child = tree.create_view();
        {
            let view = tree.view_mut(child);
            view.set_size(Vec2i::new(VIEW_SIZE_FILL_PARENT, VIEW_SIZE_FILL_PARENT));
            view.set_margin(Margin::new(10, 20, 30, 40));
        }
        tree.attach_root(parent);
        tree.add_subview(parent, child);
        tree.update_layout();

        assert_eq!(tree.view(child).rect(), Recti::new(110, 70, 360, 240));
        assert_eq!(tree.calculated_size(child), Vec2i::new(360, 240));
    }

    #[test]
    fn test_right_bottom_anchor() {
        let mut tree = ViewTree::new(800, 600);
        let id = tree.create_view();
        {
            let view = tree.view_mut(id);
            view.set_alignment(ViewAlignment::RIGHT | ViewAlignment::BOTTOM);
            view.set_pivot(Vec2::new(1.0, 1.0));
            view.set_size(Vec2i::new(20, 30));
            view.set_offset(Vec2i::new(-5, -5));
        }
        tree.attach_root(id);
        tree.update_layout();

        assert_eq!(tree.view(id).rect(), Recti::new(775, 565, 20, 30));
    }

    #[test]
    fn test_layout_is_deterministic() {
        let mut tree = ViewTree::new(640, 480);
        let root = tree.create_view();
        let child = tree.create_view();
        tree.view_mut(child)
            .set_local_rotation(Quat::from_axis_angle(&Vec3::z_axis(), 0.3));
        tree.attach_root(root);
        tree.add_subview(root, child);

        tree.update_layout();
        let first = (tree.view(child).rect(), *tree.view(child).vertex_matrix());
        tree.update_layout();
        let second = (tree.view(child).rect(), *tree.view(child).vertex_matrix());

        assert_eq!(first, second);
    }

    #[test]
    fn test_scale_about_pivot() {
        let mut tree = ViewTree::new(800, 600);
        let id = top_left(&mut tree, (100, 100), (0, 0));
        tree.view_mut(id).set_pivot(Vec2::new(0.5, 0.5));
        tree.view_mut(id).set_local_scale(Vec2::new(0.5, 0.5));
        tree.view_mut(id).set_offset(Vec2i::new(50, 50));
        tree.attach_root(id);
        tree.update_layout();

        let corners = quad_corners(tree.view(id));
        assert_relative_eq!(corners[0].x, 25.0);
        assert_relative_eq!(corners[2].y, 75.0);
    }

    #[test]
    fn test_child_clip_is_intersection() {
        let mut tree = ViewTree::new(100, 100);
        let parent = top_left(&mut tree, (50, 50), (0, 0));
        let child = top_left(&mut tree, (50, 50), (25, 25));
        tree.view_mut(parent).enable_clip_rect(true);
        tree.view_mut(child).enable_clip_rect(true);
        tree.attach_root(parent);
        tree.add_subview(parent, child);
        tree.update_layout();

        let mut meshes = Vec::new();
        tree.fill_meshes(&mut meshes);

        assert_eq!(meshes.len(), 2);
        let clip = meshes[1].clip_rect;
        assert_relative_eq!(clip.x, 0.25);
        assert_relative_eq!(clip.w, 0.25);
        assert!(meshes[0].clip_rect.contains_rect(&clip, 1e-6));
    }

    #[test]
    #[should_panic(expected = "already has parent")]
    fn test_second_parent_panics() {
        let mut tree = ViewTree::new(100, 100);
        let a = tree.create_view();
        let b = tree.create_view();
        let child = tree.create_view();
        tree.add_subview(a, child);
        tree.add_subview(b, child);
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn test_cycle_panics() {
        let mut tree = ViewTree::new(100, 100);
        let a = tree.create_view();
        let b = tree.create_view();
        tree.add_subview(a, b);
        tree.add_subview(b, a);
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let mut tree = ViewTree::new(100, 100);
        let root = tree.create_view();
        let child = tree.create_view();
        let grandchild = tree.create_view();
        tree.attach_root(root);
        tree.add_subview(root, child);
        tree.add_subview(child, grandchild);

        tree.destroy_view(child);

        assert!(tree.contains(root));
        assert!(!tree.contains(child));
        assert!(!tree.contains(grandchild));
        assert!(tree.view(root).subviews().is_empty());
    }

    #[test]
    #[should_panic(expected = "destroyed or never existed in this tree")]
    fn test_destroyed_view_lookup_panics() {
        let mut tree = ViewTree::new(100, 100);
        let view = tree.create_view();
        tree.destroy_view(view);
        tree.view(view);
    }

    #[test]
    fn test_clear_subviews_keeps_children_alive() {
        let mut tree = ViewTree::new(100, 100);
        let root = tree.create_view();
        let child = tree.create_view();
        tree.add_subview(root, child);
        tree.take_dirty();

        tree.clear_subviews(root);

        assert!(tree.is_dirty());
        assert!(tree.view(child).parent().is_none());
        assert_eq!(tree.len(), 2);
    }
}
