//! Touch routing
//!
//! Hit-tests touches against the quads of the last canvas rebuild, topmost
//! first, and dispatches the view handlers. A handler returning `true`
//! blocks the event from the views below.

use std::collections::HashMap;

use super::tree::{ViewId, ViewTree};
use super::view::TouchEvent;
use super::view_mesh::ViewMesh;
use crate::foundation::math::{Vec2, Vec2i};

/// Phase of a touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchPhase {
    /// Finger went down
    Began,
    /// Finger moved
    Moved,
    /// Finger lifted
    Ended,
}

/// One touch sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    /// Finger identifier, stable from `Began` to `Ended`
    pub finger_id: i32,
    /// Position in canvas pixels, top-left origin
    pub position: Vec2,
    /// Phase
    pub phase: TouchPhase,
}

impl Touch {
    /// Create a touch sample
    pub fn new(finger_id: i32, position: Vec2, phase: TouchPhase) -> Self {
        Self {
            finger_id,
            position,
            phase,
        }
    }
}

/// Per-finger record of the views that accepted a touch down
#[derive(Debug, Default)]
pub struct TouchRouter {
    touch_down_views: HashMap<i32, Vec<ViewId>>,
}

impl TouchRouter {
    /// Router with no active fingers
    pub fn new() -> Self {
        Self::default()
    }

    /// Views that received the down event of `finger_id`, topmost first
    pub fn touch_down_views(&self, finger_id: i32) -> &[ViewId] {
        self.touch_down_views.get(&finger_id).map_or(&[], Vec::as_slice)
    }

    /// Dispatch one touch
    ///
    /// # Arguments
    /// * `tree` - Views whose handlers run; handlers may mutate it
    /// * `meshes` - Quads of the last rebuild, back to front
    /// * `touch` - The sample to route
    #[allow(clippy::cast_possible_truncation)]
    pub fn route(&mut self, tree: &mut ViewTree, meshes: &[ViewMesh], touch: &Touch) {
        let position = Vec2i::new(touch.position.x as i32, touch.position.y as i32);
        log::trace!("Touch {} {:?} at {:?}", touch.finger_id, touch.phase, position);

        match touch.phase {
            TouchPhase::Began => {
                for mesh in meshes.iter().rev() {
                    if !tree.contains(mesh.view) || !mesh.contains_point(position) {
                        continue;
                    }
                    self.touch_down_views.entry(touch.finger_id).or_default().push(mesh.view);
                    if tree.dispatch(mesh.view, TouchEvent::DownInside, position) {
                        break;
                    }
                }
            }
            TouchPhase::Moved => {
                if let Some(views) = self.touch_down_views.get(&touch.finger_id) {
                    for &view in views {
                        if tree.dispatch(view, TouchEvent::Drag, position) {
                            break;
                        }
                    }
                }

                for mesh in meshes.iter().rev() {
                    if !tree.contains(mesh.view) || !mesh.contains_point(position) {
                        continue;
                    }
                    if tree.dispatch(mesh.view, TouchEvent::MoveInside, position) {
                        break;
                    }
                }
            }
            TouchPhase::Ended => {
                let mut blocked = false;
                for mesh in meshes.iter().rev() {
                    if !tree.contains(mesh.view) {
                        continue;
                    }
                    if blocked {
                        tree.dispatch(mesh.view, TouchEvent::UpOutside, position);
                    } else if mesh.contains_point(position) {
                        blocked = tree.dispatch(mesh.view, TouchEvent::UpInside, position);
                    }
                }
                self.touch_down_views.remove(&touch.finger_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::view::ViewAlignment;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(&'static str, ViewId)>>>;

    /// Three stacked 100x100 quads at the canvas origin
    fn stack(block: [bool; 3]) -> (ViewTree, Vec<ViewMesh>, [ViewId; 3], Log) {
        let mut tree = ViewTree::new(200, 200);
        let log: Log = Rc::default();
        let mut ids = Vec::new();

        for blocks in block {
            let id = tree.create_view();
            let view = tree.view_mut(id);
            view.set_alignment(ViewAlignment::LEFT | ViewAlignment::TOP);
            view.set_pivot(Vec2::zeros());
            for (event, name) in [
                (TouchEvent::DownInside, "down"),
                (TouchEvent::MoveInside, "move"),
                (TouchEvent::UpInside, "up"),
                (TouchEvent::UpOutside, "up_outside"),
                (TouchEvent::Drag, "drag"),
            ] {
                let log = Rc::clone(&log);
                view.set_touch_handler(event, move |_, id, _| {
                    log.borrow_mut().push((name, id));
                    blocks
                });
            }
            tree.attach_root(id);
            ids.push(id);
        }

        tree.update_layout();
        let mut meshes = Vec::new();
        tree.fill_meshes(&mut meshes);
        (tree, meshes, [ids[0], ids[1], ids[2]], log)
    }

    fn touch(phase: TouchPhase, x: f32, y: f32) -> Touch {
        Touch::new(0, Vec2::new(x, y), phase)
    }

    #[test]
    fn test_topmost_blocking_view_stops_down() {
        let (mut tree, meshes, [_, _, top], log) = stack([false, false, true]);
        let mut router = TouchRouter::new();

        router.route(&mut tree, &meshes, &touch(TouchPhase::Began, 50.0, 50.0));

        assert_eq!(*log.borrow(), vec![("down", top)]);
        assert_eq!(router.touch_down_views(0), &[top]);
    }

    #[test]
    fn test_non_blocking_top_passes_down() {
        let (mut tree, meshes, [bottom, middle, top], log) = stack([false, true, false]);
        let mut router = TouchRouter::new();

        router.route(&mut tree, &meshes, &touch(TouchPhase::Began, 50.0, 50.0));

        assert_eq!(*log.borrow(), vec![("down", top), ("down", middle)]);
        assert!(!router.touch_down_views(0).contains(&bottom));
    }

    #[test]
    fn test_move_drags_recorded_views_then_hit_tests() {
        let (mut tree, meshes, [bottom, middle, top], log) = stack([false, false, false]);
        let mut router = TouchRouter::new();
        router.route(&mut tree, &meshes, &touch(TouchPhase::Began, 10.0, 10.0));
        log.borrow_mut().clear();

        router.route(&mut tree, &meshes, &touch(TouchPhase::Moved, 150.0, 150.0));

        assert_eq!(*log.borrow(), vec![("drag", top), ("drag", middle), ("drag", bottom)]);
    }

    #[test]
    fn test_end_after_block_is_up_outside() {
        let (mut tree, meshes, [bottom, middle, top], log) = stack([false, true, false]);
        let mut router = TouchRouter::new();
        router.route(&mut tree, &meshes, &touch(TouchPhase::Began, 10.0, 10.0));
        log.borrow_mut().clear();

        router.route(&mut tree, &meshes, &touch(TouchPhase::Ended, 10.0, 10.0));

        assert_eq!(
            *log.borrow(),
            vec![("up", top), ("up", middle), ("up_outside", bottom)]
        );
        assert!(router.touch_down_views(0).is_empty());
    }

    #[test]
    fn test_handler_can_destroy_views() {
        let (mut tree, meshes, [bottom, middle, top], _) = stack([false, false, false]);
        tree.view_mut(top)
            .set_touch_handler(TouchEvent::DownInside, move |tree, _, _| {
                tree.destroy_view(middle);
                false
            });
        let mut router = TouchRouter::new();

        router.route(&mut tree, &meshes, &touch(TouchPhase::Began, 10.0, 10.0));

        assert_eq!(router.touch_down_views(0), &[top, bottom]);
        assert!(!tree.contains(middle));
    }
}
