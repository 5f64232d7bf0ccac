//! Touch routing through a prepared canvas

use std::cell::RefCell;
use std::rc::Rc;

use canvas_engine::prelude::*;

type Events = Rc<RefCell<Vec<(TouchEvent, usize)>>>;

/// Three overlapping 100x100 quads; index 2 is the topmost
fn stacked(blocking: [bool; 3]) -> (GraphicsEngine, CanvasRenderer, Events) {
    let mut engine = GraphicsEngine::new(&EngineConfig {
        width: 200,
        height: 200,
        ..EngineConfig::default()
    })
    .unwrap();
    let mut canvas = engine.create_canvas().unwrap();
    let events: Events = Rc::default();

    for (index, blocks) in blocking.into_iter().enumerate() {
        let id = canvas.tree_mut().create_view();
        let view = canvas.tree_mut().view_mut(id);
        for event in [
            TouchEvent::DownInside,
            TouchEvent::MoveInside,
            TouchEvent::UpInside,
            TouchEvent::UpOutside,
            TouchEvent::Drag,
        ] {
            let events = Rc::clone(&events);
            view.set_touch_handler(event, move |_, _, _| {
                events.borrow_mut().push((event, index));
                blocks
            });
        }
        canvas.add_view(id);
    }

    engine.render_frame(&mut canvas, &[]).unwrap();
    (engine, canvas, events)
}

fn at(finger: i32, x: f32, y: f32, phase: TouchPhase) -> Touch {
    Touch::new(finger, Vec2::new(x, y), phase)
}

#[test]
fn test_blocking_top_view_gets_the_only_down() {
    let (mut engine, mut canvas, events) = stacked([false, false, true]);

    engine
        .render_frame(&mut canvas, &[at(0, 100.0, 100.0, TouchPhase::Began)])
        .unwrap();

    assert_eq!(*events.borrow(), vec![(TouchEvent::DownInside, 2)]);
}

#[test]
fn test_non_blocking_top_view_lets_the_next_one_see_down() {
    let (mut engine, mut canvas, events) = stacked([false, false, false]);

    engine
        .render_frame(&mut canvas, &[at(0, 100.0, 100.0, TouchPhase::Began)])
        .unwrap();

    assert_eq!(
        *events.borrow(),
        vec![(TouchEvent::DownInside, 2), (TouchEvent::DownInside, 1), (TouchEvent::DownInside, 0)]
    );
}

#[test]
fn test_miss_dispatches_nothing() {
    let (mut engine, mut canvas, events) = stacked([true, true, true]);

    engine.render_frame(&mut canvas, &[at(0, 5.0, 5.0, TouchPhase::Began)]).unwrap();

    assert!(events.borrow().is_empty());
}

#[test]
fn test_full_gesture() {
    let (mut engine, mut canvas, events) = stacked([false, true, false]);

    engine
        .render_frame(
            &mut canvas,
            &[
                at(3, 100.0, 100.0, TouchPhase::Began),
                at(3, 120.0, 120.0, TouchPhase::Moved),
                at(3, 120.0, 120.0, TouchPhase::Ended),
            ],
        )
        .unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            (TouchEvent::DownInside, 2),
            (TouchEvent::DownInside, 1),
            (TouchEvent::Drag, 2),
            (TouchEvent::Drag, 1),
            (TouchEvent::MoveInside, 2),
            (TouchEvent::MoveInside, 1),
            (TouchEvent::UpInside, 2),
            (TouchEvent::UpInside, 1),
            (TouchEvent::UpOutside, 0),
        ]
    );
    assert!(canvas.touch_router().touch_down_views(3).is_empty());
}

#[test]
fn test_rotated_view_hit_test_uses_its_edges() {
    let mut engine = GraphicsEngine::new(&EngineConfig {
        width: 200,
        height: 200,
        ..EngineConfig::default()
    })
    .unwrap();
    let mut canvas = engine.create_canvas().unwrap();
    let hits = Rc::new(RefCell::new(0));

    let id = canvas.tree_mut().create_view();
    {
        let hits = Rc::clone(&hits);
        let view = canvas.tree_mut().view_mut(id);
        view.set_local_rotation(Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4));
        view.set_touch_handler(TouchEvent::DownInside, move |_, _, _| {
            *hits.borrow_mut() += 1;
            true
        });
    }
    canvas.add_view(id);
    engine.render_frame(&mut canvas, &[]).unwrap();

    // the unrotated corner region is outside the diamond
    engine.render_frame(&mut canvas, &[at(0, 52.0, 52.0, TouchPhase::Began)]).unwrap();
    assert_eq!(*hits.borrow(), 0);

    // straight above the center, past the unrotated top edge
    engine.render_frame(&mut canvas, &[at(1, 100.0, 35.0, TouchPhase::Began)]).unwrap();
    assert_eq!(*hits.borrow(), 1);
}
