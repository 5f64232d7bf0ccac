//! End-to-end canvas tests on the software backend: view tree, compositor,
//! atlas and driver, checked through the pixels of the presented frame.

use std::cell::RefCell;
use std::rc::Rc;

use canvas_engine::prelude::*;
use canvas_engine::render::driver::FilterMode;
use canvas_engine::ui::{AtlasPacker, CanvasRenderer};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn engine(width: u32, height: u32) -> GraphicsEngine {
    let mut config = EngineConfig {
        width,
        height,
        ..EngineConfig::default()
    };
    config.canvas.clear_color = Color::BLACK;
    GraphicsEngine::new(&config).unwrap()
}

/// Top-left anchored view showing a solid image
fn sprite(canvas: &mut CanvasRenderer, rect: Recti, color: Color) -> ViewId {
    let tree = canvas.tree_mut();
    let id = tree.create_view();
    let view = tree.view_mut(id);
    view.set_alignment(ViewAlignment::LEFT | ViewAlignment::TOP);
    view.set_pivot(Vec2::zeros());
    view.set_offset(Vec2i::new(rect.x, rect.y));
    view.set_size(Vec2i::new(rect.w, rect.h));
    view.set_image(Rc::new(Image::solid(rect.w.unsigned_abs(), rect.h.unsigned_abs(), color)));
    id
}

fn pixel(engine: &mut GraphicsEngine, x: u32, y: u32) -> [u8; 4] {
    engine.read_frame_pixel(x, y).to_rgba8()
}

#[test]
fn test_sprite_is_drawn_at_its_layout_rect() {
    let mut engine = engine(64, 64);
    let mut canvas = engine.create_canvas().unwrap();
    let view = sprite(&mut canvas, Recti::new(8, 8, 16, 16), Color::new(1.0, 0.0, 0.0, 1.0));
    canvas.add_view(view);

    engine.render_frame(&mut canvas, &[]).unwrap();

    assert_eq!(pixel(&mut engine, 12, 12), RED);
    assert_eq!(pixel(&mut engine, 20, 20), RED);
    assert_eq!(pixel(&mut engine, 4, 4), BLACK);
    assert_eq!(pixel(&mut engine, 30, 30), BLACK);
    assert_eq!(canvas.tree().view(view).rect(), Recti::new(8, 8, 16, 16));
}

#[test]
fn test_later_views_draw_on_top() {
    let mut engine = engine(64, 64);
    let mut canvas = engine.create_canvas().unwrap();
    let below = sprite(&mut canvas, Recti::new(0, 0, 32, 32), Color::new(1.0, 0.0, 0.0, 1.0));
    let above = sprite(&mut canvas, Recti::new(16, 16, 32, 32), Color::new(0.0, 1.0, 0.0, 1.0));
    canvas.add_view(below);
    canvas.add_view(above);

    engine.render_frame(&mut canvas, &[]).unwrap();

    assert_eq!(pixel(&mut engine, 8, 8), RED);
    assert_eq!(pixel(&mut engine, 24, 24), GREEN);
    assert_eq!(pixel(&mut engine, 40, 40), GREEN);
    assert_eq!(canvas.materials().len(), 1);
}

#[test]
fn test_clip_rect_limits_subviews() {
    let mut engine = engine(64, 64);
    let mut canvas = engine.create_canvas().unwrap();
    let frame = sprite(&mut canvas, Recti::new(0, 0, 20, 20), Color::new(0.0, 1.0, 0.0, 1.0));
    let content = sprite(&mut canvas, Recti::new(0, 0, 40, 40), Color::new(0.0, 0.0, 1.0, 1.0));
    canvas.tree_mut().view_mut(frame).enable_clip_rect(true);
    canvas.tree_mut().add_subview(frame, content);
    canvas.add_view(frame);

    engine.render_frame(&mut canvas, &[]).unwrap();

    assert_eq!(pixel(&mut engine, 10, 10), BLUE);
    assert_eq!(pixel(&mut engine, 30, 30), BLACK);
    assert_eq!(pixel(&mut engine, 10, 30), BLACK);
}

#[test]
fn test_fill_parent_child_follows_parent() {
    let mut engine = engine(64, 64);
    let mut canvas = engine.create_canvas().unwrap();
    let container = canvas.tree_mut().create_view();
    canvas.tree_mut().view_mut(container).set_size(Vec2i::new(40, 40));
    let fill = sprite(&mut canvas, Recti::new(0, 0, 8, 8), Color::new(1.0, 0.0, 0.0, 1.0));
    {
        let view = canvas.tree_mut().view_mut(fill);
        view.set_size(Vec2i::new(VIEW_SIZE_FILL_PARENT, VIEW_SIZE_FILL_PARENT));
        view.set_margin(Margin::new(4, 4, 4, 4));
    }
    canvas.tree_mut().add_subview(container, fill);
    canvas.add_view(container);

    engine.render_frame(&mut canvas, &[]).unwrap();

    // container is centered: (12, 12, 40, 40)
    assert_eq!(canvas.tree().view(container).rect(), Recti::new(12, 12, 40, 40));
    assert_eq!(canvas.tree().view(fill).rect(), Recti::new(16, 16, 32, 32));
    assert_eq!(pixel(&mut engine, 14, 14), BLACK);
    assert_eq!(pixel(&mut engine, 20, 20), RED);
}

#[test]
fn test_same_image_is_packed_once() {
    let mut engine = engine(64, 64);
    let mut canvas = engine.create_canvas().unwrap();
    let image = Rc::new(Image::solid(8, 8, Color::WHITE));
    for x in [0, 16, 32] {
        let id = sprite(&mut canvas, Recti::new(x, 0, 8, 8), Color::WHITE);
        canvas.tree_mut().view_mut(id).set_image(Rc::clone(&image));
        canvas.add_view(id);
    }

    engine.render_frame(&mut canvas, &[]).unwrap();

    let packer = canvas.atlas().packer();
    assert_eq!(packer.placed_rects().len(), 1);
    assert_eq!(packer.node_count(), 3);
}

#[test]
fn test_shared_texture_is_copied_into_the_atlas_once() {
    let mut engine = engine(64, 64);
    let mut canvas = engine.create_canvas().unwrap();
    let source = Image::solid(8, 8, Color::new(0.0, 1.0, 0.0, 1.0));
    let texture = Rc::new(Texture::from_image(engine.driver(), &source, FilterMode::Nearest).unwrap());
    for x in [0, 16] {
        let id = sprite(&mut canvas, Recti::new(x, 0, 8, 8), Color::WHITE);
        canvas.tree_mut().view_mut(id).set_texture(Rc::clone(&texture));
        canvas.add_view(id);
    }

    engine.render_frame(&mut canvas, &[]).unwrap();

    assert_eq!(pixel(&mut engine, 4, 4), GREEN);
    assert_eq!(pixel(&mut engine, 20, 4), GREEN);
    assert_eq!(pixel(&mut engine, 12, 4), BLACK);
    let placed = canvas.atlas().packer().placed_rects();
    assert_eq!(placed, vec![(0, Recti::new(0, 0, 8, 8))]);
    assert!(canvas.atlas().packer().cached(texture.id()).is_some());
}

#[test]
fn test_removing_views_empties_the_mesh() {
    let mut engine = engine(32, 32);
    let mut canvas = engine.create_canvas().unwrap();
    let view = sprite(&mut canvas, Recti::new(0, 0, 32, 32), Color::new(1.0, 0.0, 0.0, 1.0));
    canvas.add_view(view);
    engine.render_frame(&mut canvas, &[]).unwrap();
    assert!(canvas.mesh().is_some());

    canvas.remove_all_views();
    engine.render_frame(&mut canvas, &[]).unwrap();

    assert!(canvas.mesh().is_none());
    assert!(canvas.tree().contains(view));
    assert_eq!(pixel(&mut engine, 16, 16), BLACK);
}

#[test]
fn test_touch_handler_mutates_the_tree() {
    let mut engine = engine(64, 64);
    let mut canvas = engine.create_canvas().unwrap();
    let button = sprite(&mut canvas, Recti::new(0, 0, 32, 32), Color::WHITE);
    canvas.tree_mut().view_mut(button).set_color(Color::new(1.0, 0.0, 0.0, 1.0));
    let presses = Rc::new(RefCell::new(0));
    {
        let presses = Rc::clone(&presses);
        canvas
            .tree_mut()
            .view_mut(button)
            .set_touch_handler(TouchEvent::UpInside, move |tree, id, _| {
                *presses.borrow_mut() += 1;
                tree.view_mut(id).set_color(Color::new(0.0, 1.0, 0.0, 1.0));
                true
            });
    }
    canvas.add_view(button);
    engine.render_frame(&mut canvas, &[]).unwrap();
    assert_eq!(pixel(&mut engine, 16, 16), RED);

    let down = Touch::new(1, Vec2::new(16.0, 16.0), TouchPhase::Began);
    let up = Touch::new(1, Vec2::new(16.0, 16.0), TouchPhase::Ended);
    engine.render_frame(&mut canvas, &[down, up]).unwrap();

    assert_eq!(*presses.borrow(), 1);
    assert_eq!(pixel(&mut engine, 16, 16), GREEN);
}

#[test]
fn test_atlas_layers_are_saved() {
    let mut engine = engine(32, 32);
    let mut canvas = engine.create_canvas().unwrap();
    let view = sprite(&mut canvas, Recti::new(0, 0, 4, 4), Color::WHITE);
    canvas.add_view(view);
    engine.render_frame(&mut canvas, &[]).unwrap();

    let dir = std::env::temp_dir().join(format!("canvas_engine_atlas_{}", std::process::id()));
    let paths = canvas.save_atlas_layers(engine.driver(), &dir).unwrap();

    assert_eq!(paths.len(), 1);
    let layer = Image::from_file(&paths[0]).unwrap();
    assert_eq!((layer.width(), layer.height()), (2048, 2048));
    assert_eq!(&layer.pixels()[..4], &[255, 255, 255, 255]);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_top_left_view_with_offset() {
    let mut engine = engine(800, 600);
    let mut canvas = engine.create_canvas().unwrap();
    let view = canvas.tree_mut().create_view();
    {
        let view = canvas.tree_mut().view_mut(view);
        view.set_alignment(ViewAlignment::LEFT | ViewAlignment::TOP);
        view.set_pivot(Vec2::zeros());
        view.set_size(Vec2i::new(50, 50));
        view.set_offset(Vec2i::new(10, 10));
    }
    canvas.add_view(view);
    engine.render_frame(&mut canvas, &[]).unwrap();

    assert_eq!(canvas.tree().view(view).rect(), Recti::new(10, 10, 50, 50));
}

#[test]
fn test_second_placement_does_not_overlap() {
    let mut packer = AtlasPacker::new(2048, 1);
    let first = packer.allocate(Image::solid(1, 1, Color::WHITE).id(), 100, 100);
    let second = packer.allocate(Image::solid(1, 1, Color::WHITE).id(), 100, 100);

    assert!(!first.placement.rect.expanded(1).intersects(&second.placement.rect));
    assert_eq!(first.placement.layer, second.placement.layer);
}

#[test]
#[should_panic(expected = "does not fit")]
fn test_full_layer_request_panics() {
    let mut packer = AtlasPacker::new(2048, 1);
    packer.allocate(Image::solid(1, 1, Color::WHITE).id(), 2048, 2048);
}
