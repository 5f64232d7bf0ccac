//! Canvas demo application
//!
//! Builds a small view hierarchy, replays a scripted tap on a button and
//! writes the frames and the atlas layers as PNGs. Runs headless on the
//! software backend.
//!
//! Usage: `canvas_demo [config.toml|config.ron] [output_dir]`

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use canvas_engine::prelude::*;

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("rendering: {0}")]
    Render(#[from] RenderError),
}

const BUTTON_IDLE: Color = Color::new(0.2, 0.5, 0.9, 1.0);
const BUTTON_PRESSED: Color = Color::new(0.9, 0.4, 0.2, 1.0);

/// Checkerboard with `cell`-pixel squares
fn checkerboard(size: u32, cell: u32, a: Color, b: Color) -> Result<Image, RenderError> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let color = if (x / cell + y / cell) % 2 == 0 { a } else { b };
            pixels.extend_from_slice(&color.to_rgba8());
        }
    }
    Image::from_raw(size, size, pixels)
}

struct DemoApp {
    engine: GraphicsEngine,
    canvas: CanvasRenderer,
    button: ViewId,
    taps: Rc<Cell<u32>>,
}

impl DemoApp {
    fn new(config: &EngineConfig) -> Result<Self, DemoError> {
        log::info!("Creating canvas demo...");
        let mut engine = GraphicsEngine::new(config)?;
        let mut canvas = engine.create_canvas()?;
        let taps = Rc::new(Cell::new(0));

        let tree = canvas.tree_mut();

        // Full-screen backdrop with a 16px margin
        let backdrop = tree.create_view();
        {
            let view = tree.view_mut(backdrop);
            view.set_size(Vec2i::new(VIEW_SIZE_FILL_PARENT, VIEW_SIZE_FILL_PARENT));
            view.set_margin(Margin::new(16, 16, 16, 16));
            view.set_image(Rc::new(checkerboard(64, 8, Color::new(0.15, 0.15, 0.18, 1.0), Color::new(0.2, 0.2, 0.24, 1.0))?));
        }

        // Clipped list whose last rows hang past its bottom edge
        let list = tree.create_view();
        {
            let view = tree.view_mut(list);
            view.set_alignment(ViewAlignment::LEFT | ViewAlignment::TOP);
            view.set_pivot(Vec2::zeros());
            view.set_offset(Vec2i::new(32, 32));
            view.set_size(Vec2i::new(240, 200));
            view.enable_clip_rect(true);
            view.set_image(Rc::new(Image::solid(4, 4, Color::new(0.1, 0.1, 0.1, 1.0))));
        }
        let row_image = Rc::new(Image::solid(16, 16, Color::WHITE));
        for row in 0..6 {
            let item = tree.create_view();
            let view = tree.view_mut(item);
            view.set_alignment(ViewAlignment::LEFT | ViewAlignment::TOP);
            view.set_pivot(Vec2::zeros());
            view.set_offset(Vec2i::new(8, 8 + row * 48));
            view.set_size(Vec2i::new(224, 40));
            #[allow(clippy::cast_precision_loss)]
            let shade = 0.4 + row as f32 * 0.1;
            view.set_color(Color::new(shade, 0.8, 1.0 - shade * 0.5, 1.0));
            view.set_image(Rc::clone(&row_image));
            tree.add_subview(list, item);
        }
        tree.add_subview(backdrop, list);

        // Rotated badge in the top-right corner
        let badge = tree.create_view();
        {
            let view = tree.view_mut(badge);
            view.set_alignment(ViewAlignment::RIGHT | ViewAlignment::TOP);
            view.set_pivot(Vec2::new(1.0, 0.0));
            view.set_offset(Vec2i::new(-48, 48));
            view.set_size(Vec2i::new(64, 64));
            view.set_local_rotation(Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_8));
            view.set_image(Rc::new(checkerboard(32, 4, Color::WHITE, Color::new(0.9, 0.8, 0.1, 1.0))?));
        }
        tree.add_subview(backdrop, badge);

        // Button anchored bottom-center
        let button = tree.create_view();
        {
            let view = tree.view_mut(button);
            view.set_alignment(ViewAlignment::H_CENTER | ViewAlignment::BOTTOM);
            view.set_pivot(Vec2::new(0.5, 1.0));
            view.set_offset(Vec2i::new(0, -32));
            view.set_size(Vec2i::new(200, 60));
            view.set_color(BUTTON_IDLE);
            view.set_image(Rc::new(Image::solid(8, 8, Color::WHITE)));
            view.set_touch_handler(TouchEvent::DownInside, |tree, id, _| {
                tree.view_mut(id).set_color(BUTTON_PRESSED);
                true
            });
            let counter = Rc::clone(&taps);
            view.set_touch_handler(TouchEvent::UpInside, move |tree, id, position| {
                counter.set(counter.get() + 1);
                log::info!("Button tapped at {}, {} ({} taps)", position.x, position.y, counter.get());
                tree.view_mut(id).set_color(BUTTON_IDLE);
                true
            });
        }
        tree.add_subview(backdrop, button);

        canvas.add_view(backdrop);

        Ok(Self {
            engine,
            canvas,
            button,
            taps,
        })
    }

    /// Render the idle, pressed and released frames
    fn run(&mut self, output_dir: &Path) -> Result<(), DemoError> {
        std::fs::create_dir_all(output_dir).map_err(RenderError::from)?;

        self.engine.render_frame(&mut self.canvas, &[])?;
        self.engine.save_frame_png(&output_dir.join("frame_idle.png"))?;

        #[allow(clippy::cast_precision_loss)]
        let center = {
            let rect = self.canvas.tree().view(self.button).rect();
            Vec2::new((rect.x + rect.w / 2) as f32, (rect.y + rect.h / 2) as f32)
        };

        self.engine
            .render_frame(&mut self.canvas, &[Touch::new(0, center, TouchPhase::Began)])?;
        self.engine.save_frame_png(&output_dir.join("frame_pressed.png"))?;

        self.engine
            .render_frame(&mut self.canvas, &[Touch::new(0, center, TouchPhase::Ended)])?;
        self.engine.save_frame_png(&output_dir.join("frame_released.png"))?;

        let layers = self.canvas.save_atlas_layers(self.engine.driver(), output_dir)?;
        log::info!(
            "Demo finished: {} frames, {} taps, {} atlas layers written to {}",
            self.engine.frame_count(),
            self.taps.get(),
            layers.len(),
            output_dir.display()
        );
        Ok(())
    }

    fn shutdown(self) {
        let Self { mut engine, canvas, .. } = self;
        canvas.destroy(engine.driver());
        engine.destroy();
    }
}

fn main() -> Result<(), DemoError> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load_from_file(&path)?,
        None => EngineConfig::default(),
    };
    let output_dir = args.next().map_or_else(|| PathBuf::from("canvas_demo_output"), PathBuf::from);

    let mut app = DemoApp::new(&config)?;
    let result = app.run(&output_dir);
    app.shutdown();

    if let Err(error) = &result {
        log::error!("Canvas demo failed: {error}");
    }
    result
}
