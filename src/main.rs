//! Headless demo: a few animated sprites under a rotating group, rendered
//! for a couple of seconds and saved as a PNG.

use scene2d::image::{Rgba, RgbaImage};
use scene2d::prelude::*;

/// Demo game with a spinning group of walkers
struct DemoGame {
    spinner: Option<Entity>,
    completed: u32,
}

impl DemoGame {
    fn new() -> Self {
        Self {
            spinner: None,
            completed: 0,
        }
    }

    /// Four 16x16 cells, each a different colour
    fn sheet() -> RgbaImage {
        let colors = [
            [230, 57, 70, 255],
            [241, 250, 238, 255],
            [168, 218, 220, 255],
            [69, 123, 157, 255],
        ];
        RgbaImage::from_fn(64, 16, |x, _| Rgba(colors[(x / 16) as usize]))
    }
}

impl Game for DemoGame {
    fn init(&mut self, ctx: &mut EngineContext) {
        log::info!("Initializing demo game");

        let mut atlas = match Atlas::sprite_sheet("walker", Self::sheet(), SheetLayout::new(16, 16)) {
            Ok(atlas) => atlas,
            Err(e) => {
                log::error!("Failed to build atlas: {e}");
                ctx.quit();
                return;
            }
        };
        for sequence in [
            Sequence::new("walk", vec![0, 1, 2, 3], 0.1, true),
            Sequence::new("wave", vec![3, 2, 1], 0.2, false),
        ] {
            if let Err(e) = atlas.add_sequence(sequence) {
                log::error!("Bad sequence: {e}");
            }
        }

        let id = ctx.atlases.add(atlas);

        let size = Vec2::new(ctx.width() as f32, ctx.height() as f32);
        let now = ctx.now();

        let root = ctx.scene.root();
        let backdrop = ctx.scene.spawn_rect(
            Vec2::new(size.x, 40.0),
            Color::rgba(0.1, 0.1, 0.2, 1.0),
            Transform2D::from_position(Vec2::new(0.0, size.y - 40.0)),
        );
        let _ = ctx.scene.add_child(root, backdrop);

        let center = size * 0.5;
        let spinner = ctx.scene.spawn_group(Transform2D::from_position(center));
        let _ = ctx.scene.add_child(root, spinner);

        for i in 0..6 {
            let angle = i as f32 * std::f32::consts::TAU / 6.0;
            let position = Vec2::from_angle(angle) * 80.0;
            let Some(atlas) = ctx.atlases.get(id) else {
                break;
            };
            let walker =
                ctx.scene
                    .spawn_animated_sprite(id, atlas, Transform2D::from_position(position));
            let _ = ctx.scene.add_child(spinner, walker);
            let name = if i % 2 == 0 { "walk" } else { "wave" };
            ctx.scene.play_animation(walker, name, now);
        }

        self.spinner = Some(spinner);
        log::info!("Demo game initialized");
    }

    fn update(&mut self, ctx: &mut EngineContext) {
        let dt = ctx.clock.delta() as f32;
        if let Some(spinner) = self.spinner {
            ctx.scene.update_transform(spinner, |t| t.rotate_by(dt * 0.5));
        }
    }

    fn on_frame_end(&mut self, ctx: &mut EngineContext) {
        for event in ctx.scene.events().iter() {
            if let SceneEvent::AnimationCompleted { animation, .. } = event {
                log::debug!("'{animation}' completed");
                self.completed += 1;
            }
        }
    }
}

fn main() {
    let config = std::env::args()
        .nth(1)
        .map(|path| {
            EngineConfig::load_ron(&path).unwrap_or_else(|e| {
                eprintln!("Using default config, could not load {path}: {e}");
                EngineConfig::default()
            })
        })
        .unwrap_or_else(|| EngineConfig::default().with_title("scene2d demo"));

    let mut engine = Engine::new(config, DemoGame::new());
    let frames = engine.run(120);
    log::info!(
        "Ran {frames} frames, {} animations completed",
        engine.game().completed
    );

    match engine.context().snapshot() {
        Ok(image) => match image.save("scene2d_demo.png") {
            Ok(()) => log::info!("Saved scene2d_demo.png"),
            Err(e) => log::error!("Failed to save snapshot: {e}"),
        },
        Err(e) => log::error!("Snapshot failed: {e}"),
    }
}
