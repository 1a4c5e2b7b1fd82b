//! Engine and headless frame loop

use std::time::Duration;

use image::RgbaImage;

use crate::assets::AtlasStore;
use crate::core::debug::FrameStats;
use crate::core::{Clock, EngineConfig, init_logging};
use crate::render::{Camera2D, RenderError, RenderStats, Renderer};
use crate::scene::SceneGraph;

/// Game trait that users implement
pub trait Game {
    /// Called once before the first frame
    fn init(&mut self, ctx: &mut EngineContext);

    /// Called every frame before animations advance
    fn update(&mut self, ctx: &mut EngineContext);

    /// Called after the frame is rendered and its events are readable
    fn on_frame_end(&mut self, _ctx: &mut EngineContext) {}
}

/// Everything a game touches during a frame
pub struct EngineContext {
    pub config: EngineConfig,
    pub clock: Clock,
    pub scene: SceneGraph,
    pub atlases: AtlasStore,
    pub camera: Camera2D,
    pub stats: FrameStats,
    renderer: Renderer,
    should_quit: bool,
}

impl EngineContext {
    fn new(config: EngineConfig) -> Self {
        let renderer = Renderer::from_config(&config);
        let camera = Camera2D::new(config.width, config.height);
        Self {
            config,
            clock: Clock::new(),
            scene: SceneGraph::new(),
            atlases: AtlasStore::new(),
            camera,
            stats: FrameStats::new(),
            renderer,
            should_quit: false,
        }
    }

    /// Current scene time in seconds
    pub fn now(&self) -> f64 {
        self.clock.elapsed()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Copy of the last rendered frame
    ///
    /// # Errors
    ///
    /// Returns an error if the GPU readback fails
    pub fn snapshot(&self) -> Result<RgbaImage, RenderError> {
        self.renderer.snapshot()
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Request the frame loop to stop
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn render(&mut self) -> RenderStats {
        self.renderer
            .render(&self.scene, &mut self.atlases, &self.camera)
    }
}

/// Main engine struct
pub struct Engine<G: Game> {
    game: G,
    context: EngineContext,
    initialized: bool,
}

impl<G: Game> Engine<G> {
    /// Create an engine and its renderer from `config`
    pub fn new(config: EngineConfig, game: G) -> Self {
        init_logging(config.log_filter.as_deref());
        log::info!(
            "Starting engine: {} ({}x{}, {:?})",
            config.title,
            config.width,
            config.height,
            config.backend
        );
        Self {
            game,
            context: EngineContext::new(config),
            initialized: false,
        }
    }

    fn ensure_init(&mut self) {
        if !self.initialized {
            self.game.init(&mut self.context);
            self.initialized = true;
            log::info!("Engine initialized successfully");
        }
    }

    /// Advance one frame by `dt` seconds.
    ///
    /// Order: clock, game update, animations, render, event swap.
    pub fn step(&mut self, dt: f64) -> RenderStats {
        self.ensure_init();
        let ctx = &mut self.context;

        ctx.clock.advance(dt);
        self.game.update(ctx);

        let now = ctx.clock.elapsed();
        ctx.scene.update(now);

        let render = ctx.render();
        ctx.scene.events_mut().swap();

        let delta = Duration::from_secs_f64(ctx.clock.delta());
        ctx.stats.record_frame(delta, render);
        log::trace!("Frame {}: {}", ctx.clock.frame(), render.summary());

        self.game.on_frame_end(ctx);
        render
    }

    /// Run up to `frames` frames of `dt` seconds each, stopping early on quit.
    ///
    /// Returns the number of frames run.
    pub fn run_frames(&mut self, frames: u32, dt: f64) -> u32 {
        let mut ran = 0;
        while ran < frames && !self.context.should_quit() {
            self.step(dt);
            ran += 1;
        }
        log::info!("{}", self.context.stats.format_stats());
        ran
    }

    /// Run `frames` frames at the configured target rate
    pub fn run(&mut self, frames: u32) -> u32 {
        let dt = self.context.config.frame_step();
        self.run_frames(frames, dt)
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.context
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn into_game(self) -> G {
        self.game
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::render::Color;
    use crate::scene::{SceneEvent, Transform2D};

    /// Records the clock time seen by each callback
    #[derive(Default)]
    struct Recorder {
        inits: u32,
        updates: Vec<f64>,
        events_at_end: usize,
        quit_after: Option<usize>,
    }

    impl Game for Recorder {
        fn init(&mut self, ctx: &mut EngineContext) {
            self.inits += 1;
            let root = ctx.scene.root();
            let rect = ctx
                .scene
                .spawn_rect(Vec2::new(2.0, 2.0), Color::WHITE, Transform2D::new());
            ctx.scene.add_child(root, rect).unwrap();
        }

        fn update(&mut self, ctx: &mut EngineContext) {
            self.updates.push(ctx.now());
            if self.quit_after == Some(self.updates.len()) {
                ctx.quit();
            }
        }

        fn on_frame_end(&mut self, ctx: &mut EngineContext) {
            self.events_at_end += ctx.scene.events().len();
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::default().with_size(8, 8)
    }

    #[test]
    fn test_step_order_and_init_once() {
        let mut engine = Engine::new(config(), Recorder::default());
        let stats = engine.step(0.5);
        engine.step(0.5);

        assert_eq!(engine.game().inits, 1);
        // The clock advances before the game update
        assert_eq!(engine.game().updates, vec![0.5, 1.0]);
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(engine.context().stats.total_frames(), 2);
        // ChildAdded from init becomes readable after the first swap
        assert_eq!(engine.game().events_at_end, 1);
        assert!(matches!(
            engine.context().scene.events().iter().next(),
            None | Some(SceneEvent::ChildAdded { .. })
        ));
    }

    #[test]
    fn test_run_frames_stops_on_quit() {
        let game = Recorder {
            quit_after: Some(3),
            ..Default::default()
        };
        let mut engine = Engine::new(config(), game);
        assert_eq!(engine.run_frames(10, 0.1), 3);
        assert!(engine.context().should_quit());
    }

    #[test]
    fn test_snapshot_has_background() {
        let config = config().with_background(Color::rgb(0.0, 0.0, 1.0));
        let mut engine = Engine::new(config, Recorder::default());
        engine.step(0.0);

        let image = engine.context().snapshot().unwrap();
        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(image.get_pixel(7, 7).0, [0, 0, 255, 255]);
        // The rect sits at the camera's top-left corner
        assert_eq!(image.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }
}
