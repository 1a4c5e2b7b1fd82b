//! Rendering module
//!
//! Two backends draw the same scene graph: an immediate-mode canvas and a
//! batched wgpu renderer. [`Renderer`] picks one from the engine config.

mod camera;
pub mod canvas;
mod color;
mod error;
pub mod gpu;
mod stats;
mod traverse;

pub use camera::{Camera2D, affine_to_mat4};
pub use canvas::{Canvas, CanvasRenderer, ImageCanvas};
pub use color::Color;
pub use error::RenderError;
pub use gpu::GpuRenderer;
pub use stats::RenderStats;
pub use traverse::{Painter, traverse};

use image::RgbaImage;

use crate::assets::AtlasStore;
use crate::core::{Backend, EngineConfig};
use crate::scene::SceneGraph;

/// The active renderer backend
pub enum Renderer {
    Canvas(CanvasRenderer<ImageCanvas>),
    Gpu(Box<GpuRenderer>),
}

impl Renderer {
    /// Software renderer drawing into an in-memory image
    #[must_use]
    pub fn canvas(width: u32, height: u32, background: Color) -> Self {
        Self::Canvas(CanvasRenderer::new(ImageCanvas::new(width, height), background))
    }

    /// GPU renderer with an offscreen target
    ///
    /// # Errors
    ///
    /// Returns an error if no adapter or device is available
    pub fn gpu(
        width: u32,
        height: u32,
        background: Color,
        max_texture_mem: u64,
    ) -> Result<Self, RenderError> {
        GpuRenderer::new(width, height, background, max_texture_mem)
            .map(|gpu| Self::Gpu(Box::new(gpu)))
    }

    /// Create the backend named by `config`.
    ///
    /// A GPU request falls back to the canvas when no device is available.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        match config.backend {
            Backend::Canvas => Self::canvas(config.width, config.height, config.background),
            Backend::Gpu => match Self::gpu(
                config.width,
                config.height,
                config.background,
                config.max_texture_mem,
            ) {
                Ok(renderer) => renderer,
                Err(e) => {
                    log::warn!("GPU renderer unavailable ({e}); falling back to canvas");
                    Self::canvas(config.width, config.height, config.background)
                }
            },
        }
    }

    /// Draw one frame
    pub fn render(
        &mut self,
        graph: &SceneGraph,
        atlases: &mut AtlasStore,
        camera: &Camera2D,
    ) -> RenderStats {
        match self {
            Self::Canvas(canvas) => canvas.render(graph, atlases, camera),
            Self::Gpu(gpu) => gpu.render(graph, atlases, camera),
        }
    }

    /// Copy of the last rendered frame
    ///
    /// # Errors
    ///
    /// Returns an error if the GPU readback fails
    pub fn snapshot(&self) -> Result<RgbaImage, RenderError> {
        match self {
            Self::Canvas(canvas) => Ok(canvas.canvas().image().clone()),
            Self::Gpu(gpu) => gpu.read_pixels(),
        }
    }

    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            Self::Canvas(_) => Backend::Canvas,
            Self::Gpu(_) => Backend::Gpu,
        }
    }

    #[must_use]
    pub fn background(&self) -> Color {
        match self {
            Self::Canvas(canvas) => canvas.background(),
            Self::Gpu(gpu) => gpu.background(),
        }
    }

    pub fn set_background(&mut self, color: Color) {
        match self {
            Self::Canvas(canvas) => canvas.set_background(color),
            Self::Gpu(gpu) => gpu.set_background(color),
        }
    }
}
