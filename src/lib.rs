//! A 2D scene-graph renderer built in Rust
//!
//! This crate provides:
//! - A retained scene graph of groups, sprites and rectangles with cached transforms
//! - Sprite atlases, sequences and time-driven animation playback
//! - An immediate-mode canvas renderer
//! - A batched wgpu renderer with a shader registry and texture memory budget
//! - A headless engine loop driving all of the above

pub mod animation;
pub mod assets;
pub mod core;
pub mod render;
pub mod scene;

// Re-exports for convenience
pub use glam;
pub use hecs;
pub use image;
pub use wgpu;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::animation::{
        Animation, AnimationManager, Atlas, Cell, PlaybackEvent, PlaybackState, Sequence,
        SheetLayout,
    };
    pub use crate::assets::{AtlasId, AtlasStore};
    pub use crate::core::{Backend, Clock, Engine, EngineConfig, EngineContext, FrameStats, Game};
    pub use crate::render::{Camera2D, Color, RenderStats, Renderer};
    pub use crate::scene::{NodeKind, SceneEvent, SceneGraph, Transform2D};
    pub use glam::{Affine2, Vec2};
    pub use hecs::Entity;
}
