//! GPU backend
//!
//! Batched rendering through wgpu with a shader registry and a texture
//! manager that keeps atlas textures within a memory budget.

mod batch;
mod renderer;
mod shader;
mod texture;

pub use batch::{BatchBuilder, DrawBatch, QUAD_VERTICES, SpriteVertex};
pub use renderer::GpuRenderer;
pub use shader::{Bound, ShaderCompiler, ShaderId, ShaderRegistry, ShaderSource};
pub use texture::{GpuTexture, Residency, TextureManager, TextureUploader, WgpuUploader};
