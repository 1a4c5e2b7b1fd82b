//! Render errors

use super::gpu::ShaderId;

/// Errors that can occur while setting up or driving a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// No GPU adapter is available
    NoAdapter,
    /// The adapter refused to create a device
    Device(String),
    /// A shader failed to compile or link into a pipeline
    ShaderCompile { shader: ShaderId, message: String },
    /// No source was registered under the id
    UnknownShader(ShaderId),
    /// Reading the frame back failed
    Readback(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAdapter => write!(f, "No suitable GPU adapter found"),
            Self::Device(e) => write!(f, "Failed to create device: {e}"),
            Self::ShaderCompile { shader, message } => {
                write!(f, "Shader {shader:?} failed to compile: {message}")
            }
            Self::UnknownShader(id) => write!(f, "Unknown shader {id:?}"),
            Self::Readback(e) => write!(f, "Frame readback failed: {e}"),
        }
    }
}

impl std::error::Error for RenderError {}
