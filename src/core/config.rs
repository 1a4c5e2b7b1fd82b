//! Engine configuration
//!
//! Configuration can be built in code or loaded from RON/JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render::Color;

/// Which renderer backend draws the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Software canvas, depth-first painting
    #[default]
    Canvas,
    /// Batched GPU rendering through wgpu
    Gpu,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Title used in logs and snapshots
    pub title: String,
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
    /// Colour the surface is cleared to each frame
    pub background: Color,
    /// Renderer backend
    pub backend: Backend,
    /// GPU texture memory ceiling in bytes
    pub max_texture_mem: u64,
    /// Target frames per second (used as the fixed step in headless runs)
    pub target_fps: u32,
    /// Log filter in `env_logger` syntax; `RUST_LOG` takes precedence
    pub log_filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: String::from("scene2d"),
            width: 800,
            height: 600,
            background: Color::BLACK,
            backend: Backend::Canvas,
            max_texture_mem: 64 * 1024 * 1024,
            target_fps: 60,
            log_filter: None,
        }
    }
}

impl EngineConfig {
    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set surface dimensions
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the background colour
    #[must_use]
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Select the renderer backend
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the GPU texture memory ceiling
    #[must_use]
    pub fn with_max_texture_mem(mut self, bytes: u64) -> Self {
        self.max_texture_mem = bytes;
        self
    }

    /// Set target FPS
    #[must_use]
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Fixed frame step derived from `target_fps`, in seconds
    #[must_use]
    pub fn frame_step(&self) -> f64 {
        1.0 / f64::from(self.target_fps.max(1))
    }

    /// Parse a RON document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid RON for this type
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        ron::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse a JSON document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this type
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Serialize to pretty RON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

/// Errors that can occur while loading configuration
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Serialize(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
