//! Named cell orderings

use serde::{Deserialize, Serialize};

/// Default per-cell duration in seconds
pub const DEFAULT_SPEED: f64 = 0.1;

/// A named ordering of atlas cells played back by an [`Animation`](super::Animation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Sequence name, unique within its atlas
    pub name: String,
    /// Atlas cell indices in playback order
    pub cells: Vec<usize>,
    /// Initial per-cell duration in clock units (seconds)
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Whether playback wraps at the end
    #[serde(rename = "loop", default)]
    pub looping: bool,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

impl Sequence {
    /// Create a new sequence
    #[must_use]
    pub fn new(name: impl Into<String>, cells: Vec<usize>, speed: f64, looping: bool) -> Self {
        Self {
            name: name.into(),
            cells,
            speed,
            looping,
        }
    }

    /// A sequence covering cells `0..count` in order
    #[must_use]
    pub fn range(name: impl Into<String>, count: usize, speed: f64, looping: bool) -> Self {
        Self::new(name, (0..count).collect(), speed, looping)
    }

    /// Number of positions in the sequence
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell index at a playback position
    #[must_use]
    pub fn cell_at(&self, position: usize) -> Option<usize> {
        self.cells.get(position).copied()
    }
}
