//! Sprite animation
//!
//! - [`Atlas`]: an image sliced into cells, with named sequences
//! - [`Sequence`]: an ordering of cells with a per-cell duration
//! - [`Animation`]: a playback cursor over one sequence
//! - [`AnimationManager`]: the named animations attached to a sprite

mod atlas;
mod manager;
mod player;
mod sequence;

pub use atlas::{Atlas, AtlasError, AtlasKind, Cell, Hitbox, SheetLayout};
pub use manager::AnimationManager;
pub use player::{Animation, PlaybackEvent, PlaybackState};
pub use sequence::{DEFAULT_SPEED, Sequence};
