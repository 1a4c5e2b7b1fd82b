//! Asset storage
//!
//! Atlases are stored once and referenced by [`AtlasId`] from sprites and
//! renderers.

mod storage;

pub use storage::{AtlasId, AtlasStore};
