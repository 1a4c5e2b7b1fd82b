//! Scene graph
//!
//! - [`SceneGraph`]: the node arena, its root group and structural operations
//! - [`Transform2D`]: local transforms with cached local and world matrices
//! - [`NodeKind`]: groups, sprites and solid rectangles
//! - [`EventQueue`]: double-buffered scene notifications

mod events;
mod graph;
mod hierarchy;
mod node;
mod transform;

pub use events::{EventQueue, SceneEvent};
pub use graph::{SceneError, SceneGraph};
pub use hierarchy::{Children, Parent};
pub use node::{ColorRect, Name, Node, NodeKind, Sprite};
pub use transform::{GlobalTransform2D, Transform2D};
