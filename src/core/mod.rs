//! Core engine module
//!
//! Configuration, logging, the frame clock and the headless engine loop.

mod clock;
mod config;
mod debug;
mod engine;
mod logging;

pub use clock::Clock;
pub use config::{Backend, ConfigError, EngineConfig};
pub use debug::FrameStats;
pub use engine::{Engine, EngineContext, Game};
pub use logging::init_logging;
