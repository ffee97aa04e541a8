//! Request lifecycle: phases, the engine that drives them, and painting.

pub mod config;
pub mod engine;
pub mod paint;
pub mod phase;

pub use config::{ActionErrorPolicy, EngineConfig};
pub use engine::{Engine, RequestOutcome, Visit};
pub use paint::{PaintFrame, PaintNode, Renderer};
pub use phase::{Phase, PhaseTracker};
