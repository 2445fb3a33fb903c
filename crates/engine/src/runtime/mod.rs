//! Engine runtime: the TAO loop and its collaborators.

pub mod engine;
pub mod hooks;
pub mod interaction;
pub mod janitor;
pub mod lifecycle;
pub mod signals;

pub use engine::{Engine, EngineConfig, EngineOutcome};
