mod engine;
mod model;

pub use engine::{EngineError, WhisperEngine};
pub use model::{ModelError, WhisperModel};
