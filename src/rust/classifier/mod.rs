mod error;
mod invoker;
mod engine;
pub mod builder;

pub use error::ClassifierError;
pub use invoker::{EmotionModel, OnnxModel};
pub use engine::{EmotionEngine, EngineInfo, Outcome};
pub use builder::EngineBuilder;
