//! A thread-safe multi-modal emotion classifier using ONNX models.
//!
//! Text, audio clips, still images and videos are each mapped to a score for
//! every label in a fixed set of seven emotions. Videos are sampled at a
//! fixed stride and their per-frame verdicts combined into one answer.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use emolens::{EmotionEngine, EngineConfig, Input};
//!
//! let config = EngineConfig::load("emolens.yaml")?;
//! let engine = EmotionEngine::from_config(&config)?;
//!
//! let result = engine.classify(&Input::Text("I am so happy today".into()))?;
//! println!("{} ({:.2})", result.label, result.confidence());
//! # Ok(())
//! # }
//! ```
//!
//! # Never failing
//!
//! Callers that must always answer use
//! [`EmotionEngine::classify_or_fallback`], which returns the neutral result
//! together with the error message when classification fails:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use emolens::{EmotionEngine, EngineConfig, Input, VideoInput};
//!
//! let engine = EmotionEngine::from_config(&EngineConfig::default())?;
//! let bytes = std::fs::read("clip.gif")?;
//! let outcome = engine.classify_or_fallback(&Input::Video(VideoInput::Encoded(bytes)));
//! println!("{}", serde_json::to_string(&outcome)?);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod emotion;
pub mod features;
pub mod media;
pub mod modality;
pub mod model_store;
pub mod pipeline;
mod runtime;

pub use classifier::{ClassifierError, EmotionEngine, EmotionModel, EngineBuilder, EngineInfo, OnnxModel, Outcome};
pub use config::EngineConfig;
pub use emotion::{ClassificationResult, EmotionLabel, ProbabilityDistribution, NUM_LABELS};
pub use features::FeatureTensor;
pub use modality::{Input, Modality, VideoInput};
pub use model_store::{ModelError, ModelStore};
pub use pipeline::{NormalizerConfig, Vote};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};

/// Initialises `env_logger` from `RUST_LOG`. Later calls are ignored.
pub fn init_logger() {
    let _ = env_logger::try_init();
}
