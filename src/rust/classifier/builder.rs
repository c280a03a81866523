use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};

use super::engine::EmotionEngine;
use super::error::ClassifierError;
use super::invoker::{EmotionModel, OnnxModel};
use crate::config::EngineConfig;
use crate::features::{ImageExtractor, MfccExtractor, TextEncoder, Vocabulary};
use crate::modality::Modality;
use crate::pipeline::Normalizer;

/// A builder for constructing an [`EmotionEngine`] with a fluent interface.
///
/// Set the configuration first: ONNX sessions and the vocabulary are created
/// with the settings in effect when they are added.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    models: HashMap<Modality, Arc<dyn EmotionModel>>,
    vocabulary: Option<Vocabulary>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets extractor, sampler, normalizer and runtime settings.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `model` for every input of `modality`, replacing any earlier one.
    ///
    /// # Example
    /// ```
    /// use emolens::{EmotionModel, EngineBuilder, FeatureTensor, Modality, ProbabilityDistribution};
    /// use emolens::{ClassifierError, EmotionLabel};
    /// use std::sync::Arc;
    ///
    /// struct AlwaysHappy;
    ///
    /// impl EmotionModel for AlwaysHappy {
    ///     fn infer(&self, _: &FeatureTensor) -> Result<ProbabilityDistribution, ClassifierError> {
    ///         Ok(ProbabilityDistribution::certain(EmotionLabel::Happy))
    ///     }
    ///
    ///     fn name(&self) -> &str {
    ///         "always-happy"
    ///     }
    /// }
    ///
    /// let builder = EngineBuilder::new().with_model(Modality::Image, Arc::new(AlwaysHappy));
    /// ```
    pub fn with_model(mut self, modality: Modality, model: Arc<dyn EmotionModel>) -> Self {
        self.models.insert(modality, model);
        self
    }

    /// Loads an ONNX model file for `modality`.
    ///
    /// # Errors
    /// - `Build` if the file does not exist
    /// - `Model` if ONNX Runtime rejects the file
    pub fn with_onnx_model(self, modality: Modality, path: &Path) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::Build(format!(
                "Model file not found: {}",
                path.display()
            )));
        }
        let model = OnnxModel::load(path, &self.config.runtime).map_err(|e| {
            error!("Failed to load {} model: {}", modality, e);
            e
        })?;
        Ok(self.with_model(modality, Arc::new(model)))
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Loads the text vocabulary using the configured `num_words` and OOV token.
    pub fn with_vocabulary_file(self, path: &Path) -> Result<Self, ClassifierError> {
        let text = &self.config.text;
        let vocabulary = Vocabulary::from_file(path, text.num_words, text.oov_token.as_deref())?;
        Ok(self.with_vocabulary(vocabulary))
    }

    /// Builds and returns the final engine.
    ///
    /// # Errors
    /// - `Config` if the configuration is invalid
    /// - `Build` if any modality has no model or no vocabulary was set
    pub fn build(mut self) -> Result<EmotionEngine, ClassifierError> {
        self.config.validate()?;

        let mut take = |modality: Modality| {
            self.models.remove(&modality).ok_or_else(|| {
                ClassifierError::Build(format!("No model set for {} input", modality))
            })
        };
        let text_model = take(Modality::Text)?;
        let audio_model = take(Modality::Audio)?;
        let image_model = take(Modality::Image)?;
        let video_model = take(Modality::Video)?;

        let vocabulary = self
            .vocabulary
            .take()
            .ok_or_else(|| ClassifierError::Build("No vocabulary loaded".into()))?;

        let config = self.config;
        info!(
            "Engine ready: {} words, {} MFCCs, {}x{} images, video target {}",
            vocabulary.size(),
            config.audio.n_mfcc,
            config.image.width,
            config.image.height,
            config.video.target_samples
        );

        Ok(EmotionEngine {
            text_model,
            audio_model,
            image_model,
            video_model,
            text: TextEncoder::new(vocabulary, config.text.sequence_length),
            audio: MfccExtractor::new(&config.audio),
            image: ImageExtractor::new(&config.image),
            target_samples: config.video.target_samples,
            normalizer: Normalizer::new(config.normalizer),
            upload_dir: config.upload_dir(),
        })
    }
}
