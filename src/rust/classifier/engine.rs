use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::builder::EngineBuilder;
use super::error::ClassifierError;
use super::invoker::EmotionModel;
use crate::config::EngineConfig;
use crate::emotion::ClassificationResult;
use crate::features::{open_video, open_video_file, FrameSource, ImageExtractor, MfccExtractor, TextEncoder};
use crate::media::StagedMedia;
use crate::modality::{Input, Modality};
use crate::model_store::ModelStore;
use crate::pipeline::{aggregate, single_unit, NormalizerConfig, Normalizer, TemporalSampler, Vote};

/// A thread-safe multi-modal emotion classifier.
///
/// Holds the four loaded models, the text vocabulary and every extractor
/// setting. It is read-only after construction, so one engine can be
/// shared across threads with `Arc`:
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use emolens::{EmotionEngine, EngineConfig, Input};
/// use std::sync::Arc;
/// use std::thread;
///
/// let engine = Arc::new(EmotionEngine::from_config(&EngineConfig::default())?);
///
/// let engine_clone = Arc::clone(&engine);
/// thread::spawn(move || {
///     let result = engine_clone.classify(&Input::Text("what a day".into())).unwrap();
///     println!("{}", result.label);
/// });
/// # Ok(())
/// # }
/// ```
pub struct EmotionEngine {
    pub(super) text_model: Arc<dyn EmotionModel>,
    pub(super) audio_model: Arc<dyn EmotionModel>,
    pub(super) image_model: Arc<dyn EmotionModel>,
    pub(super) video_model: Arc<dyn EmotionModel>,
    pub(super) text: TextEncoder,
    pub(super) audio: MfccExtractor,
    pub(super) image: ImageExtractor,
    pub(super) target_samples: usize,
    pub(super) normalizer: Normalizer,
    pub(super) upload_dir: PathBuf,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<EmotionEngine>();
    }
};

impl fmt::Debug for EmotionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmotionEngine")
            .field("text_model", &self.text_model.name())
            .field("audio_model", &self.audio_model.name())
            .field("image_model", &self.image_model.name())
            .field("video_model", &self.video_model.name())
            .field("sequence_length", &self.text.sequence_length())
            .field("target_samples", &self.target_samples)
            .finish()
    }
}

/// Static description of a loaded engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineInfo {
    pub models: BTreeMap<String, String>,
    pub vocabulary_size: usize,
    pub sequence_length: usize,
    pub n_mfcc: usize,
    pub image_size: (u32, u32),
    pub target_samples: usize,
    pub normalizer: NormalizerConfig,
}

/// A classification answer that is always present.
///
/// On failure the result is the neutral fallback and `error` carries the
/// reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    #[serde(flatten)]
    pub result: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn success(result: ClassificationResult) -> Self {
        Self { result, error: None }
    }

    pub fn failure(error: &ClassifierError) -> Self {
        Self {
            result: ClassificationResult::neutral(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl From<Result<ClassificationResult, ClassifierError>> for Outcome {
    fn from(result: Result<ClassificationResult, ClassifierError>) -> Self {
        match result {
            Ok(result) => Self::success(result),
            Err(e) => Self::failure(&e),
        }
    }
}

impl EmotionEngine {
    /// Creates a new EngineBuilder for fluent construction
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Loads every model and the vocabulary named by `config`.
    ///
    /// Artifacts are resolved against the configured models directory and
    /// checked against any registered digests before they are loaded.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ClassifierError> {
        let store = ModelStore::from_config(config);
        info!("Loading models from {:?}", store.models_dir());

        let mut builder = EngineBuilder::new().with_config(config.clone());
        for modality in Modality::ALL {
            let (path, _) = store.ensure_artifact(ModelStore::model_artifact(config, modality))?;
            builder = builder.with_onnx_model(modality, &path)?;
        }
        let (vocabulary, _) = store.ensure_artifact(&config.text.vocabulary)?;
        builder.with_vocabulary_file(&vocabulary)?.build()
    }

    pub fn info(&self) -> EngineInfo {
        let models = Modality::ALL
            .into_iter()
            .map(|m| (m.to_string(), self.model(m).name().to_string()))
            .collect();
        EngineInfo {
            models,
            vocabulary_size: self.text.vocabulary().size(),
            sequence_length: self.text.sequence_length(),
            n_mfcc: self.audio.n_mfcc(),
            image_size: self.image.input_size(),
            target_samples: self.target_samples,
            normalizer: *self.normalizer.config(),
        }
    }

    fn model(&self, modality: Modality) -> &Arc<dyn EmotionModel> {
        match modality {
            Modality::Text => &self.text_model,
            Modality::Audio => &self.audio_model,
            Modality::Image => &self.image_model,
            Modality::Video => &self.video_model,
        }
    }

    /// Classifies one input.
    pub fn classify(&self, input: &Input) -> Result<ClassificationResult, ClassifierError> {
        self.classify_cancellable(input, &CancellationToken::new())
    }

    /// Classifies one input, giving up with `Cancelled` once `cancel` fires.
    ///
    /// Video stops at the next sampled frame; single-unit modalities only
    /// check the token before starting.
    pub fn classify_cancellable(
        &self,
        input: &Input,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult, ClassifierError> {
        if cancel.is_cancelled() {
            return Err(ClassifierError::Cancelled);
        }

        let started = Instant::now();
        let raw = match input {
            Input::Text(text) => self.classify_text(text)?,
            Input::Audio { bytes, extension } => {
                let features = self.audio.extract(bytes, extension.as_deref())?;
                single_unit(self.audio_model.infer(&features)?)
            }
            Input::Image(bytes) => single_unit(self.image_model.infer(&self.image.extract(bytes)?)?),
            Input::Video(video) => self.classify_frames(open_video(video, cancel)?.as_mut(), cancel)?,
        };
        Ok(self.finish(raw, input.modality(), started))
    }

    fn classify_text(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        Ok(single_unit(self.text_model.infer(&self.text.encode(text)?)?))
    }

    fn finish(&self, raw: ClassificationResult, modality: Modality, started: Instant) -> ClassificationResult {
        let result = self.normalizer.normalize(raw, modality);
        info!(
            "{} classified as {} ({:.3}) from {} unit(s) in {:.2?}",
            modality,
            result.label,
            result.confidence(),
            result.unit_count,
            started.elapsed()
        );
        result
    }

    fn classify_frames(
        &self,
        source: &mut dyn FrameSource,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult, ClassifierError> {
        let mut sampler = TemporalSampler::new(source, self.target_samples, cancel);

        let mut votes = Vec::new();
        for sample in sampler.by_ref() {
            let sample = sample?;
            let features = self.image.extract_pixels(&sample.pixels);
            let vote = Vote::from_distribution(&self.video_model.infer(&features)?);
            debug!("Frame {}: {} ({:.3})", sample.index, vote.label, vote.confidence);
            votes.push(vote);
        }

        if votes.is_empty() {
            warn!(
                "No frame could be classified ({} undecodable), returning neutral",
                sampler.skipped()
            );
        }
        Ok(aggregate(&votes))
    }

    /// Like [`classify`](Self::classify) but never fails.
    pub fn classify_or_fallback(&self, input: &Input) -> Outcome {
        let outcome = Outcome::from(self.classify(input));
        if let Some(error) = &outcome.error {
            warn!("{} classification failed, returning neutral: {}", input.modality(), error);
        }
        outcome
    }

    /// Runs the blocking pipeline off the async executor.
    ///
    /// When `deadline` passes first the request is cancelled and `Timeout` is
    /// returned. Dropping the returned future cancels the request too.
    pub async fn classify_with_deadline(
        self: Arc<Self>,
        input: Input,
        deadline: Option<Duration>,
    ) -> Result<ClassificationResult, ClassifierError> {
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let task = tokio::task::spawn_blocking(move || self.classify_cancellable(&input, &cancel));
        let joined = match deadline {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Classification exceeded its {:?} deadline", limit);
                    return Err(ClassifierError::Timeout(limit));
                }
            },
            None => task.await,
        };
        guard.disarm();

        joined.map_err(|e| ClassifierError::Inference(format!("Classification task failed: {}", e)))?
    }

    /// Stages a streamed upload in the upload directory, then classifies it.
    ///
    /// Audio, image and video decoders read the staged file directly. The
    /// file is removed before this returns.
    pub fn classify_staged<R: Read>(
        &self,
        modality: Modality,
        mut reader: R,
        extension: Option<&str>,
    ) -> Result<ClassificationResult, ClassifierError> {
        let staged = StagedMedia::stage(&self.upload_dir, &mut reader, extension)?;
        let path = staged.path();
        let started = Instant::now();

        let raw = match modality {
            Modality::Text => {
                let text = String::from_utf8(fs::read(path)?).map_err(|_| {
                    ClassifierError::InvalidInput("Text payload is not valid UTF-8".into())
                })?;
                self.classify_text(&text)?
            }
            Modality::Audio => single_unit(self.audio_model.infer(&self.audio.extract_file(path, extension)?)?),
            Modality::Image => single_unit(self.image_model.infer(&self.image.extract_file(path)?)?),
            Modality::Video => {
                let cancel = CancellationToken::new();
                self.classify_frames(open_video_file(path, &cancel)?.as_mut(), &cancel)?
            }
        };
        Ok(self.finish(raw, modality, started))
    }
}
