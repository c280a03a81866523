//! Engine configuration.
//!
//! Every field has a default, so an empty YAML document is a valid config.
//! Artifact paths are resolved against `models_dir` unless they are absolute.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;
use crate::pipeline::NormalizerConfig;
use crate::runtime::RuntimeConfig;

/// Environment variable overriding the default models directory.
pub const MODELS_DIR_ENV: &str = "EMOLENS_MODELS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub model: PathBuf,
    /// Word-level `tokenizer.json` fitted at training time.
    pub vocabulary: PathBuf,
    pub sequence_length: usize,
    /// Ids at or above this bound are replaced by the OOV id.
    pub num_words: usize,
    pub oov_token: Option<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("text_model.onnx"),
            vocabulary: PathBuf::from("tokenizer.json"),
            sequence_length: 100,
            num_words: 5000,
            oov_token: Some("<OOV>".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub model: PathBuf,
    pub n_mfcc: usize,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("audio_model.onnx"),
            n_mfcc: 40,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
        }
    }
}

/// Image settings. Video frames go through the same transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub model: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Emit `[1, 3, h, w]` instead of `[1, h, w, 3]`.
    pub channels_first: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("image_model.onnx"),
            width: 48,
            height: 48,
            channels_first: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub model: PathBuf,
    /// Divisor used to derive the sampling stride from the frame count.
    pub target_samples: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("video_model.onnx"),
            target_samples: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding model artifacts. Falls back to [`default_models_dir`].
    pub models_dir: Option<PathBuf>,
    /// Directory for staged uploads. Falls back to the system temp dir.
    pub upload_dir: Option<PathBuf>,
    pub text: TextConfig,
    pub audio: AudioConfig,
    pub image: ImageConfig,
    pub video: VideoConfig,
    pub normalizer: NormalizerConfig,
    pub runtime: RuntimeConfig,
    /// Expected sha256 digests keyed by artifact path as written above.
    pub checksums: HashMap<String, String>,
}

impl EngineConfig {
    /// Reads a YAML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            ClassifierError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ClassifierError> {
        let config: Self = serde_yaml::from_str(raw)
            .map_err(|e| ClassifierError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.text.sequence_length == 0 {
            return Err(ClassifierError::Config("text.sequence_length must be positive".into()));
        }
        if self.text.num_words == 0 {
            return Err(ClassifierError::Config("text.num_words must be positive".into()));
        }
        if self.audio.n_fft == 0 || self.audio.hop_length == 0 {
            return Err(ClassifierError::Config("audio.n_fft and audio.hop_length must be positive".into()));
        }
        if self.audio.n_mfcc == 0 || self.audio.n_mfcc > self.audio.n_mels {
            return Err(ClassifierError::Config(format!(
                "audio.n_mfcc must be between 1 and n_mels ({})",
                self.audio.n_mels
            )));
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(ClassifierError::Config("image.width and image.height must be positive".into()));
        }
        if self.video.target_samples == 0 {
            return Err(ClassifierError::Config("video.target_samples must be positive".into()));
        }
        Ok(())
    }

    pub fn models_dir(&self) -> PathBuf {
        self.models_dir.clone().unwrap_or_else(default_models_dir)
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

/// Returns the default models directory path
pub fn default_models_dir() -> PathBuf {
    // 1. Check environment variable
    if let Ok(path) = env::var(MODELS_DIR_ENV) {
        return PathBuf::from(path);
    }

    // 2. Use platform-specific data directory
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("emolens").join("models");
    }

    // 3. Fallback to user's home directory
    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".local").join("share").join("emolens").join("models");
    }

    env::temp_dir().join("emolens").join("models")
}
