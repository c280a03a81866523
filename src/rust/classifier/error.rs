use std::io;
use std::time::Duration;

use ort::Error as OrtError;

use crate::model_store::ModelError;

/// Represents the different types of errors that can occur while classifying.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Malformed or empty input, such as blank text
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Media could not be decoded as the expected modality
    #[error("Decode error: {0}")]
    Decode(String),
    /// The underlying model invocation failed
    #[error("Inference error: {0}")]
    Inference(String),
    /// The caller's deadline passed before a result was produced
    #[error("Classification timed out after {0:?}")]
    Timeout(Duration),
    /// The caller abandoned the request
    #[error("Classification cancelled")]
    Cancelled,
    /// Error occurred while loading or using the vocabulary
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    /// Error occurred while loading a model artifact
    #[error("Model error: {0}")]
    Model(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    Build(String),
    /// The configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClassifierError {
    /// True for failures caused by the request itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Decode(_))
    }
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::Model(err.to_string())
    }
}

impl From<ModelError> for ClassifierError {
    fn from(err: ModelError) -> Self {
        ClassifierError::Model(err.to_string())
    }
}
