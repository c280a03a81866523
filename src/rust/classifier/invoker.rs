use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use ndarray::{Array2, ArrayD};
use ort::session::Session;
use ort::tensor::{PrimitiveTensorElementType, TensorElementType};
use ort::value::{Tensor, ValueType};

use super::error::ClassifierError;
use crate::emotion::ProbabilityDistribution;
use crate::features::FeatureTensor;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A pretrained classifier mapping one feature tensor to seven scores.
///
/// Implementations must be safe to call from many requests at once.
pub trait EmotionModel: Send + Sync {
    /// Runs the classifier on a single unit.
    ///
    /// # Errors
    /// - `Inference` if the model fails or returns the wrong number of scores
    fn infer(&self, features: &FeatureTensor) -> Result<ProbabilityDistribution, ClassifierError>;

    fn name(&self) -> &str;
}

/// An ONNX graph served through ONNX Runtime.
#[derive(Debug)]
pub struct OnnxModel {
    name: String,
    session: Arc<Session>,
    input_name: String,
    input_type: TensorElementType,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxModel>();
    }
};

impl OnnxModel {
    /// Loads and validates a model file.
    ///
    /// # Errors
    /// - `Model` if the file cannot be loaded or its inputs are unusable
    pub fn load(path: &Path, runtime: &RuntimeConfig) -> Result<Self, ClassifierError> {
        let session = create_session_builder(runtime)?.commit_from_file(path)?;
        let (input_name, input_type) = Self::validate_model(&session)?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!(
            "Loaded model '{}' from {} (input '{}' as {:?})",
            name,
            path.display(),
            input_name,
            input_type
        );

        Ok(Self {
            name,
            session: Arc::new(session),
            input_name,
            input_type,
        })
    }

    /// Checks the graph has a tensor input and at least one output.
    fn validate_model(session: &Session) -> Result<(String, TensorElementType), ClassifierError> {
        let input = session
            .inputs
            .first()
            .ok_or_else(|| ClassifierError::Model("Model must have at least 1 input".to_string()))?;

        if session.outputs.is_empty() {
            return Err(ClassifierError::Model(
                "Model must have at least 1 output for scores".to_string(),
            ));
        }

        match &input.input_type {
            ValueType::Tensor { ty, .. } => Ok((input.name.clone(), *ty)),
            other => Err(ClassifierError::Model(format!(
                "Input '{}' must be a tensor, found {:?}",
                input.name, other
            ))),
        }
    }

    fn run<T>(&self, array: ArrayD<T>) -> Result<Vec<f32>, ClassifierError>
    where
        T: PrimitiveTensorElementType + Debug + Clone + 'static,
    {
        let input = array.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input)
                .map_err(|e| ClassifierError::Inference(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::Inference(format!("Failed to run model: {}", e)))?;
        let scores = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(scores.iter().copied().collect())
    }
}

impl EmotionModel for OnnxModel {
    fn infer(&self, features: &FeatureTensor) -> Result<ProbabilityDistribution, ClassifierError> {
        debug!("Running '{}' on input {:?}", self.name, features.shape());
        let scores = match features {
            FeatureTensor::Tokens(tokens) => match self.input_type {
                TensorElementType::Int64 => self.run(tokens.clone().into_dyn())?,
                TensorElementType::Int32 => self.run(cast_tokens(tokens, |id| id as i32))?,
                TensorElementType::Float32 => self.run(cast_tokens(tokens, |id| id as f32))?,
                other => {
                    return Err(ClassifierError::Inference(format!(
                        "Model '{}' expects {:?} input, token ids cannot be converted",
                        self.name, other
                    )))
                }
            },
            FeatureTensor::Dense(values) => self.run(values.clone())?,
        };
        ProbabilityDistribution::from_scores(&scores)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn cast_tokens<T: Clone>(tokens: &Array2<i64>, f: impl Fn(i64) -> T) -> ArrayD<T> {
    tokens.mapv(f).into_dyn()
}
