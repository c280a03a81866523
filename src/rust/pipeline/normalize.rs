use log::debug;
use serde::{Deserialize, Serialize};

use crate::emotion::{ClassificationResult, EmotionLabel};
use crate::modality::Modality;

/// Settings for the final output pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Text results whose dominant score is below this get a neutral floor.
    pub low_confidence_threshold: f32,
    /// Value written to `neutral` for low-confidence text results.
    pub neutral_floor: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.7,
            neutral_floor: 0.3,
        }
    }
}

/// Puts every result into the shape callers receive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Sanitises scores and applies the text low-confidence rule.
    ///
    /// The label is re-derived from the sanitised scores, then the text floor
    /// is applied on top of it. The floor never changes the label and the
    /// distribution is not renormalised afterwards.
    pub fn normalize(&self, result: ClassificationResult, modality: Modality) -> ClassificationResult {
        let mut normalized = ClassificationResult::new(result.distribution.map(sanitize), result.unit_count);

        if modality == Modality::Text {
            let confidence = normalized.confidence();
            if confidence < self.config.low_confidence_threshold {
                debug!(
                    "Low confidence text result ({} at {:.3}), flooring neutral at {}",
                    normalized.label, confidence, self.config.neutral_floor
                );
                normalized
                    .distribution
                    .set(EmotionLabel::Neutral, sanitize(self.config.neutral_floor));
            }
        }

        normalized
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
