//! The fixed emotion label set and the value types built on it.
//!
//! Every distribution in the crate is defined over exactly [`EmotionLabel::ALL`],
//! in that order. The order is significant: it is the order classifier outputs
//! are laid out in and the order ties are broken in.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::classifier::ClassifierError;

/// Number of labels in the fixed set.
pub const NUM_LABELS: usize = 7;

/// One of the seven supported emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl EmotionLabel {
    /// All labels in model output order.
    pub const ALL: [EmotionLabel; NUM_LABELS] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Fear,
        EmotionLabel::Surprise,
        EmotionLabel::Disgust,
        EmotionLabel::Neutral,
    ];

    /// Position of this label in [`EmotionLabel::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Fear => "fear",
            Self::Surprise => "surprise",
            Self::Disgust => "disgust",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| ClassifierError::InvalidInput(format!("Unknown emotion label: {}", s)))
    }
}

/// Scores for every label in the fixed set.
///
/// Values are not required to sum to one. Raw classifier outputs are kept as
/// they are, and the text low-confidence rule deliberately breaks the sum.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbabilityDistribution {
    scores: [f32; NUM_LABELS],
}

impl ProbabilityDistribution {
    pub fn zeros() -> Self {
        Self::default()
    }

    /// All mass on a single label.
    pub fn certain(label: EmotionLabel) -> Self {
        let mut dist = Self::zeros();
        dist.set(label, 1.0);
        dist
    }

    pub fn from_array(scores: [f32; NUM_LABELS]) -> Self {
        Self { scores }
    }

    /// Builds a distribution from a raw score vector laid out in label order.
    ///
    /// # Errors
    /// - `Inference` if the vector does not hold exactly one score per label
    pub fn from_scores(scores: &[f32]) -> Result<Self, ClassifierError> {
        let scores: [f32; NUM_LABELS] = scores.try_into().map_err(|_| {
            ClassifierError::Inference(format!(
                "Expected {} scores, model produced {}",
                NUM_LABELS,
                scores.len()
            ))
        })?;
        Ok(Self::from_array(scores))
    }

    pub fn get(&self, label: EmotionLabel) -> f32 {
        self.scores[label.index()]
    }

    pub fn set(&mut self, label: EmotionLabel, value: f32) {
        self.scores[label.index()] = value;
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.scores
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionLabel, f32)> + '_ {
        EmotionLabel::ALL.into_iter().zip(self.scores.iter().copied())
    }

    /// Applies `f` to every score.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self { scores: self.scores.map(f) }
    }

    pub fn sum(&self) -> f32 {
        self.scores.iter().sum()
    }

    /// The label with the highest score together with that score.
    ///
    /// The first label in fixed order wins a tie. NaN scores never win; an
    /// all-NaN distribution reports `happy` with its NaN score.
    pub fn dominant(&self) -> (EmotionLabel, f32) {
        let mut best = 0;
        for (i, &score) in self.scores.iter().enumerate().skip(1) {
            let current = self.scores[best];
            if score > current || (current.is_nan() && !score.is_nan()) {
                best = i;
            }
        }
        (EmotionLabel::ALL[best], self.scores[best])
    }
}

impl Serialize for ProbabilityDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(NUM_LABELS))?;
        for (label, score) in self.iter() {
            map.serialize_entry(label.as_str(), &score)?;
        }
        map.end()
    }
}

/// The outcome of classifying one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: EmotionLabel,
    #[serde(rename = "probabilities")]
    pub distribution: ProbabilityDistribution,
    /// How many elementary classifications contributed.
    pub unit_count: usize,
}

impl ClassificationResult {
    /// Creates a result whose label is the arg-max of `distribution`.
    pub fn new(distribution: ProbabilityDistribution, unit_count: usize) -> Self {
        let (label, _) = distribution.dominant();
        Self {
            label,
            distribution,
            unit_count,
        }
    }

    /// The "nothing detected" answer: certain neutral, zero units.
    pub fn neutral() -> Self {
        Self {
            label: EmotionLabel::Neutral,
            distribution: ProbabilityDistribution::certain(EmotionLabel::Neutral),
            unit_count: 0,
        }
    }

    /// Score of the dominant label.
    pub fn confidence(&self) -> f32 {
        self.distribution.get(self.label)
    }
}
