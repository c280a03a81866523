use crate::emotion::{ClassificationResult, EmotionLabel, ProbabilityDistribution, NUM_LABELS};

/// One unit's verdict: its top label and the score the classifier gave it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vote {
    pub label: EmotionLabel,
    pub confidence: f32,
}

impl Vote {
    pub fn new(label: EmotionLabel, confidence: f32) -> Self {
        Self { label, confidence }
    }

    /// The dominant label of a per-unit distribution.
    pub fn from_distribution(distribution: &ProbabilityDistribution) -> Self {
        let (label, confidence) = distribution.dominant();
        Self { label, confidence }
    }
}

/// Combines per-unit votes into one result.
///
/// Confidences are summed per label. The dominant label has the highest sum,
/// the first label in fixed order winning a tie, and each label's final value
/// is its sum divided by the number of votes. No votes gives the neutral
/// fallback with `unit_count == 0`.
pub fn aggregate(votes: &[Vote]) -> ClassificationResult {
    if votes.is_empty() {
        return ClassificationResult::neutral();
    }

    let mut sums = [0.0f32; NUM_LABELS];
    for vote in votes {
        sums[vote.label.index()] += vote.confidence;
    }

    let unit_count = votes.len();
    let mut distribution = ProbabilityDistribution::zeros();
    for label in EmotionLabel::ALL {
        distribution.set(label, sums[label.index()] / unit_count as f32);
    }

    let (label, _) = ProbabilityDistribution::from_array(sums).dominant();

    ClassificationResult {
        label,
        distribution,
        unit_count,
    }
}

/// Result for a single-unit modality: the raw classifier output unchanged.
pub fn single_unit(distribution: ProbabilityDistribution) -> ClassificationResult {
    ClassificationResult::new(distribution, 1)
}
