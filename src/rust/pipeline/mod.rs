//! Combining per-unit classifier outputs into the final answer.

pub mod aggregate;
pub mod normalize;
pub mod sampler;

pub use aggregate::{aggregate, single_unit, Vote};
pub use normalize::{Normalizer, NormalizerConfig};
pub use sampler::{sample_indices, stride, FrameSample, TemporalSampler};
