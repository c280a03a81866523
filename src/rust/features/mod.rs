//! Per-modality feature extraction.
//!
//! Each extractor turns a raw payload into the fixed-shape tensor its
//! classifier expects. Nothing is persisted between calls.

use ndarray::{Array2, ArrayD};

pub mod audio;
pub mod image;
pub mod text;
pub mod video;

pub use audio::MfccExtractor;
pub use self::image::{decode_image, decode_image_file, ImageExtractor};
pub use text::{clean_text, TextEncoder, Vocabulary};
pub use video::{open_video, open_video_file, EncodedFrames, FrameSource, GifFrames};

/// Model input produced by a feature extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureTensor {
    /// Token ids `[1, sequence_length]`.
    Tokens(Array2<i64>),
    /// Dense float features: `[1, n_mfcc]` for audio, `[1, h, w, 3]` for images.
    Dense(ArrayD<f32>),
}

impl FeatureTensor {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Tokens(array) => array.shape(),
            Self::Dense(array) => array.shape(),
        }
    }
}
