use image::RgbImage;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::classifier::ClassifierError;
use crate::features::FrameSource;

/// Step between sampled frame indices: `max(1, total / target)`.
pub fn stride(total: usize, target: usize) -> usize {
    (total / target.max(1)).max(1)
}

/// Indices sampled from a video of `total` frames, starting at frame 0.
pub fn sample_indices(total: usize, target: usize) -> impl Iterator<Item = usize> {
    (0..total).step_by(stride(total, target))
}

/// One decoded frame.
#[derive(Debug)]
pub struct FrameSample {
    pub index: usize,
    pub pixels: RgbImage,
}

/// Walks a frame source at a fixed stride.
///
/// Undecodable frames are skipped. The cancellation token is checked before
/// every sampled position, so an abandoned request stops at the next frame.
pub struct TemporalSampler<'a> {
    source: &'a mut dyn FrameSource,
    indices: std::iter::StepBy<std::ops::Range<usize>>,
    cancel: &'a CancellationToken,
    skipped: usize,
}

impl<'a> TemporalSampler<'a> {
    pub fn new(source: &'a mut dyn FrameSource, target: usize, cancel: &'a CancellationToken) -> Self {
        let total = source.frame_count();
        debug!(
            "Sampling {} frames with stride {}",
            total,
            stride(total, target)
        );
        Self {
            indices: (0..total).step_by(stride(total, target)),
            source,
            cancel,
            skipped: 0,
        }
    }

    /// Number of sampled positions whose frame failed to decode so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for TemporalSampler<'_> {
    type Item = Result<FrameSample, ClassifierError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let index = self.indices.next()?;
            if self.cancel.is_cancelled() {
                return Some(Err(ClassifierError::Cancelled));
            }
            match self.source.decode_frame(index) {
                Ok(pixels) => return Some(Ok(FrameSample { index, pixels })),
                Err(ClassifierError::Cancelled) => return Some(Err(ClassifierError::Cancelled)),
                Err(e) => {
                    warn!("Skipping frame {}: {}", index, e);
                    self.skipped += 1;
                }
            }
        }
    }
}
