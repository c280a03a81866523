use std::path::Path;

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use ndarray::Array4;

use super::FeatureTensor;
use crate::classifier::ClassifierError;
use crate::config::ImageConfig;

/// Decodes a still image and converts it to RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ClassifierError> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgb8())
        .map_err(|e| ClassifierError::Decode(format!("Invalid image: {}", e)))
}

/// Decodes an image file, detecting the format from its contents.
pub fn decode_image_file(path: &Path) -> Result<RgbImage, ClassifierError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map(|image| image.to_rgb8())
        .map_err(|e| ClassifierError::Decode(format!("Invalid image: {}", e)))
}

/// Resizes RGB pixels to the model's input size and scales them to [0, 1].
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    width: u32,
    height: u32,
    channels_first: bool,
}

impl ImageExtractor {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            channels_first: config.channels_first,
        }
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Decodes `bytes` as an image and builds its feature tensor.
    pub fn extract(&self, bytes: &[u8]) -> Result<FeatureTensor, ClassifierError> {
        let pixels = decode_image(bytes)?;
        Ok(self.extract_pixels(&pixels))
    }

    pub fn extract_file(&self, path: &Path) -> Result<FeatureTensor, ClassifierError> {
        let pixels = decode_image_file(path)?;
        Ok(self.extract_pixels(&pixels))
    }

    /// Builds the feature tensor for already-decoded pixels, such as a video frame.
    pub fn extract_pixels(&self, pixels: &RgbImage) -> FeatureTensor {
        let resized = if pixels.dimensions() == (self.width, self.height) {
            pixels.clone()
        } else {
            image::imageops::resize(pixels, self.width, self.height, FilterType::Triangle)
        };

        let (w, h) = (self.width as usize, self.height as usize);
        let tensor = if self.channels_first {
            Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
                resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
            })
        } else {
            Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| {
                resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
            })
        };
        FeatureTensor::Dense(tensor.into_dyn())
    }
}
