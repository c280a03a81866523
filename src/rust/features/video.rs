//! Frame access for video payloads.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Seek, SeekFrom};
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, ImageFormat, ImageReader, RgbImage};
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use super::image::decode_image;
use crate::classifier::ClassifierError;
use crate::modality::VideoInput;

/// A finite, ordered sequence of frames with a known length.
pub trait FrameSource {
    /// Total number of frames, including ones that fail to decode.
    fn frame_count(&self) -> usize;

    /// Decodes the frame at `index`.
    ///
    /// # Errors
    /// - `Decode` if that frame cannot be decoded; other frames are unaffected
    /// - `Cancelled` if the request was abandoned while seeking to the frame
    fn decode_frame(&mut self, index: usize) -> Result<RgbImage, ClassifierError>;
}

/// Frames of an animated GIF, decoded as a forward-only stream.
///
/// Opening counts the frames in one pass over the stream, then rewinds. Each
/// `decode_frame` call decodes forward to the requested index and drops every
/// frame in between, so at most one frame is held at a time. Indices must be
/// requested in ascending order. A corrupted frame ends the stream and is
/// counted as undecodable.
pub struct GifFrames<'a> {
    frames: Frames<'a>,
    count: usize,
    position: usize,
    cancel: CancellationToken,
}

impl<'a> GifFrames<'a> {
    pub fn new<R: BufRead + Seek + 'a>(mut reader: R, cancel: &CancellationToken) -> Result<Self, ClassifierError> {
        let count = count_frames(&mut reader, cancel)?;
        reader.seek(SeekFrom::Start(0))?;
        let frames = GifDecoder::new(reader).map_err(invalid_gif)?.into_frames();
        debug!("GIF stream has {} frames", count);
        Ok(Self {
            frames,
            count,
            position: 0,
            cancel: cancel.clone(),
        })
    }

    /// Index of the next frame the stream will produce.
    pub fn position(&self) -> usize {
        self.position
    }
}

fn invalid_gif(e: image::ImageError) -> ClassifierError {
    ClassifierError::Decode(format!("Invalid GIF stream: {}", e))
}

fn count_frames<R: BufRead + Seek>(reader: &mut R, cancel: &CancellationToken) -> Result<usize, ClassifierError> {
    let decoder = GifDecoder::new(reader).map_err(invalid_gif)?;
    let mut count = 0;
    for frame in decoder.into_frames() {
        if cancel.is_cancelled() {
            return Err(ClassifierError::Cancelled);
        }
        count += 1;
        if let Err(e) = frame {
            warn!("GIF frame {} is corrupted, ending stream: {}", count - 1, e);
            break;
        }
    }
    Ok(count)
}

impl fmt::Debug for GifFrames<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GifFrames")
            .field("count", &self.count)
            .field("position", &self.position)
            .finish()
    }
}

impl FrameSource for GifFrames<'_> {
    fn frame_count(&self) -> usize {
        self.count
    }

    fn decode_frame(&mut self, index: usize) -> Result<RgbImage, ClassifierError> {
        if index >= self.count || index < self.position {
            return Err(ClassifierError::Decode(format!("Frame {} is no longer available", index)));
        }
        while self.position < index {
            if self.cancel.is_cancelled() {
                return Err(ClassifierError::Cancelled);
            }
            self.frames.next();
            self.position += 1;
        }

        self.position += 1;
        match self.frames.next() {
            Some(Ok(frame)) => Ok(DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8()),
            Some(Err(e)) => Err(ClassifierError::Decode(format!("Frame {} could not be decoded: {}", index, e))),
            None => Err(ClassifierError::Decode(format!("Frame {} is missing", index))),
        }
    }
}

/// Individually encoded still frames, decoded lazily.
#[derive(Debug)]
pub struct EncodedFrames<'a> {
    frames: &'a [Vec<u8>],
}

impl<'a> EncodedFrames<'a> {
    pub fn new(frames: &'a [Vec<u8>]) -> Self {
        Self { frames }
    }
}

impl FrameSource for EncodedFrames<'_> {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn decode_frame(&mut self, index: usize) -> Result<RgbImage, ClassifierError> {
        let bytes = self
            .frames
            .get(index)
            .ok_or_else(|| ClassifierError::Decode(format!("Frame {} is out of range", index)))?;
        decode_image(bytes)
    }
}

/// Opens a video payload as a frame source.
///
/// # Errors
/// - `Decode` if the container is not a supported format (animated GIF)
pub fn open_video<'a>(
    input: &'a VideoInput,
    cancel: &CancellationToken,
) -> Result<Box<dyn FrameSource + 'a>, ClassifierError> {
    match input {
        VideoInput::Frames(frames) => Ok(Box::new(EncodedFrames::new(frames))),
        VideoInput::Encoded(bytes) => {
            check_container(image::guess_format(bytes).ok())?;
            Ok(Box::new(GifFrames::new(Cursor::new(bytes.as_slice()), cancel)?))
        }
    }
}

/// Opens a video file as a frame source, streaming it from disk.
pub fn open_video_file(
    path: &Path,
    cancel: &CancellationToken,
) -> Result<Box<dyn FrameSource>, ClassifierError> {
    let format = ImageReader::open(path)?.with_guessed_format()?.format();
    check_container(format)?;
    let reader = BufReader::new(File::open(path)?);
    Ok(Box::new(GifFrames::new(reader, cancel)?))
}

fn check_container(format: Option<ImageFormat>) -> Result<(), ClassifierError> {
    match format {
        Some(ImageFormat::Gif) => Ok(()),
        Some(format) => Err(ClassifierError::Decode(format!(
            "Unsupported video container: {:?}",
            format
        ))),
        None => Err(ClassifierError::Decode("Unrecognised video container".to_string())),
    }
}
