use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;

/// The four supported input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
    Image,
    Video,
}

impl Modality {
    pub const ALL: [Modality; 4] = [Modality::Text, Modality::Audio, Modality::Image, Modality::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| ClassifierError::InvalidInput(format!("Unknown modality: {}", s)))
    }
}

/// A video payload.
#[derive(Debug, Clone)]
pub enum VideoInput {
    /// A whole container stream. Animated GIF is the supported container.
    Encoded(Vec<u8>),
    /// Frames that were already demuxed, each an encoded still image.
    Frames(Vec<Vec<u8>>),
}

/// A raw payload tagged with its modality.
#[derive(Debug, Clone)]
pub enum Input {
    Text(String),
    Audio {
        bytes: Vec<u8>,
        /// File extension used as a container hint, without the dot.
        extension: Option<String>,
    },
    Image(Vec<u8>),
    Video(VideoInput),
}

impl Input {
    pub fn modality(&self) -> Modality {
        match self {
            Self::Text(_) => Modality::Text,
            Self::Audio { .. } => Modality::Audio,
            Self::Image(_) => Modality::Image,
            Self::Video(_) => Modality::Video,
        }
    }

    /// Wraps raw bytes read from a file as an input of the given modality.
    ///
    /// Text payloads must be valid UTF-8.
    pub fn from_bytes(
        modality: Modality,
        bytes: Vec<u8>,
        extension: Option<String>,
    ) -> Result<Self, ClassifierError> {
        Ok(match modality {
            Modality::Text => Self::Text(String::from_utf8(bytes).map_err(|_| {
                ClassifierError::InvalidInput("Text payload is not valid UTF-8".into())
            })?),
            Modality::Audio => Self::Audio { bytes, extension },
            Modality::Image => Self::Image(bytes),
            Modality::Video => Self::Video(VideoInput::Encoded(bytes)),
        })
    }
}
