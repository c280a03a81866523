use std::path::Path;
use std::str::FromStr;

use log::info;
use ndarray::Array2;
use tokenizers::Tokenizer;

use super::FeatureTensor;
use crate::classifier::ClassifierError;
use crate::config::TextConfig;

/// Normalises raw text the way the vocabulary was fitted: every non-word
/// character becomes a space, whitespace runs collapse, and the result is
/// lowercased.
pub fn clean_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// A pre-fitted word-level vocabulary.
///
/// The artifact is a `tokenizer.json` with a `WordLevel` model whose vocab is
/// the training-time word index. It is loaded once and never refitted.
#[derive(Debug)]
pub struct Vocabulary {
    tokenizer: Tokenizer,
    num_words: usize,
    oov_id: Option<u32>,
}

impl Vocabulary {
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        num_words: usize,
        oov_token: Option<&str>,
    ) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            ClassifierError::Tokenizer(format!("Failed to load vocabulary {}: {}", path.display(), e))
        })?;
        info!("Vocabulary loaded from {:?}", path);
        Ok(Self::new(tokenizer, num_words, oov_token))
    }

    pub fn from_json(json: &str, num_words: usize, oov_token: Option<&str>) -> Result<Self, ClassifierError> {
        let tokenizer = Tokenizer::from_str(json)
            .map_err(|e| ClassifierError::Tokenizer(format!("Invalid vocabulary: {}", e)))?;
        Ok(Self::new(tokenizer, num_words, oov_token))
    }

    pub fn new(tokenizer: Tokenizer, num_words: usize, oov_token: Option<&str>) -> Self {
        let oov_id = oov_token.and_then(|token| tokenizer.token_to_id(token));
        Self {
            tokenizer,
            num_words,
            oov_id,
        }
    }

    pub fn size(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    /// Maps cleaned text to token ids.
    ///
    /// Ids at or above `num_words` become the OOV id, or are dropped when the
    /// vocabulary has no OOV token.
    pub fn ids(&self, cleaned: &str) -> Result<Vec<i64>, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(cleaned, false)
            .map_err(|e| ClassifierError::Tokenizer(e.to_string()))?;

        let ids = encoding
            .get_ids()
            .iter()
            .filter_map(|&id| {
                if (id as usize) < self.num_words {
                    Some(id)
                } else {
                    self.oov_id
                }
            })
            .map(i64::from)
            .collect();
        Ok(ids)
    }
}

/// Encodes text into a fixed-length id sequence.
#[derive(Debug)]
pub struct TextEncoder {
    vocabulary: Vocabulary,
    sequence_length: usize,
}

impl TextEncoder {
    pub fn new(vocabulary: Vocabulary, sequence_length: usize) -> Self {
        Self {
            vocabulary,
            sequence_length,
        }
    }

    pub fn from_config(config: &TextConfig, vocabulary_path: &Path) -> Result<Self, ClassifierError> {
        let vocabulary =
            Vocabulary::from_file(vocabulary_path, config.num_words, config.oov_token.as_deref())?;
        Ok(Self::new(vocabulary, config.sequence_length))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Cleans, tokenizes and right-truncates/pads `text` to `[1, sequence_length]`.
    ///
    /// # Errors
    /// - `InvalidInput` if the text is empty or whitespace only
    /// - `Tokenizer` if the vocabulary cannot encode the text
    pub fn encode(&self, text: &str) -> Result<FeatureTensor, ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::InvalidInput("Input text cannot be empty".into()));
        }

        let mut ids = self.vocabulary.ids(&clean_text(text))?;
        ids.resize(self.sequence_length, 0);

        let array = Array2::from_shape_vec((1, self.sequence_length), ids)
            .map_err(|e| ClassifierError::Tokenizer(format!("Failed to create input array: {}", e)))?;
        Ok(FeatureTensor::Tokens(array))
    }
}
