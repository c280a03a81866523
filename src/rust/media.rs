//! Scoped staging of uploaded media.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use crate::classifier::ClassifierError;

/// An upload written to a temporary file for the duration of one request.
///
/// The file is removed when this value is dropped, whether classification
/// succeeded or not.
#[derive(Debug)]
pub struct StagedMedia {
    file: NamedTempFile,
    len: u64,
}

impl StagedMedia {
    /// Copies `reader` into a new temporary file under `dir`.
    ///
    /// `extension` is kept as the file suffix so decoders can use it as a
    /// container hint.
    pub fn stage<R: Read>(dir: &Path, reader: &mut R, extension: Option<&str>) -> Result<Self, ClassifierError> {
        fs::create_dir_all(dir)?;

        let suffix = extension
            .map(|ext| format!(".{}", ext.trim_start_matches('.')))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("emolens-")
            .suffix(&suffix)
            .tempfile_in(dir)?;

        let len = io::copy(reader, file.as_file_mut())?;
        debug!("Staged {} bytes at {:?}", len, file.path());
        Ok(Self { file, len })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the staged bytes back from the start of the file.
    pub fn read(&mut self) -> Result<Vec<u8>, ClassifierError> {
        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::with_capacity(self.len as usize);
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
