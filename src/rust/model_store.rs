use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::EngineConfig;
use crate::modality::Modality;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {path}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

/// Resolves and verifies the persisted artifacts an engine loads at startup.
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
    checksums: HashMap<String, String>,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            checksums: HashMap::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            models_dir: config.models_dir(),
            checksums: config.checksums.clone(),
        }
    }

    /// Registers the expected sha256 digest for an artifact.
    pub fn with_checksum(mut self, artifact: impl Into<String>, sha256: impl Into<String>) -> Self {
        self.checksums.insert(artifact.into(), sha256.into());
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn resolve(&self, artifact: &Path) -> PathBuf {
        if artifact.is_absolute() {
            artifact.to_path_buf()
        } else {
            self.models_dir.join(artifact)
        }
    }

    pub fn model_artifact<'a>(config: &'a EngineConfig, modality: Modality) -> &'a Path {
        match modality {
            Modality::Text => &config.text.model,
            Modality::Audio => &config.audio.model,
            Modality::Image => &config.image.model,
            Modality::Video => &config.video.model,
        }
    }

    /// Checks whether every model and the vocabulary named by `config` exist.
    pub fn is_complete(&self, config: &EngineConfig) -> bool {
        let mut artifacts: Vec<&Path> = Modality::ALL
            .iter()
            .map(|&m| Self::model_artifact(config, m))
            .collect();
        artifacts.push(&config.text.vocabulary);

        artifacts.into_iter().all(|artifact| {
            let path = self.resolve(artifact);
            log::debug!("Artifact {:?} (exists: {})", path, path.exists());
            path.exists()
        })
    }

    /// Computes the sha256 digest of a file as lowercase hex.
    pub fn digest(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Resolves an artifact, checks that it exists and, when a digest was
    /// registered for it, that the file content matches.
    ///
    /// Returns the resolved path together with the file's digest.
    pub fn ensure_artifact(&self, artifact: &Path) -> Result<(PathBuf, String), ModelError> {
        let path = self.resolve(artifact);
        if !path.exists() {
            log::error!("Missing model artifact {:?}", path);
            return Err(ModelError::NotFound(path));
        }

        let key = artifact.to_string_lossy();
        let digest = Self::digest(&path)?;
        log::debug!("Calculated hash for {:?}: {}", path, digest);
        if let Some(expected) = self.checksums.get(key.as_ref()) {
            if !digest.eq_ignore_ascii_case(expected) {
                log::error!("{} hash mismatch: expected {}, got {}", key, expected, digest);
                return Err(ModelError::HashMismatch {
                    path: key.into_owned(),
                    expected: expected.clone(),
                    actual: digest,
                });
            }
            log::info!("Artifact {} verified", key);
        }

        Ok((path, digest))
    }
}
