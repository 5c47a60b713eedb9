use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ArtifactError;
use crate::registry::store::{load_object, VersionManifest, MANIFEST_FILE_NAME};
use crate::registry::version::ModelVersion;

pub const TRANSFORMER_FILE_NAME: &str = "transformer.json";
pub const MODEL_FILE_NAME: &str = "model.json";
pub const TARGET_ENCODER_FILE_NAME: &str = "target_encoder.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    pub version: ModelVersion,
    pub path: PathBuf,
    pub manifest: Option<VersionManifest>,
}

/// Locates numbered version directories under the registry root.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    registry: PathBuf,
}

impl ModelResolver {
    pub fn new(registry: impl Into<PathBuf>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    pub fn registry(&self) -> &Path {
        &self.registry
    }

    pub fn version_dir(&self, version: ModelVersion) -> PathBuf {
        self.registry.join(version.dir_name())
    }

    /// Parsed versions in ascending order. Entries that are not canonical
    /// version directories are skipped.
    pub fn list_versions(&self) -> Result<Vec<ModelVersion>, ArtifactError> {
        if !self.registry.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.registry).map_err(|source| ArtifactError::Io {
            path: self.registry.clone(),
            source,
        })?;

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ArtifactError::Io {
                path: self.registry.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.path().is_dir() {
                debug!("ignoring non-directory registry entry {name}");
                continue;
            }
            match name.parse::<ModelVersion>() {
                Ok(version) => versions.push(version),
                Err(err) => warn!("ignoring registry entry in {}: {err}", self.registry.display()),
            }
        }
        versions.sort();
        Ok(versions)
    }

    pub fn latest_version(&self) -> Result<Option<ModelVersion>, ArtifactError> {
        Ok(self.list_versions()?.into_iter().max())
    }

    pub fn get_latest_dir_path(&self) -> Result<Option<PathBuf>, ArtifactError> {
        Ok(self.latest_version()?.map(|v| self.version_dir(v)))
    }

    pub fn next_version(&self) -> Result<ModelVersion, ArtifactError> {
        match self.latest_version()? {
            None => Ok(ModelVersion::FIRST),
            Some(latest) => latest.next().ok_or_else(|| ArtifactError::VersionExists {
                path: self.version_dir(latest),
            }),
        }
    }

    pub fn get_next_dir_path(&self) -> Result<PathBuf, ArtifactError> {
        Ok(self.version_dir(self.next_version()?))
    }

    fn latest_artifact_path(&self, file_name: &str) -> Result<PathBuf, ArtifactError> {
        let dir = self
            .get_latest_dir_path()?
            .ok_or_else(|| ArtifactError::NoModelAvailable {
                root: self.registry.clone(),
            })?;
        let path = dir.join(file_name);
        if !path.is_file() {
            return Err(ArtifactError::NotFound { path });
        }
        Ok(path)
    }

    pub fn get_latest_model_path(&self) -> Result<PathBuf, ArtifactError> {
        self.latest_artifact_path(MODEL_FILE_NAME)
    }

    pub fn get_latest_transformer_path(&self) -> Result<PathBuf, ArtifactError> {
        self.latest_artifact_path(TRANSFORMER_FILE_NAME)
    }

    pub fn get_latest_target_encoder_path(&self) -> Result<PathBuf, ArtifactError> {
        self.latest_artifact_path(TARGET_ENCODER_FILE_NAME)
    }

    /// Versions with their manifests. A missing or unreadable manifest
    /// leaves `manifest` empty.
    pub fn entries(&self) -> Result<Vec<RegistryEntry>, ArtifactError> {
        Ok(self
            .list_versions()?
            .into_iter()
            .map(|version| {
                let path = self.version_dir(version);
                let manifest = match load_object(&path.join(MANIFEST_FILE_NAME)) {
                    Ok(manifest) => Some(manifest),
                    Err(ArtifactError::NotFound { .. }) => None,
                    Err(err) => {
                        warn!("unreadable manifest for version {version}: {err}");
                        None
                    }
                };
                RegistryEntry {
                    version,
                    path,
                    manifest,
                }
            })
            .collect())
    }

    pub fn get_latest_save_model_path(&self) -> Result<PathBuf, ArtifactError> {
        Ok(self.get_next_dir_path()?.join(MODEL_FILE_NAME))
    }

    pub fn get_latest_save_transformer_path(&self) -> Result<PathBuf, ArtifactError> {
        Ok(self.get_next_dir_path()?.join(TRANSFORMER_FILE_NAME))
    }

    pub fn get_latest_save_target_encoder_path(&self) -> Result<PathBuf, ArtifactError> {
        Ok(self.get_next_dir_path()?.join(TARGET_ENCODER_FILE_NAME))
    }
}
