use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ArtifactError;
use crate::registry::version::ModelVersion;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serializes `value` to a sibling temp file and renames it into place, so
/// `path` only ever holds a complete artifact.
pub fn save_object<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let body = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = temp_path(path);
    fs::write(&tmp, body).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(io_err(path))
}

pub fn load_object<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let body = match fs::read(path) {
        Ok(body) => body,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ArtifactError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(io_err(path)(err)),
    };
    serde_json::from_slice(&body).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

pub fn sha256_file(path: &Path) -> Result<String, ArtifactError> {
    let body = fs::read(path).map_err(io_err(path))?;
    let mut hasher = Sha256::new();
    hasher.update(&body);
    Ok(format!("{:x}", hasher.finalize()))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp-{}", std::process::id()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactChecksum {
    pub file_name: String,
    pub sha256: String,
}

/// Written last into a version directory; lists what was promoted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionManifest {
    pub version: ModelVersion,
    pub created_at: DateTime<Utc>,
    pub r2_train_score: f64,
    pub r2_test_score: f64,
    pub improved_accuracy: Option<f64>,
    pub artifacts: Vec<ArtifactChecksum>,
}

impl VersionManifest {
    pub fn checksum_for(&self, file_name: &str) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|a| a.file_name == file_name)
            .map(|a| a.sha256.as_str())
    }
}

/// Loads an artifact from a version directory, checking it against the
/// directory manifest when one exists.
pub fn load_verified<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let manifest_path = path
        .parent()
        .map(|dir| dir.join(MANIFEST_FILE_NAME))
        .filter(|p| p.exists());
    if let Some(manifest_path) = manifest_path {
        let manifest: VersionManifest = load_object(&manifest_path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(expected) = manifest.checksum_for(&file_name) {
            let actual = sha256_file(path)?;
            if actual != expected {
                return Err(ArtifactError::ChecksumMismatch {
                    path: path.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
    }
    load_object(path)
}
