use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Sqlite,
    Csv,
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "db" => Ok(Self::Sqlite),
            "csv" => Ok(Self::Csv),
            other => Err(ConfigError::UnknownSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_csv_path")]
    pub csv_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_missing_threshold")]
    pub missing_threshold: f64,
    #[serde(default = "default_base_file_path")]
    pub base_file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_target_column")]
    pub target_column: String,
    #[serde(default = "default_expected_score")]
    pub expected_score: f64,
    #[serde(default = "default_overfitting_threshold")]
    pub overfitting_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
    #[serde(default = "default_registry_dir")]
    pub registry_dir: String,
    #[serde(default = "default_prediction_dir")]
    pub prediction_dir: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_kind: Option<SourceKind>,
    pub source_path: Option<String>,
    pub registry_dir: Option<String>,
    pub expected_score: Option<f64>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/premium-pipeline/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(kind) = overrides.source_kind {
            self.source.kind = kind;
        }
        if let Some(path) = overrides.source_path {
            match self.source.kind {
                SourceKind::Sqlite => self.source.sqlite_path = path,
                SourceKind::Csv => self.source.csv_path = path,
            }
        }
        if let Some(registry_dir) = overrides.registry_dir {
            self.storage.registry_dir = registry_dir;
        }
        if let Some(expected_score) = overrides.expected_score {
            self.training.expected_score = expected_score;
        }
    }

    /// Range checks for the injected thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "validation.missing_threshold",
            self.validation.missing_threshold,
            0.0,
            1.0,
        )?;
        check_range("ingestion.test_size", self.ingestion.test_size, 0.0, 1.0)?;
        if self.ingestion.test_size == 0.0 || self.ingestion.test_size == 1.0 {
            return Err(ConfigError::OutOfRange {
                name: "ingestion.test_size",
                value: self.ingestion.test_size,
                min: f64::EPSILON,
                max: 1.0 - f64::EPSILON,
            });
        }
        check_range(
            "training.expected_score",
            self.training.expected_score,
            f64::MIN,
            1.0,
        )?;
        check_range(
            "training.overfitting_threshold",
            self.training.overfitting_threshold,
            0.0,
            f64::MAX,
        )?;
        if self.training.target_column.trim().is_empty() {
            return Err(ConfigError::Empty("training.target_column"));
        }
        if self.storage.registry_dir.trim().is_empty() {
            return Err(ConfigError::Empty("storage.registry_dir"));
        }
        if self.storage.artifact_dir.trim().is_empty() {
            return Err(ConfigError::Empty("storage.artifact_dir"));
        }
        Ok(())
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_sqlite_path(&self) -> PathBuf {
        expand_tilde(&self.source.sqlite_path)
    }

    pub fn resolved_csv_path(&self) -> PathBuf {
        expand_tilde(&self.source.csv_path)
    }

    pub fn resolved_base_file_path(&self) -> PathBuf {
        expand_tilde(&self.validation.base_file_path)
    }

    pub fn resolved_artifact_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.artifact_dir)
    }

    pub fn resolved_registry_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.registry_dir)
    }

    pub fn resolved_prediction_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.prediction_dir)
    }

    pub fn default_template() -> String {
        let template = r#"[source]
kind = "sqlite"
sqlite_path = "~/.local/share/premium-pipeline/insurance.db"
table = "insurance"
csv_path = "insurance.csv"

[ingestion]
test_size = 0.2
random_seed = 42

[validation]
missing_threshold = 0.2
base_file_path = "insurance.csv"

[training]
target_column = "expenses"
expected_score = 0.7
overfitting_threshold = 0.1

[storage]
artifact_dir = "artifact"
registry_dir = "saved_models"
prediction_dir = "prediction"
"#;
        template.to_string()
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            sqlite_path: default_sqlite_path(),
            table: default_table(),
            csv_path: default_csv_path(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            random_seed: default_random_seed(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            missing_threshold: default_missing_threshold(),
            base_file_path: default_base_file_path(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: default_target_column(),
            expected_score: default_expected_score(),
            overfitting_threshold: default_overfitting_threshold(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            registry_dir: default_registry_dir(),
            prediction_dir: default_prediction_dir(),
        }
    }
}

fn default_source_kind() -> SourceKind {
    SourceKind::Sqlite
}

fn default_sqlite_path() -> String {
    "~/.local/share/premium-pipeline/insurance.db".to_string()
}

fn default_table() -> String {
    "insurance".to_string()
}

fn default_csv_path() -> String {
    "insurance.csv".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_seed() -> u64 {
    42
}

fn default_missing_threshold() -> f64 {
    0.2
}

fn default_base_file_path() -> String {
    "insurance.csv".to_string()
}

fn default_target_column() -> String {
    "expenses".to_string()
}

fn default_expected_score() -> f64 {
    0.7
}

fn default_overfitting_threshold() -> f64 {
    0.1
}

fn default_artifact_dir() -> String {
    "artifact".to_string()
}

fn default_registry_dir() -> String {
    "saved_models".to_string()
}

fn default_prediction_dir() -> String {
    "prediction".to_string()
}
