use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::pipeline::PipelineStage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("unknown data source kind: {0}")]
    UnknownSource(String),
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("dataframe error: {0}")]
    Frame(#[from] PolarsError),
    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("report {path} could not be serialized: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("column {column} is not numeric at row {row}")]
    NotNumeric { column: String, row: usize },
    #[error("target column {column} is missing a value at row {row}")]
    MissingTarget { column: String, row: usize },
    #[error("table not found in source: {0}")]
    UnknownTable(String),
    #[error("data source connection is closed")]
    Closed,
    #[error("dataset {0} has no rows")]
    Empty(String),
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("required column {column} missing from {dataset}")]
    MissingColumn { dataset: String, column: String },
    #[error("transformer expects {expected} features, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum ModelQualityError {
    #[error("model test score {actual:.4} is below expected score {expected:.4}")]
    BelowExpectedScore { expected: f64, actual: f64 },
    #[error("train/test score difference {diff:.4} exceeds overfitting threshold {threshold:.4}")]
    Overfitting { diff: f64, threshold: f64 },
    #[error("current model score {current:.4} is not better than previous model score {previous:.4}")]
    NotBetterThanPrevious { current: f64, previous: f64 },
    #[error("cannot fit model: {0}")]
    DegenerateTrainingSet(String),
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no model version available under {root}")]
    NoModelAvailable { root: PathBuf },
    #[error("artifact not found: {path}")]
    NotFound { path: PathBuf },
    #[error("artifact {path} could not be decoded: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact {path} could not be encoded: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("checksum mismatch for {path}: manifest has {expected}, file has {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("model version directory already exists: {path}")]
    VersionExists { path: PathBuf },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure raised inside a single stage, before the stage is attached.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    ModelQuality(#[from] ModelQualityError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: StageFailure,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Config(_) => None,
            Self::Stage { stage, .. } => Some(*stage),
        }
    }

    pub fn is_model_quality(&self) -> bool {
        matches!(
            self,
            Self::Stage {
                source: StageFailure::ModelQuality(_),
                ..
            }
        )
    }
}

pub trait StageResultExt<T> {
    fn in_stage(self, stage: PipelineStage) -> Result<T, PipelineError>;
}

impl<T, E> StageResultExt<T> for Result<T, E>
where
    E: Into<StageFailure>,
{
    fn in_stage(self, stage: PipelineStage) -> Result<T, PipelineError> {
        self.map_err(|err| PipelineError::Stage {
            stage,
            source: err.into(),
        })
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
