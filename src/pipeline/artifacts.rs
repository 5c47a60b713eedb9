use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineStage;
use crate::registry::ModelVersion;
use crate::validation::ValidationReport;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataIngestionArtifact {
    pub feature_store_file_path: PathBuf,
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataValidationArtifact {
    pub report_file_path: PathBuf,
    pub report: ValidationReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataTransformationArtifact {
    pub transform_object_path: PathBuf,
    pub target_encoder_path: PathBuf,
    pub transformed_train_path: PathBuf,
    pub transformed_test_path: PathBuf,
}

/// Only produced for a model that passed both quality gates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelTrainerArtifact {
    pub model_path: PathBuf,
    pub r2_train_score: f64,
    pub r2_test_score: f64,
}

/// `improved_accuracy` is `None` when there was no previous model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEvaluationArtifact {
    pub is_model_accepted: bool,
    pub improved_accuracy: Option<f64>,
    pub current_score: f64,
    pub previous_score: Option<f64>,
    pub previous_version: Option<ModelVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelPusherArtifact {
    pub version: ModelVersion,
    pub version_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRunSummary {
    pub run_dir: PathBuf,
    pub final_stage: PipelineStage,
    pub ingestion: DataIngestionArtifact,
    pub validation: DataValidationArtifact,
    pub transformation: DataTransformationArtifact,
    pub trainer: ModelTrainerArtifact,
    pub evaluation: ModelEvaluationArtifact,
    pub pusher: ModelPusherArtifact,
    pub duration_ms: u64,
}
