pub mod artifacts;
pub mod data_validation;
pub mod evaluation;
pub mod ingestion;
pub mod pusher;
pub mod trainer;
pub mod transformation;

use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::data::source::DataSource;
use crate::error::{
    ModelQualityError, PipelineError, PipelineResult, StageFailure, StageResultExt,
};
use crate::registry::{
    ModelResolver, MODEL_FILE_NAME, TARGET_ENCODER_FILE_NAME, TRANSFORMER_FILE_NAME,
};

pub use artifacts::{
    DataIngestionArtifact, DataTransformationArtifact, DataValidationArtifact,
    ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact, PipelineRunSummary,
};

/// States of a training run, in order. A run ends in `Promoted` or
/// `Rejected`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Ingested,
    Validated,
    Transformed,
    Trained,
    Evaluated,
    Promoted,
    Rejected,
}

impl PipelineStage {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Ingested => "ingested",
            Self::Validated => "validated",
            Self::Transformed => "transformed",
            Self::Trained => "trained",
            Self::Evaluated => "evaluated",
            Self::Promoted => "promoted",
            Self::Rejected => "rejected",
        }
    }

    /// Name of the step that produces this state.
    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Ingested => "ingestion",
            Self::Validated => "validation",
            Self::Transformed => "transformation",
            Self::Trained => "training",
            Self::Evaluated | Self::Rejected => "evaluation",
            Self::Promoted => "push",
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.step_name())
    }
}

pub const RUN_TIMESTAMP_FORMAT: &str = "%m%d%Y__%H%M%S";
pub const FEATURE_STORE_FILE_NAME: &str = "insurance.csv";

/// File layout of a single run under the artifact root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(artifact_dir: &Path, started_at: DateTime<Local>) -> Self {
        Self::at(artifact_dir.join(started_at.format(RUN_TIMESTAMP_FORMAT).to_string()))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn feature_store_file(&self) -> PathBuf {
        self.root
            .join("data_ingestion/feature_store")
            .join(FEATURE_STORE_FILE_NAME)
    }

    pub fn train_file(&self) -> PathBuf {
        self.root.join("data_ingestion/dataset/train.csv")
    }

    pub fn test_file(&self) -> PathBuf {
        self.root.join("data_ingestion/dataset/test.csv")
    }

    pub fn report_file(&self) -> PathBuf {
        self.root.join("data_validation/report.yaml")
    }

    pub fn transformer_file(&self) -> PathBuf {
        self.root
            .join("data_transformation/transformer")
            .join(TRANSFORMER_FILE_NAME)
    }

    pub fn target_encoder_file(&self) -> PathBuf {
        self.root
            .join("data_transformation/target_encoder")
            .join(TARGET_ENCODER_FILE_NAME)
    }

    pub fn transformed_train_file(&self) -> PathBuf {
        self.root.join("data_transformation/transformed/train.json")
    }

    pub fn transformed_test_file(&self) -> PathBuf {
        self.root.join("data_transformation/transformed/test.json")
    }

    pub fn model_file(&self) -> PathBuf {
        self.root.join("model_trainer/model").join(MODEL_FILE_NAME)
    }
}

/// Drives one run from ingestion to promotion against a validated config.
pub struct TrainingPipeline<'a> {
    config: &'a Config,
    layout: RunLayout,
    resolver: ModelResolver,
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(config: &'a Config) -> PipelineResult<Self> {
        let layout = RunLayout::new(&config.resolved_artifact_dir(), Local::now());
        Self::with_layout(config, layout)
    }

    pub fn with_layout(config: &'a Config, layout: RunLayout) -> PipelineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            layout,
            resolver: ModelResolver::new(config.resolved_registry_dir()),
        })
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Ingests and validates only; nothing is trained or promoted.
    pub fn validate(
        &self,
        source: &mut dyn DataSource,
    ) -> PipelineResult<(DataIngestionArtifact, DataValidationArtifact)> {
        let result = self.ingest_and_validate(source);
        close_source(source, result)
    }

    /// Full run. The source is closed before returning, whatever the outcome.
    pub fn run(&self, source: &mut dyn DataSource) -> PipelineResult<PipelineRunSummary> {
        let started = Instant::now();
        info!("starting training run in {}", self.layout.root.display());
        let result = self.run_stages(source, started);
        close_source(source, result)
    }

    fn ingest_and_validate(
        &self,
        source: &dyn DataSource,
    ) -> PipelineResult<(DataIngestionArtifact, DataValidationArtifact)> {
        let ingestion =
            ingestion::initiate_data_ingestion(source, &self.config.ingestion, &self.layout)
                .in_stage(PipelineStage::Ingested)?;
        let validation = data_validation::initiate_data_validation(
            &ingestion,
            &self.config.resolved_base_file_path(),
            &self.config.validation,
            &self.config.training.target_column,
            &self.layout,
        )
        .in_stage(PipelineStage::Validated)?;
        Ok((ingestion, validation))
    }

    fn run_stages(
        &self,
        source: &dyn DataSource,
        started: Instant,
    ) -> PipelineResult<PipelineRunSummary> {
        let target_column = &self.config.training.target_column;
        let (ingestion, validation) = self.ingest_and_validate(source)?;

        let transformation = transformation::initiate_data_transformation(
            &ingestion,
            target_column,
            &self.layout,
        )
        .in_stage(PipelineStage::Transformed)?;

        let trainer = trainer::initiate_model_trainer(
            &transformation,
            &self.config.training,
            &self.layout,
        )
        .in_stage(PipelineStage::Trained)?;

        let evaluation = evaluation::initiate_model_evaluation(
            &ingestion,
            &transformation,
            &trainer,
            &self.resolver,
            target_column,
        )
        .map_err(|source| PipelineError::Stage {
            stage: evaluation_outcome(&source),
            source,
        })?;

        let pusher = pusher::initiate_model_pusher(
            &transformation,
            &trainer,
            &evaluation,
            &self.resolver,
        )
        .in_stage(PipelineStage::Promoted)?;

        Ok(PipelineRunSummary {
            run_dir: self.layout.root.clone(),
            final_stage: PipelineStage::Promoted,
            ingestion,
            validation,
            transformation,
            trainer,
            evaluation,
            pusher,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn evaluation_outcome(failure: &StageFailure) -> PipelineStage {
    match failure {
        StageFailure::ModelQuality(ModelQualityError::NotBetterThanPrevious { .. }) => {
            PipelineStage::Rejected
        }
        _ => PipelineStage::Evaluated,
    }
}

fn close_source<T>(source: &mut dyn DataSource, result: PipelineResult<T>) -> PipelineResult<T> {
    let closed = source.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err).in_stage(PipelineStage::Ingested),
        (Err(err), closed) => {
            if let Err(close_err) = closed {
                warn!("failed closing {}: {close_err}", source.describe());
            }
            Err(err)
        }
    }
}
