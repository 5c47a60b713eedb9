use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::data::csv_io::read_csv;
use crate::error::{ModelQualityError, StageFailure};
use crate::model::LinearRegression;
use crate::pipeline::trainer::score;
use crate::pipeline::{
    DataIngestionArtifact, DataTransformationArtifact, ModelEvaluationArtifact,
    ModelTrainerArtifact,
};
use crate::registry::{load_object, load_verified, ModelResolver};
use crate::transform::{FittedPreprocessor, LabelEncoder, Transformer};

/// Accepts when there is no previous score, otherwise only on a strict
/// improvement.
pub fn decide_promotion(
    previous_score: Option<f64>,
    current_score: f64,
) -> Result<ModelEvaluationArtifact, ModelQualityError> {
    let improved_accuracy = match previous_score {
        None => None,
        Some(previous) if current_score > previous => Some(current_score - previous),
        Some(previous) => {
            return Err(ModelQualityError::NotBetterThanPrevious {
                current: current_score,
                previous,
            })
        }
    };
    Ok(ModelEvaluationArtifact {
        is_model_accepted: true,
        improved_accuracy,
        current_score,
        previous_score,
        previous_version: None,
    })
}

struct ScoringBundle {
    preprocessor: FittedPreprocessor,
    model: LinearRegression,
}

impl ScoringBundle {
    fn score_on(&self, df: &DataFrame, target_column: &str) -> Result<f64, StageFailure> {
        let dataset = self.preprocessor.dataset(df, target_column, "test")?;
        score(&self.model, &dataset, "test")
    }
}

fn load_bundle(
    transformer: &Path,
    target_encoder: &Path,
    model: &Path,
    verified: bool,
) -> Result<ScoringBundle, StageFailure> {
    let (transformer, target_encoder, model): (Transformer, LabelEncoder, LinearRegression) =
        if verified {
            (
                load_verified(transformer)?,
                load_verified(target_encoder)?,
                load_verified(model)?,
            )
        } else {
            (
                load_object(transformer)?,
                load_object(target_encoder)?,
                load_object(model)?,
            )
        };
    Ok(ScoringBundle {
        preprocessor: FittedPreprocessor {
            transformer,
            target_encoder,
        },
        model,
    })
}

/// Scores the new model and the latest promoted one on the same held-out
/// test file, each through its own preprocessing.
pub fn initiate_model_evaluation(
    ingestion: &DataIngestionArtifact,
    transformation: &DataTransformationArtifact,
    trainer: &ModelTrainerArtifact,
    resolver: &ModelResolver,
    target_column: &str,
) -> Result<ModelEvaluationArtifact, StageFailure> {
    let Some(previous_version) = resolver.latest_version()? else {
        info!("no previous model in {}, accepting", resolver.registry().display());
        return Ok(decide_promotion(None, trainer.r2_test_score)?);
    };

    let test = read_csv(&ingestion.test_file_path)?;
    let previous = load_bundle(
        &resolver.get_latest_transformer_path()?,
        &resolver.get_latest_target_encoder_path()?,
        &resolver.get_latest_model_path()?,
        true,
    )?;
    let current = load_bundle(
        &transformation.transform_object_path,
        &transformation.target_encoder_path,
        &trainer.model_path,
        false,
    )?;

    let previous_score = previous.score_on(&test, target_column)?;
    let current_score = current.score_on(&test, target_column)?;
    info!(
        "current model R2 {current_score:.4} vs version {previous_version} R2 {previous_score:.4}"
    );

    let mut artifact = decide_promotion(Some(previous_score), current_score)?;
    artifact.previous_version = Some(previous_version);
    Ok(artifact)
}
