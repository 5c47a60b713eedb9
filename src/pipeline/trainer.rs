use tracing::info;

use crate::config::TrainingConfig;
use crate::error::{ModelQualityError, StageFailure};
use crate::model::{r2_score, LinearRegression};
use crate::pipeline::{DataTransformationArtifact, ModelTrainerArtifact, RunLayout};
use crate::registry::{load_object, save_object};
use crate::transform::TransformedDataset;

pub fn score(
    model: &LinearRegression,
    dataset: &TransformedDataset,
    name: &str,
) -> Result<f64, StageFailure> {
    let predictions = model.predict(&dataset.features)?;
    let score = r2_score(&dataset.target, &predictions).ok_or_else(|| {
        ModelQualityError::DegenerateTrainingSet(format!(
            "{name} dataset has {} rows, R2 needs at least two",
            dataset.len()
        ))
    })?;
    Ok(score)
}

/// Both gates must pass: the test score reaches `expected_score` and the
/// train/test gap stays within `overfitting_threshold`.
pub fn check_model_quality(
    r2_train_score: f64,
    r2_test_score: f64,
    config: &TrainingConfig,
) -> Result<(), ModelQualityError> {
    if r2_test_score < config.expected_score {
        return Err(ModelQualityError::BelowExpectedScore {
            expected: config.expected_score,
            actual: r2_test_score,
        });
    }
    let diff = (r2_train_score - r2_test_score).abs();
    if diff > config.overfitting_threshold {
        return Err(ModelQualityError::Overfitting {
            diff,
            threshold: config.overfitting_threshold,
        });
    }
    Ok(())
}

pub fn initiate_model_trainer(
    transformation: &DataTransformationArtifact,
    config: &TrainingConfig,
    layout: &RunLayout,
) -> Result<ModelTrainerArtifact, StageFailure> {
    let train = TransformedDataset::from_matrix(load_object(&transformation.transformed_train_path)?)?;
    let test = TransformedDataset::from_matrix(load_object(&transformation.transformed_test_path)?)?;

    let model = LinearRegression::fit(&train.features, &train.target)?;
    let r2_train_score = score(&model, &train, "train")?;
    let r2_test_score = score(&model, &test, "test")?;
    info!("train R2 {r2_train_score:.4}, test R2 {r2_test_score:.4}");
    check_model_quality(r2_train_score, r2_test_score, config)?;

    let model_path = layout.model_file();
    save_object(&model_path, &model)?;
    Ok(ModelTrainerArtifact {
        model_path,
        r2_train_score,
        r2_test_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(expected_score: f64, overfitting_threshold: f64) -> TrainingConfig {
        TrainingConfig {
            target_column: "expenses".to_string(),
            expected_score,
            overfitting_threshold,
        }
    }

    #[test]
    fn quality_gates() {
        assert!(check_model_quality(0.85, 0.80, &config(0.7, 0.1)).is_ok());
        assert!(matches!(
            check_model_quality(0.85, 0.65, &config(0.7, 0.5)),
            Err(ModelQualityError::BelowExpectedScore { .. })
        ));
        assert!(matches!(
            check_model_quality(0.99, 0.75, &config(0.7, 0.1)),
            Err(ModelQualityError::Overfitting { .. })
        ));
        // exactly at the expected score still passes
        assert!(check_model_quality(0.7, 0.7, &config(0.7, 0.0)).is_ok());
    }

    fn linear(xs: &[f64]) -> TransformedDataset {
        TransformedDataset {
            features: xs.iter().map(|x| vec![*x]).collect(),
            target: xs.iter().map(|x| 3.0 * x + 2.0).collect(),
        }
    }

    #[test]
    fn trains_scores_and_saves_model() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = RunLayout::at(dir.path());
        save_object(
            &layout.transformed_train_file(),
            &linear(&[0.0, 1.0, 2.0, 3.0, 4.0]).to_matrix(),
        )
        .expect("train");
        save_object(&layout.transformed_test_file(), &linear(&[5.0, 6.0]).to_matrix())
            .expect("test");
        let transformation = DataTransformationArtifact {
            transform_object_path: layout.transformer_file(),
            target_encoder_path: layout.target_encoder_file(),
            transformed_train_path: layout.transformed_train_file(),
            transformed_test_path: layout.transformed_test_file(),
        };

        let artifact =
            initiate_model_trainer(&transformation, &config(0.7, 0.1), &layout).expect("train");
        assert!((artifact.r2_train_score - 1.0).abs() < 1e-9);
        assert!((artifact.r2_test_score - 1.0).abs() < 1e-9);
        let model: LinearRegression = load_object(&artifact.model_path).expect("model");
        assert!((model.coefficients[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn single_row_test_set_cannot_be_scored() {
        let model = LinearRegression {
            intercept: 0.0,
            coefficients: vec![1.0],
        };
        let err = score(&model, &linear(&[1.0]), "test").expect_err("undefined");
        assert!(matches!(
            err,
            StageFailure::ModelQuality(ModelQualityError::DegenerateTrainingSet(_))
        ));
    }
}
