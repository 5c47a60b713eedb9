use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::csv_io::{read_csv, write_csv};
use crate::error::{ArtifactError, DataError, StageFailure};
use crate::model::LinearRegression;
use crate::pipeline::RUN_TIMESTAMP_FORMAT;
use crate::registry::{load_verified, ModelResolver};
use crate::transform::{FittedPreprocessor, LabelEncoder, Transformer};

pub const PREDICTION_COLUMN: &str = "prediction";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchPredictionArtifact {
    pub input_file_path: PathBuf,
    pub prediction_file_path: PathBuf,
    pub model_dir: PathBuf,
    pub rows: usize,
}

pub fn prediction_file_path(
    prediction_dir: &Path,
    input_file: &Path,
    at: DateTime<Local>,
) -> PathBuf {
    let stem = input_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    prediction_dir.join(format!("{stem}_{}.csv", at.format(RUN_TIMESTAMP_FORMAT)))
}

/// Scores `input_file` with the latest promoted version and writes the
/// input rows plus a `prediction` column.
pub fn start_batch_prediction(
    resolver: &ModelResolver,
    input_file: &Path,
    prediction_dir: &Path,
) -> Result<BatchPredictionArtifact, StageFailure> {
    let model_dir = resolver
        .get_latest_dir_path()?
        .ok_or_else(|| ArtifactError::NoModelAvailable {
            root: resolver.registry().to_path_buf(),
        })?;
    let transformer: Transformer = load_verified(&resolver.get_latest_transformer_path()?)?;
    let target_encoder: LabelEncoder = load_verified(&resolver.get_latest_target_encoder_path()?)?;
    let model: LinearRegression = load_verified(&resolver.get_latest_model_path()?)?;
    let preprocessor = FittedPreprocessor {
        transformer,
        target_encoder,
    };

    let mut output = read_csv(input_file)?;
    let features = preprocessor.features(&output)?;
    let predictions = model.predict(&features)?;
    output
        .with_column(Series::new(PREDICTION_COLUMN.into(), &predictions))
        .map_err(DataError::from)?;

    let prediction_file_path = prediction_file_path(prediction_dir, input_file, Local::now());
    write_csv(&prediction_file_path, &output)?;
    info!(
        "wrote {} predictions from {} to {}",
        predictions.len(),
        model_dir.display(),
        prediction_file_path.display()
    );
    Ok(BatchPredictionArtifact {
        input_file_path: input_file.to_path_buf(),
        prediction_file_path,
        model_dir,
        rows: predictions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{column_names, numeric_values};
    use crate::pipeline::pusher::claim_version_dir;
    use crate::registry::{
        save_object, ModelVersion, MODEL_FILE_NAME, TARGET_ENCODER_FILE_NAME,
        TRANSFORMER_FILE_NAME,
    };
    use chrono::TimeZone;

    #[test]
    fn output_name_carries_input_stem_and_timestamp() {
        let at = Local
            .with_ymd_and_hms(2023, 11, 2, 14, 30, 0)
            .single()
            .expect("unambiguous time");
        assert_eq!(
            prediction_file_path(Path::new("prediction"), Path::new("data/insurance.csv"), at),
            Path::new("prediction/insurance_11022023__143000.csv")
        );
    }

    #[test]
    fn empty_registry_has_nothing_to_predict_with() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = ModelResolver::new(dir.path().join("saved_models"));
        let err = start_batch_prediction(&resolver, &dir.path().join("in.csv"), dir.path())
            .expect_err("no model");
        assert!(matches!(
            err,
            StageFailure::Artifact(ArtifactError::NoModelAvailable { .. })
        ));
    }

    #[test]
    fn appends_prediction_column() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = ModelResolver::new(dir.path().join("saved_models"));
        let version_dir = claim_version_dir(&resolver, ModelVersion::FIRST).expect("claim");

        let training = df!("age" => &[20.0, 40.0], "smoker" => &["no", "yes"]).expect("frame");
        let pre = FittedPreprocessor::fit(&training).expect("fit");
        save_object(&version_dir.join(TRANSFORMER_FILE_NAME), &pre.transformer).expect("t");
        save_object(&version_dir.join(TARGET_ENCODER_FILE_NAME), &pre.target_encoder).expect("e");
        save_object(
            &version_dir.join(MODEL_FILE_NAME),
            &LinearRegression {
                intercept: 100.0,
                coefficients: vec![0.0, 0.0],
            },
        )
        .expect("m");

        let input = dir.path().join("batch.csv");
        std::fs::write(&input, "age,smoker,region\n25,no,north\nna,yes,south\n").expect("input");
        let artifact = start_batch_prediction(&resolver, &input, &dir.path().join("prediction"))
            .expect("predict");
        assert_eq!(artifact.rows, 2);

        let written = read_csv(&artifact.prediction_file_path).expect("read output");
        assert_eq!(
            column_names(&written),
            vec!["age", "smoker", "region", PREDICTION_COLUMN]
        );
        let predicted =
            numeric_values(written.column(PREDICTION_COLUMN).expect("prediction column"))
                .expect("numeric");
        assert_eq!(predicted, vec![Some(100.0), Some(100.0)]);
    }
}
