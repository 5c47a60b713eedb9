use tracing::info;

use crate::data::csv_io::read_csv;
use crate::error::StageFailure;
use crate::pipeline::{DataIngestionArtifact, DataTransformationArtifact, RunLayout};
use crate::registry::save_object;
use crate::transform::{split_features_and_target, FittedPreprocessor};

/// Fits the encoder and transformer on the training split only, then
/// applies them to both splits.
pub fn initiate_data_transformation(
    ingestion: &DataIngestionArtifact,
    target_column: &str,
    layout: &RunLayout,
) -> Result<DataTransformationArtifact, StageFailure> {
    let train = read_csv(&ingestion.train_file_path)?;
    let test = read_csv(&ingestion.test_file_path)?;

    let (train_features, _) = split_features_and_target(&train, target_column, "train")?;
    let preprocessor = FittedPreprocessor::fit(&train_features)?;
    info!(
        "fitted preprocessor on {} features, label-encoded {:?}",
        preprocessor.transformer.feature_names_in.len(),
        preprocessor.target_encoder.encoded_columns()
    );

    let train_dataset = preprocessor.dataset(&train, target_column, "train")?;
    let test_dataset = preprocessor.dataset(&test, target_column, "test")?;

    let artifact = DataTransformationArtifact {
        transform_object_path: layout.transformer_file(),
        target_encoder_path: layout.target_encoder_file(),
        transformed_train_path: layout.transformed_train_file(),
        transformed_test_path: layout.transformed_test_file(),
    };
    save_object(&artifact.transformed_train_path, &train_dataset.to_matrix())?;
    save_object(&artifact.transformed_test_path, &test_dataset.to_matrix())?;
    save_object(&artifact.transform_object_path, &preprocessor.transformer)?;
    save_object(&artifact.target_encoder_path, &preprocessor.target_encoder)?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::csv_io::write_csv;
    use crate::error::SchemaError;
    use polars::prelude::*;
    use crate::registry::load_object;
    use crate::transform::{LabelEncoder, TransformedDataset, Transformer};

    fn write_split(layout: &RunLayout, with_target: bool) -> DataIngestionArtifact {
        let mut train = df!(
            "age" => &[20.0, 30.0, 40.0, 50.0],
            "smoker" => &["yes", "no", "no", "yes"]
        )
        .expect("train frame");
        if with_target {
            train
                .with_column(Series::new("expenses".into(), &[10.0, 20.0, 30.0, 40.0]))
                .expect("target column");
        }
        let test = df!("age" => &[35.0], "smoker" => &["no"], "expenses" => &[25.0])
            .expect("test frame");
        write_csv(&layout.train_file(), &train).expect("train");
        write_csv(&layout.test_file(), &test).expect("test");
        DataIngestionArtifact {
            feature_store_file_path: layout.feature_store_file(),
            train_file_path: layout.train_file(),
            test_file_path: layout.test_file(),
            rows: 5,
        }
    }

    #[test]
    fn persists_fitted_objects_and_matrices() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = RunLayout::at(dir.path());
        let ingestion = write_split(&layout, true);

        let artifact =
            initiate_data_transformation(&ingestion, "expenses", &layout).expect("transform");
        let transformer: Transformer =
            load_object(&artifact.transform_object_path).expect("transformer");
        let encoder: LabelEncoder = load_object(&artifact.target_encoder_path).expect("encoder");
        assert_eq!(transformer.feature_names_in, vec!["age", "smoker"]);
        assert_eq!(encoder.encoded_columns(), vec!["smoker"]);

        let train = TransformedDataset::from_matrix(
            load_object(&artifact.transformed_train_path).expect("train matrix"),
        )
        .expect("train dataset");
        assert_eq!(train.target, vec![10.0, 20.0, 30.0, 40.0]);
        let test = TransformedDataset::from_matrix(
            load_object(&artifact.transformed_test_path).expect("test matrix"),
        )
        .expect("test dataset");
        assert_eq!(test.len(), 1);
        assert_eq!(test.features[0].len(), 2);
    }

    #[test]
    fn missing_target_is_a_schema_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = RunLayout::at(dir.path());
        let ingestion = write_split(&layout, false);
        let err = initiate_data_transformation(&ingestion, "expenses", &layout)
            .expect_err("no target");
        assert!(matches!(
            err,
            StageFailure::Schema(SchemaError::MissingColumn { .. })
        ));
    }
}
