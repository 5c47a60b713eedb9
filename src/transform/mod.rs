pub mod encoder;
pub mod scaler;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{drop_columns, numeric_values};
use crate::error::{DataError, SchemaError, StageFailure};

pub use encoder::LabelEncoder;
pub use scaler::Transformer;

/// Transformed features with the target kept alongside.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransformedDataset {
    pub features: Vec<Vec<f64>>,
    pub target: Vec<f64>,
}

impl TransformedDataset {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Feature rows with the target appended as the last column.
    pub fn to_matrix(&self) -> Vec<Vec<f64>> {
        self.features
            .iter()
            .zip(&self.target)
            .map(|(row, target)| {
                let mut row = row.clone();
                row.push(*target);
                row
            })
            .collect()
    }

    pub fn from_matrix(matrix: Vec<Vec<f64>>) -> Result<Self, SchemaError> {
        let width = matrix.first().map(Vec::len).unwrap_or(1);
        let mut dataset = Self::default();
        for mut row in matrix {
            if row.len() != width || width == 0 {
                return Err(SchemaError::FeatureWidth {
                    expected: width,
                    actual: row.len(),
                });
            }
            if let Some(target) = row.pop() {
                dataset.target.push(target);
                dataset.features.push(row);
            }
        }
        Ok(dataset)
    }
}

pub fn split_features_and_target(
    df: &DataFrame,
    target_column: &str,
    dataset: &str,
) -> Result<(DataFrame, Vec<f64>), StageFailure> {
    let column = df
        .column(target_column)
        .map_err(|_| SchemaError::MissingColumn {
            dataset: dataset.to_string(),
            column: target_column.to_string(),
        })?;
    let target = numeric_values(column)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| DataError::MissingTarget {
                column: target_column.to_string(),
                row,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((drop_columns(df, &[target_column.to_string()]), target))
}

/// Fitted encoder + transformer pair, always applied together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FittedPreprocessor {
    pub transformer: Transformer,
    pub target_encoder: LabelEncoder,
}

impl FittedPreprocessor {
    pub fn fit(features: &DataFrame) -> Result<Self, StageFailure> {
        let target_encoder = LabelEncoder::fit(features)?;
        let encoded = target_encoder.transform(features)?;
        let transformer = Transformer::fit(&encoded)?;
        Ok(Self {
            transformer,
            target_encoder,
        })
    }

    pub fn features(&self, df: &DataFrame) -> Result<Vec<Vec<f64>>, StageFailure> {
        let encoded = self.target_encoder.transform(df)?;
        self.transformer.transform(&encoded)
    }

    pub fn dataset(
        &self,
        df: &DataFrame,
        target_column: &str,
        dataset: &str,
    ) -> Result<TransformedDataset, StageFailure> {
        let (features, target) = split_features_and_target(df, target_column, dataset)?;
        Ok(TransformedDataset {
            features: self.features(&features)?,
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::column_names;

    fn sample() -> DataFrame {
        df!(
            "age" => &[20.0, 30.0, 40.0],
            "smoker" => &["yes", "no", "yes"],
            "expenses" => &[100.0, 200.0, 300.0]
        )
        .expect("frame")
    }

    #[test]
    fn target_is_separated_from_features() {
        let (features, target) =
            split_features_and_target(&sample(), "expenses", "train").expect("split");
        assert_eq!(target, vec![100.0, 200.0, 300.0]);
        assert_eq!(column_names(&features), vec!["age", "smoker"]);
    }

    #[test]
    fn missing_target_column_or_value_fails() {
        let err = split_features_and_target(&sample(), "charges", "train").expect_err("no target");
        assert!(matches!(err, StageFailure::Schema(_)));

        let df = df!("expenses" => &[Some(1.0), None]).expect("frame");
        let err = split_features_and_target(&df, "expenses", "train").expect_err("hole");
        assert!(matches!(err, StageFailure::Data(DataError::MissingTarget { row: 1, .. })));
    }

    #[test]
    fn preprocessor_encodes_then_scales() {
        let (features, _) = split_features_and_target(&sample(), "expenses", "train").expect("split");
        let pre = FittedPreprocessor::fit(&features).expect("fit");
        assert_eq!(pre.transformer.feature_names_in, vec!["age", "smoker"]);
        let dataset = pre.dataset(&sample(), "expenses", "train").expect("dataset");
        assert_eq!(dataset.len(), 3);
        // smoker codes [1, 0, 1]: median 1, IQR 0.5
        assert_eq!(dataset.features[1], vec![0.0, -2.0]);
    }

    #[test]
    fn matrix_keeps_target_last_and_rejects_ragged_rows() {
        let dataset = TransformedDataset {
            features: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            target: vec![10.0, 20.0],
        };
        let matrix = dataset.to_matrix();
        assert_eq!(matrix[1], vec![3.0, 4.0, 20.0]);
        assert_eq!(TransformedDataset::from_matrix(matrix).expect("matrix"), dataset);

        let ragged = vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0]];
        assert!(matches!(
            TransformedDataset::from_matrix(ragged),
            Err(SchemaError::FeatureWidth { expected: 3, actual: 2 })
        ));
    }
}
