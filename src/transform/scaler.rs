use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{column_names, numeric_values};
use crate::error::{SchemaError, StageFailure};

/// Constant imputer followed by a robust scaler: missing cells become
/// `fill_value`, then every feature is centred on its median and divided by
/// its inter-quartile range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transformer {
    pub feature_names_in: Vec<String>,
    pub fill_value: f64,
    pub centers: Vec<f64>,
    pub scales: Vec<f64>,
}

impl Transformer {
    pub fn fit(features: &DataFrame) -> Result<Self, StageFailure> {
        let fill_value = 0.0;
        let mut centers = Vec::with_capacity(features.width());
        let mut scales = Vec::with_capacity(features.width());
        for column in features.get_columns() {
            let mut values: Vec<f64> = numeric_values(column)?
                .into_iter()
                .map(|v| v.unwrap_or(fill_value))
                .collect();
            values.sort_by(f64::total_cmp);
            let median = quantile(&values, 0.5);
            let iqr = quantile(&values, 0.75) - quantile(&values, 0.25);
            centers.push(median);
            scales.push(if iqr == 0.0 { 1.0 } else { iqr });
        }
        Ok(Self {
            feature_names_in: column_names(features),
            fill_value,
            centers,
            scales,
        })
    }

    /// Row-major feature matrix in `feature_names_in` order.
    pub fn transform(&self, df: &DataFrame) -> Result<Vec<Vec<f64>>, StageFailure> {
        let mut matrix = vec![Vec::with_capacity(self.feature_names_in.len()); df.height()];
        for (idx, name) in self.feature_names_in.iter().enumerate() {
            let column = df.column(name).map_err(|_| SchemaError::MissingColumn {
                dataset: "transformer input".to_string(),
                column: name.clone(),
            })?;
            for (row, value) in numeric_values(column)?.into_iter().enumerate() {
                let imputed = value.unwrap_or(self.fill_value);
                matrix[row].push((imputed - self.centers[idx]) / self.scales[idx]);
            }
        }
        Ok(matrix)
    }
}

/// Linear-interpolation quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
