pub mod metrics;

use serde::{Deserialize, Serialize};

use crate::error::{ModelQualityError, SchemaError};

pub use metrics::r2_score;

/// Ordinary least squares with intercept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegression {
    pub fn fit(features: &[Vec<f64>], target: &[f64]) -> Result<Self, ModelQualityError> {
        let n = target.len();
        if n == 0 || features.len() != n {
            return Err(ModelQualityError::DegenerateTrainingSet(format!(
                "{} feature rows for {} targets",
                features.len(),
                n
            )));
        }
        let p = features[0].len();
        if let Some(row) = features.iter().position(|r| r.len() != p) {
            return Err(ModelQualityError::DegenerateTrainingSet(format!(
                "row {row} has {} features, expected {p}",
                features[row].len()
            )));
        }

        let x_mean: Vec<f64> = (0..p)
            .map(|j| features.iter().map(|r| r[j]).sum::<f64>() / n as f64)
            .collect();
        let y_mean = target.iter().sum::<f64>() / n as f64;

        // normal equations on centred data
        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for (row, y) in features.iter().zip(target) {
            let yc = y - y_mean;
            for i in 0..p {
                let xi = row[i] - x_mean[i];
                rhs[i] += xi * yc;
                for j in i..p {
                    gram[i][j] += xi * (row[j] - x_mean[j]);
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
        }

        // vanishing ridge keeps collinear or constant features solvable
        let trace: f64 = (0..p).map(|i| gram[i][i]).sum();
        let ridge = if p > 0 { 1e-12 * (trace / p as f64).max(1.0) } else { 0.0 };
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += ridge;
        }

        let coefficients = solve(gram, rhs).ok_or_else(|| {
            ModelQualityError::DegenerateTrainingSet("normal equations are singular".to_string())
        })?;
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(b, m)| b * m)
                .sum::<f64>();
        Ok(Self {
            intercept,
            coefficients,
        })
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, SchemaError> {
        features
            .iter()
            .map(|row| {
                if row.len() != self.coefficients.len() {
                    return Err(SchemaError::FeatureWidth {
                        expected: self.coefficients.len(),
                        actual: row.len(),
                    });
                }
                Ok(self.intercept
                    + row
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(x, b)| x * b)
                        .sum::<f64>())
            })
            .collect()
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < f64::MIN_POSITIVE {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_linear_relation() {
        let features: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let target: Vec<f64> = features.iter().map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1]).collect();
        let model = LinearRegression::fit(&features, &target).expect("fit");
        assert!((model.intercept - 3.0).abs() < 1e-6);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-6);

        let predicted = model.predict(&features).expect("predict");
        assert_eq!(r2_score(&target, &predicted).map(|s| s > 0.999_999), Some(true));
    }

    #[test]
    fn constant_feature_does_not_break_the_fit() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 1.0]).collect();
        let target: Vec<f64> = (0..10).map(|i| 4.0 * i as f64).collect();
        let model = LinearRegression::fit(&features, &target).expect("fit");
        assert!((model.coefficients[0] - 4.0).abs() < 1e-6);
        assert!(model.coefficients[1].abs() < 1e-6);
    }

    #[test]
    fn empty_and_mismatched_inputs_are_rejected() {
        assert!(LinearRegression::fit(&[], &[]).is_err());
        assert!(LinearRegression::fit(&[vec![1.0]], &[1.0, 2.0]).is_err());

        let model = LinearRegression {
            intercept: 0.0,
            coefficients: vec![1.0, 2.0],
        };
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(SchemaError::FeatureWidth { expected: 2, actual: 1 })
        ));
    }
}
