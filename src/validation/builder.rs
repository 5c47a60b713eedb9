use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::{info, warn};

use crate::data::{column_names, drop_columns, has_column, null_fraction, with_numeric_conversion};
use crate::error::DataError;
use crate::validation::drift::column_drift;
use crate::validation::{DatasetRole, DriftRecord, ReportEntry, ValidationReport};

/// Columns whose null fraction is strictly above `threshold`, in frame order.
pub fn columns_over_null_threshold(df: &DataFrame, threshold: f64) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| null_fraction(c) > threshold)
        .map(|c| c.name().to_string())
        .collect()
}

pub struct ValidationReportBuilder {
    missing_threshold: f64,
    report: ValidationReport,
}

impl ValidationReportBuilder {
    pub fn new(missing_threshold: f64) -> Self {
        Self {
            missing_threshold,
            report: ValidationReport::default(),
        }
    }

    /// Drops columns above the missing-value threshold. Returns `None` when
    /// no column survives.
    pub fn drop_missing_values_columns(
        &mut self,
        df: &DataFrame,
        role: DatasetRole,
    ) -> Option<DataFrame> {
        let dropped = columns_over_null_threshold(df, self.missing_threshold);
        info!(
            "{role} dataset: dropping columns with null fraction above {}: {:?}",
            self.missing_threshold, dropped
        );
        let kept = drop_columns(df, &dropped);
        self.report
            .insert(role.missing_values_key(), ReportEntry::Columns(dropped));
        if kept.width() == 0 {
            warn!("{role} dataset has no columns left after dropping missing values");
            return None;
        }
        Some(kept)
    }

    pub fn is_required_columns_exists(
        &mut self,
        base: &DataFrame,
        current: &DataFrame,
        role: DatasetRole,
    ) -> bool {
        let missing: Vec<String> = column_names(base)
            .into_iter()
            .filter(|name| !has_column(current, name))
            .collect();
        if missing.is_empty() {
            return true;
        }
        for column in &missing {
            info!("column {column} is not available in {role} dataset");
        }
        self.report
            .insert(role.missing_columns_key(), ReportEntry::Columns(missing));
        false
    }

    pub fn data_drift(&mut self, base: &DataFrame, current: &DataFrame, role: DatasetRole) {
        let mut drift = BTreeMap::new();
        for base_column in base.get_columns() {
            let name = base_column.name().as_str();
            let Ok(current_column) = current.column(name) else {
                continue;
            };
            let result = match column_drift(base_column, current_column) {
                Ok(Some(result)) => result,
                Ok(None) => {
                    warn!("column {name} has no observed values to compare in {role} dataset");
                    continue;
                }
                Err(err) => {
                    warn!("column {name} cannot be compared in {role} dataset: {err}");
                    continue;
                }
            };
            let record = DriftRecord::from_p_value(result.pvalue);
            if !record.same_distribution {
                info!(
                    "drift detected in {role} dataset column {name} (p={:.4})",
                    record.pvalue
                );
            }
            drift.insert(name.to_string(), record);
        }
        self.report
            .insert(role.data_drift_key(), ReportEntry::Drift(drift));
    }

    pub fn build(self) -> ValidationReport {
        self.report
    }
}

/// Runs drop, schema and drift checks for the train and test candidates
/// against the base dataset. Text columns that parse as numbers are
/// converted first, except `target_column`.
pub fn validate_datasets(
    base: &DataFrame,
    train: &DataFrame,
    test: &DataFrame,
    missing_threshold: f64,
    target_column: &str,
) -> Result<ValidationReport, DataError> {
    let mut builder = ValidationReportBuilder::new(missing_threshold);
    let exclude = vec![target_column.to_string()];

    let base = builder
        .drop_missing_values_columns(base, DatasetRole::Base)
        .map(|df| with_numeric_conversion(&df, &exclude))
        .transpose()?;
    let candidates = [
        (
            DatasetRole::Train,
            builder.drop_missing_values_columns(train, DatasetRole::Train),
        ),
        (
            DatasetRole::Test,
            builder.drop_missing_values_columns(test, DatasetRole::Test),
        ),
    ];

    let Some(base) = base else {
        warn!("base dataset collapsed; skipping schema and drift checks");
        return Ok(builder.build());
    };

    for (role, candidate) in candidates {
        let Some(candidate) = candidate else {
            warn!("{role} dataset collapsed; skipping schema and drift checks");
            continue;
        };
        let candidate = with_numeric_conversion(&candidate, &exclude)?;
        if builder.is_required_columns_exists(&base, &candidate, role) {
            info!("all required columns present in {role} dataset, detecting data drift");
            builder.data_drift(&base, &candidate, role);
        }
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn insurance_like(rows: usize, offset: f64) -> DataFrame {
        let ages: Vec<f64> = (0..rows).map(|v| 18.0 + (v % 40) as f64 + offset).collect();
        let charges: Vec<f64> = (0..rows).map(|v| 1_000.0 + 10.0 * v as f64).collect();
        let regions: Vec<&str> = (0..rows)
            .map(|v| if v % 2 == 0 { "north" } else { "south" })
            .collect();
        df!("age" => ages, "region" => regions, "expenses" => charges).expect("frame")
    }

    #[test]
    fn missing_column_skips_drift_but_is_recorded() {
        let base = insurance_like(40, 0.0);
        let train = drop_columns(&insurance_like(40, 0.0), &["region".to_string()]);
        let test = insurance_like(20, 0.0);

        let report = validate_datasets(&base, &train, &test, 0.2, "expenses").expect("report");
        assert_eq!(
            report.missing_columns(DatasetRole::Train),
            Some(&["region".to_string()][..])
        );
        assert!(report.drift(DatasetRole::Train).is_none());
        assert!(report.drift(DatasetRole::Test).is_some());
        assert!(report.missing_columns(DatasetRole::Test).is_none());
    }

    #[test]
    fn shifted_feature_is_flagged_as_drift() {
        let base = insurance_like(80, 0.0);
        let train = insurance_like(80, 0.0);
        let test = insurance_like(80, 500.0);

        let report = validate_datasets(&base, &train, &test, 0.2, "expenses").expect("report");
        assert!(report.drifted_columns(DatasetRole::Train).is_empty());
        assert_eq!(report.drifted_columns(DatasetRole::Test), vec!["age".to_string()]);
    }

    #[test]
    fn text_numbers_compare_against_numeric_base() {
        let base = insurance_like(40, 0.0);
        let ages: Vec<String> = (0..40).map(|v| (18 + v % 40).to_string()).collect();
        let regions: Vec<&str> = (0..40).map(|v| if v % 2 == 0 { "north" } else { "south" }).collect();
        let charges: Vec<f64> = (0..40).map(|v| 1_000.0 + 10.0 * v as f64).collect();
        let train = df!("age" => ages, "region" => regions, "expenses" => charges).expect("frame");

        let report = validate_datasets(&base, &train, &base, 0.2, "expenses").expect("report");
        let drift = report.drift(DatasetRole::Train).expect("train drift");
        assert!(drift["age"].same_distribution);
        assert!(drift["region"].same_distribution);
    }

    #[test]
    fn fully_null_dataset_collapses() {
        let base = insurance_like(10, 0.0);
        let empty = df!("age" => &[None::<f64>, None, None, None]).expect("frame");

        let report = validate_datasets(&base, &empty, &base, 0.5, "expenses").expect("report");
        assert_eq!(
            report.dropped_columns(DatasetRole::Train),
            Some(&["age".to_string()][..])
        );
        assert!(report.missing_columns(DatasetRole::Train).is_none());
        assert!(report.drift(DatasetRole::Train).is_none());
        assert!(report.drift(DatasetRole::Test).is_some());
    }

    fn column_with_nulls(name: &str, rows: usize, nulls: usize) -> Column {
        let values: Vec<Option<f64>> = (0..rows)
            .map(|i| if i < nulls { None } else { Some(i as f64) })
            .collect();
        Series::new(name.into(), values).into()
    }

    proptest! {
        #[test]
        fn dropped_iff_null_fraction_exceeds_threshold(
            rows in 1usize..40,
            null_counts in prop::collection::vec(0usize..40, 1..6),
            threshold in 0.0f64..=1.0,
        ) {
            let columns: Vec<Column> = null_counts
                .iter()
                .enumerate()
                .map(|(i, n)| column_with_nulls(&format!("c{i}"), rows, (*n).min(rows)))
                .collect();
            let df = DataFrame::new(columns).expect("frame");
            let dropped = columns_over_null_threshold(&df, threshold);
            for column in df.get_columns() {
                let fraction = column.null_count() as f64 / rows as f64;
                prop_assert_eq!(dropped.contains(&column.name().to_string()), fraction > threshold);
            }
        }
    }
}
