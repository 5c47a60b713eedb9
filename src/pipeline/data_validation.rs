use std::path::Path;

use tracing::{info, warn};

use crate::config::ValidationConfig;
use crate::data::csv_io::read_csv;
use crate::error::DataError;
use crate::pipeline::{DataIngestionArtifact, DataValidationArtifact, RunLayout};
use crate::validation::{validate_datasets, DatasetRole};

/// Compares the ingested train/test files against the base file and
/// persists the report. Findings are recorded, never fatal.
pub fn initiate_data_validation(
    ingestion: &DataIngestionArtifact,
    base_file_path: &Path,
    config: &ValidationConfig,
    target_column: &str,
    layout: &RunLayout,
) -> Result<DataValidationArtifact, DataError> {
    let base = read_csv(base_file_path)?;
    let train = read_csv(&ingestion.train_file_path)?;
    let test = read_csv(&ingestion.test_file_path)?;

    let report = validate_datasets(
        &base,
        &train,
        &test,
        config.missing_threshold,
        target_column,
    )?;
    for role in [DatasetRole::Train, DatasetRole::Test] {
        let drifted = report.drifted_columns(role);
        if !drifted.is_empty() {
            warn!("data drift detected in {role} dataset: {drifted:?}");
        }
    }

    let report_file_path = layout.report_file();
    report.write(&report_file_path)?;
    info!("validation report written to {}", report_file_path.display());

    Ok(DataValidationArtifact {
        report_file_path,
        report,
    })
}
