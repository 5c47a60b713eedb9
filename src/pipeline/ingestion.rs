use polars::prelude::*;
use tracing::info;

use crate::config::IngestionConfig;
use crate::data::csv_io::write_csv;
use crate::data::source::DataSource;
use crate::data::split::train_test_split;
use crate::data::{drop_columns, replace_marker_with_null, with_numeric_conversion, NA_MARKER};
use crate::error::DataError;
use crate::pipeline::{DataIngestionArtifact, RunLayout};

/// Document-store key column that never carries a feature.
pub const RECORD_ID_COLUMN: &str = "_id";

/// Raw source rows with the record id dropped, `"na"` cells nulled and
/// numeric text parsed.
pub fn prepare_raw_table(raw: &DataFrame) -> PolarsResult<DataFrame> {
    let cleaned = replace_marker_with_null(
        &drop_columns(raw, &[RECORD_ID_COLUMN.to_string()]),
        NA_MARKER,
    )?;
    with_numeric_conversion(&cleaned, &[])
}

pub fn initiate_data_ingestion(
    source: &dyn DataSource,
    config: &IngestionConfig,
    layout: &RunLayout,
) -> Result<DataIngestionArtifact, DataError> {
    let raw = source.fetch_table()?;
    if raw.height() == 0 {
        return Err(DataError::Empty(source.describe()));
    }
    let table = prepare_raw_table(&raw)?;
    info!(
        "ingested {} rows x {} columns from {}",
        table.height(),
        table.width(),
        source.describe()
    );

    let feature_store_file_path = layout.feature_store_file();
    write_csv(&feature_store_file_path, &table)?;

    let (train, test) = train_test_split(&table, config.test_size, config.random_seed)?;
    let train_file_path = layout.train_file();
    let test_file_path = layout.test_file();
    write_csv(&train_file_path, &train)?;
    write_csv(&test_file_path, &test)?;
    info!("split into {} train / {} test rows", train.height(), test.height());

    Ok(DataIngestionArtifact {
        feature_store_file_path,
        train_file_path,
        test_file_path,
        rows: table.height(),
    })
}
