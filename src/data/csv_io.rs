use std::fs::{self, File};
use std::path::Path;

use polars::prelude::*;

use crate::data::NA_MARKER;
use crate::error::DataError;

/// Reads a headed CSV. Empty cells and the `"na"` marker load as nulls, and
/// column types are inferred from every row.
pub fn read_csv(path: &Path) -> Result<DataFrame, DataError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .map_parse_options(|opts| {
            opts.with_null_values(Some(NullValues::AllColumnsSingle(NA_MARKER.into())))
        })
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

pub fn write_csv(path: &Path, df: &DataFrame) -> Result<(), DataError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DataError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut file = File::create(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut frame = df.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })
}
