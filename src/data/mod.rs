pub mod csv_io;
pub mod source;
pub mod split;

use polars::prelude::*;

use crate::error::DataError;

/// Marker the upstream export uses for missing cells.
pub const NA_MARKER: &str = "na";

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

/// Text columns are the categorical ones; everything else is numeric.
pub fn is_categorical(column: &Column) -> bool {
    column.dtype() == &DataType::String
}

pub fn null_fraction(column: &Column) -> f64 {
    if column.len() == 0 {
        return 0.0;
    }
    column.null_count() as f64 / column.len() as f64
}

pub fn drop_columns(df: &DataFrame, names: &[String]) -> DataFrame {
    df.drop_many(names.iter().map(String::as_str))
}

/// Turns every text cell equal to `marker` into a missing cell.
pub fn replace_marker_with_null(df: &DataFrame, marker: &str) -> PolarsResult<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| {
            if !is_categorical(column) {
                return Ok(column.clone());
            }
            let cleaned: StringChunked = column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|value| value.filter(|v| *v != marker))
                .collect();
            Ok(cleaned.with_name(column.name().clone()).into_series().into())
        })
        .collect::<PolarsResult<Vec<Column>>>()?;
    DataFrame::new(columns)
}

/// Converts every text column whose present cells all parse as numbers,
/// leaving `exclude` and genuinely textual columns untouched.
pub fn with_numeric_conversion(df: &DataFrame, exclude: &[String]) -> PolarsResult<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(|column| {
            if !is_categorical(column) || exclude.iter().any(|name| name == column.name().as_str()) {
                return Ok(column.clone());
            }
            let parsed = column.cast(&DataType::Float64)?;
            if parsed.null_count() == column.null_count() {
                Ok(parsed)
            } else {
                Ok(column.clone())
            }
        })
        .collect::<PolarsResult<Vec<Column>>>()?;
    DataFrame::new(columns)
}

/// Numeric view of a column, `None` for missing cells. Text that does not
/// parse is an error naming the first offending row.
pub fn numeric_values(column: &Column) -> Result<Vec<Option<f64>>, DataError> {
    let parsed = column.cast(&DataType::Float64)?;
    let values = parsed.as_materialized_series().f64()?;
    if parsed.null_count() != column.null_count() {
        let raw = column.cast(&DataType::String)?;
        let row = raw
            .as_materialized_series()
            .str()?
            .into_iter()
            .zip(values)
            .position(|(text, value)| text.is_some() && value.is_none())
            .unwrap_or(0);
        return Err(DataError::NotNumeric {
            column: column.name().to_string(),
            row,
        });
    }
    Ok(values.into_iter().collect())
}

/// Observed (non-null) cells rendered as text.
pub fn text_values(column: &Column) -> PolarsResult<Vec<String>> {
    let raw = column.cast(&DataType::String)?;
    Ok(raw
        .as_materialized_series()
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_na_marker_without_touching_source() {
        let df = df!("region" => &["north", "na", "south"], "age" => &[19.0, 20.0, 21.0])
            .expect("frame");
        let cleaned = replace_marker_with_null(&df, NA_MARKER).expect("replace");
        assert_eq!(cleaned.column("region").expect("region").null_count(), 1);
        assert_eq!(df.column("region").expect("region").null_count(), 0);
        assert_eq!(column_names(&cleaned), vec!["region", "age"]);
    }

    #[test]
    fn numeric_conversion_skips_text_and_excluded_columns() {
        let df = df!(
            "age" => &[Some("19"), None, Some("33")],
            "sex" => &["male", "female", "male"],
            "expenses" => &["1.5", "2", "3"]
        )
        .expect("frame");

        let converted = with_numeric_conversion(&df, &["expenses".to_string()]).expect("convert");
        let age = converted.column("age").expect("age");
        assert_eq!(numeric_values(age).expect("numeric"), vec![Some(19.0), None, Some(33.0)]);
        assert!(is_categorical(converted.column("sex").expect("sex")));
        assert!(is_categorical(converted.column("expenses").expect("expenses")));
    }

    #[test]
    fn unparsable_text_names_its_row() {
        let df = df!("age" => &["19", "old"]).expect("frame");
        let err = numeric_values(df.column("age").expect("age")).expect_err("text");
        assert!(matches!(err, DataError::NotNumeric { row: 1, .. }));
    }

    #[test]
    fn null_fraction_counts_missing_cells() {
        let df = df!("bmi" => &[None, Some(1.0), None, None]).expect("frame");
        assert!((null_fraction(df.column("bmi").expect("bmi")) - 0.75).abs() < 1e-12);
    }
}
