use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{is_categorical, text_values};
use crate::error::DataError;

/// Per-column label encoder for categorical inputs. Classes are sorted, a
/// value's code is its index in that order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelEncoder {
    classes: BTreeMap<String, Vec<String>>,
}

impl LabelEncoder {
    pub fn fit(df: &DataFrame) -> Result<Self, DataError> {
        let mut classes = BTreeMap::new();
        for column in df.get_columns().iter().filter(|c| is_categorical(c)) {
            let unique: BTreeSet<String> = text_values(column)?.into_iter().collect();
            classes.insert(column.name().to_string(), unique.into_iter().collect());
        }
        Ok(Self { classes })
    }

    pub fn encoded_columns(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    pub fn classes(&self, column: &str) -> Option<&[String]> {
        self.classes.get(column).map(Vec::as_slice)
    }

    /// Encodes known columns; values unseen at fit time become missing.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame, DataError> {
        let columns = df
            .get_columns()
            .iter()
            .map(|column| match self.classes.get(column.name().as_str()) {
                Some(classes) => encode_column(column, classes),
                None => Ok(column.clone()),
            })
            .collect::<Result<Vec<Column>, DataError>>()?;
        Ok(DataFrame::new(columns)?)
    }
}

fn encode_column(column: &Column, classes: &[String]) -> Result<Column, DataError> {
    let raw = column.cast(&DataType::String)?;
    let mut unseen = 0usize;
    let codes: Vec<Option<f64>> = raw
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|value| {
            let value = value?;
            match classes.binary_search_by(|class| class.as_str().cmp(value)) {
                Ok(code) => Some(code as f64),
                Err(_) => {
                    unseen += 1;
                    None
                }
            }
        })
        .collect();
    if unseen > 0 {
        warn!(
            "column {}: {unseen} value(s) not seen during fit, treated as missing",
            column.name()
        );
    }
    Ok(Series::new(column.name().clone(), codes).into())
}
