pub mod builder;
pub mod drift;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

pub use builder::{columns_over_null_threshold, validate_datasets, ValidationReportBuilder};
pub use drift::{column_drift, ks_2samp, KsResult};

/// Null hypothesis (same distribution) is kept when the p-value exceeds this.
pub const DRIFT_SIGNIFICANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    Base,
    Train,
    Test,
}

impl DatasetRole {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Train => "train",
            Self::Test => "test",
        }
    }

    pub fn missing_values_key(&self) -> String {
        format!("missing_values_in_{}_dataset", self.as_slug())
    }

    pub fn missing_columns_key(&self) -> String {
        format!("missing_columns_in_{}_dataset", self.as_slug())
    }

    pub fn data_drift_key(&self) -> String {
        format!("data_drift_in_{}_dataset", self.as_slug())
    }
}

impl Display for DatasetRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DriftRecord {
    pub pvalue: f64,
    pub same_distribution: bool,
}

impl DriftRecord {
    pub fn from_p_value(pvalue: f64) -> Self {
        Self {
            pvalue,
            same_distribution: pvalue > DRIFT_SIGNIFICANCE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ReportEntry {
    Columns(Vec<String>),
    Drift(BTreeMap<String, DriftRecord>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ValidationReport {
    entries: BTreeMap<String, ReportEntry>,
}

impl ValidationReport {
    pub fn insert(&mut self, key: String, entry: ReportEntry) {
        self.entries.insert(key, entry);
    }

    pub fn entries(&self) -> &BTreeMap<String, ReportEntry> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&ReportEntry> {
        self.entries.get(key)
    }

    pub fn dropped_columns(&self, role: DatasetRole) -> Option<&[String]> {
        self.columns_at(&role.missing_values_key())
    }

    pub fn missing_columns(&self, role: DatasetRole) -> Option<&[String]> {
        self.columns_at(&role.missing_columns_key())
    }

    pub fn drift(&self, role: DatasetRole) -> Option<&BTreeMap<String, DriftRecord>> {
        match self.entries.get(&role.data_drift_key()) {
            Some(ReportEntry::Drift(map)) => Some(map),
            _ => None,
        }
    }

    pub fn drifted_columns(&self, role: DatasetRole) -> Vec<String> {
        self.drift(role)
            .map(|map| {
                map.iter()
                    .filter(|(_, record)| !record.same_distribution)
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn columns_at(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key) {
            Some(ReportEntry::Columns(cols)) => Some(cols.as_slice()),
            _ => None,
        }
    }

    /// Persists the report as YAML.
    pub fn write(&self, path: &Path) -> Result<(), DataError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| DataError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let body = serde_yaml::to_string(self).map_err(|source| DataError::Report {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, body).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, DataError> {
        let body = fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&body).map_err(|source| DataError::Report {
            path: path.to_path_buf(),
            source,
        })
    }
}
