use anyhow::Result;

use crate::registry::RegistryEntry;
use crate::validation::{ReportEntry, ValidationReport};

pub fn report_to_csv(report: &ValidationReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["check", "column", "pvalue", "same_distribution"])?;
    for (key, entry) in report.entries() {
        match entry {
            ReportEntry::Columns(columns) => {
                for column in columns {
                    writer.write_record([key.as_str(), column.as_str(), "", ""])?;
                }
            }
            ReportEntry::Drift(records) => {
                for (column, record) in records {
                    writer.write_record([
                        key.clone(),
                        column.clone(),
                        format!("{:.6}", record.pvalue),
                        record.same_distribution.to_string(),
                    ])?;
                }
            }
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn registry_to_csv(entries: &[RegistryEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "version",
        "created_at",
        "r2_train_score",
        "r2_test_score",
        "improved_accuracy",
        "path",
    ])?;
    for entry in entries {
        let manifest = entry.manifest.as_ref();
        writer.write_record([
            entry.version.to_string(),
            manifest.map(|m| m.created_at.to_rfc3339()).unwrap_or_default(),
            manifest
                .map(|m| format!("{:.6}", m.r2_train_score))
                .unwrap_or_default(),
            manifest
                .map(|m| format!("{:.6}", m.r2_test_score))
                .unwrap_or_default(),
            manifest
                .and_then(|m| m.improved_accuracy)
                .map(|d| format!("{d:.6}"))
                .unwrap_or_default(),
            entry.path.display().to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelVersion;
    use std::path::PathBuf;

    #[test]
    fn registry_rows_without_manifest_leave_scores_blank() {
        let entries = vec![RegistryEntry {
            version: ModelVersion::new(3),
            path: PathBuf::from("saved_models/3"),
            manifest: None,
        }];
        let rendered = registry_to_csv(&entries).expect("csv");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "3,,,,,saved_models/3");
    }
}
