use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::pipeline::PipelineRunSummary;
use crate::prediction::BatchPredictionArtifact;
use crate::registry::RegistryEntry;
use crate::validation::{ReportEntry, ValidationReport};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn score_cell(score: Option<f64>) -> String {
    score
        .map(|s| format!("{s:.4}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_report_table(report: &ValidationReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Check", "Column", "P-Value", "Same Distribution"]);

    for (key, entry) in report.entries() {
        match entry {
            ReportEntry::Columns(columns) if columns.is_empty() => {
                table.add_row(vec![key.as_str(), "-", "-", "-"]);
            }
            ReportEntry::Columns(columns) => {
                for column in columns {
                    table.add_row(vec![key.as_str(), column.as_str(), "-", "-"]);
                }
            }
            ReportEntry::Drift(records) => {
                for (column, record) in records {
                    let verdict = if record.same_distribution {
                        Cell::new("YES").fg(Color::Green)
                    } else {
                        Cell::new("NO").fg(Color::Red)
                    };
                    table.add_row(Row::from(vec![
                        Cell::new(key),
                        Cell::new(column),
                        Cell::new(format!("{:.4}", record.pvalue)),
                        verdict,
                    ]));
                }
            }
        }
    }
    table.to_string()
}

pub fn render_registry_table(entries: &[RegistryEntry]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Version",
        "Created",
        "Train R2",
        "Test R2",
        "Improvement",
        "Path",
    ]);
    for entry in entries {
        let manifest = entry.manifest.as_ref();
        table.add_row(vec![
            entry.version.to_string(),
            manifest
                .map(|m| m.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            score_cell(manifest.map(|m| m.r2_train_score)),
            score_cell(manifest.map(|m| m.r2_test_score)),
            score_cell(manifest.and_then(|m| m.improved_accuracy)),
            entry.path.display().to_string(),
        ]);
    }
    table.to_string()
}

pub fn render_run_summary_table(summary: &PipelineRunSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["Stage", "Result"]);
    table.add_row(vec![
        "ingested".to_string(),
        format!("{} rows", summary.ingestion.rows),
    ]);
    table.add_row(vec![
        "validated".to_string(),
        summary.validation.report_file_path.display().to_string(),
    ]);
    table.add_row(vec![
        "transformed".to_string(),
        summary
            .transformation
            .transform_object_path
            .display()
            .to_string(),
    ]);
    table.add_row(vec![
        "trained".to_string(),
        format!(
            "train R2 {:.4}, test R2 {:.4}",
            summary.trainer.r2_train_score, summary.trainer.r2_test_score
        ),
    ]);
    table.add_row(vec![
        "evaluated".to_string(),
        match summary.evaluation.improved_accuracy {
            Some(improvement) => format!("improved by {improvement:.4}"),
            None => "first model, accepted".to_string(),
        },
    ]);
    table.add_row(Row::from(vec![
        Cell::new(summary.final_stage.as_slug()).fg(Color::Green),
        Cell::new(format!(
            "version {} at {}",
            summary.pusher.version,
            summary.pusher.version_dir.display()
        )),
    ]));
    table.to_string()
}

pub fn render_prediction_table(artifact: &BatchPredictionArtifact) -> String {
    let mut table = new_table();
    table.set_header(vec!["Input", "Rows", "Model", "Output"]);
    table.add_row(vec![
        artifact.input_file_path.display().to_string(),
        artifact.rows.to_string(),
        artifact.model_dir.display().to_string(),
        artifact.prediction_file_path.display().to_string(),
    ]);
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{DatasetRole, DriftRecord};
    use std::collections::BTreeMap;

    #[test]
    fn report_table_lists_drift_and_missing_columns() {
        let mut report = ValidationReport::default();
        report.insert(
            DatasetRole::Train.missing_columns_key(),
            ReportEntry::Columns(vec!["region".to_string()]),
        );
        let mut drift = BTreeMap::new();
        drift.insert("age".to_string(), DriftRecord::from_p_value(0.01));
        report.insert(DatasetRole::Test.data_drift_key(), ReportEntry::Drift(drift));

        let rendered = render_report_table(&report);
        assert!(rendered.contains("missing_columns_in_train_dataset"));
        assert!(rendered.contains("region"));
        assert!(rendered.contains("0.0100"));
        assert!(rendered.contains("NO"));
    }
}
