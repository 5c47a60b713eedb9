use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{DriftRecord, ReportEntry, ValidationReport};
    use std::collections::BTreeMap;

    #[test]
    fn report_renders_with_original_keys() {
        let mut report = ValidationReport::default();
        let mut drift = BTreeMap::new();
        drift.insert("bmi".to_string(), DriftRecord::from_p_value(0.5));
        report.insert("data_drift_in_test_dataset".to_string(), ReportEntry::Drift(drift));

        let value: serde_json::Value =
            serde_json::from_str(&render_json(&report).expect("json")).expect("parse");
        assert_eq!(
            value["data_drift_in_test_dataset"]["bmi"]["same_distribution"],
            serde_json::Value::Bool(true)
        );
    }
}
