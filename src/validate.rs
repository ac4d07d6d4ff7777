use crate::models::{FieldKind, OverrideField, OverrideRow, ValidationReport};
use std::collections::BTreeSet;

const RATIO_MAX: f64 = 1.0;

// Pure and deterministic: recomputed from the row contents on every call,
// never cached, never mutating.
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine;

impl ValidationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, rows: &[OverrideRow]) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut seen = BTreeSet::new();

        for (index, row) in rows.iter().enumerate() {
            let name = row.name.trim();
            if name.is_empty() {
                record(
                    &mut report,
                    index,
                    "name",
                    format!("category name is empty (row {})", index + 1),
                    "category name is required",
                );
            } else if !seen.insert(name.to_string()) {
                // The duplicate error lands on the second-seen row.
                record(
                    &mut report,
                    index,
                    "name",
                    format!("duplicate category name: {}", name),
                    "duplicate category name",
                );
            }

            for field in OverrideField::ALL {
                self.validate_field(&mut report, index, row, field);
            }
        }

        report
    }

    fn validate_field(
        &self,
        report: &mut ValidationReport,
        index: usize,
        row: &OverrideRow,
        field: OverrideField,
    ) {
        let raw = row.field(field).trim();
        if raw.is_empty() {
            // Blank means "no override for this metric".
            return;
        }

        match field.kind() {
            FieldKind::Integer => match raw.parse::<i64>() {
                Err(_) => record(
                    report,
                    index,
                    field.as_str(),
                    format!("invalid number format for {} (row {})", field.as_str(), index + 1),
                    "invalid number format",
                ),
                Ok(value) if value < 0 => record(
                    report,
                    index,
                    field.as_str(),
                    format!("{} must be ≥ 0 (row {})", field.as_str(), index + 1),
                    "must be ≥ 0",
                ),
                Ok(_) => {}
            },
            FieldKind::Ratio => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    if value < 0.0 {
                        record(
                            report,
                            index,
                            field.as_str(),
                            format!("{} must be ≥ 0 (row {})", field.as_str(), index + 1),
                            "must be ≥ 0",
                        );
                    } else if value > RATIO_MAX {
                        record(
                            report,
                            index,
                            field.as_str(),
                            format!("{} must be ≤ 1 (row {})", field.as_str(), index + 1),
                            "must be ≤ 1",
                        );
                    }
                }
                _ => record(
                    report,
                    index,
                    field.as_str(),
                    format!("invalid number format for {} (row {})", field.as_str(), index + 1),
                    "invalid number format",
                ),
            },
        }
    }
}

fn record(
    report: &mut ValidationReport,
    index: usize,
    field: &str,
    row_message: String,
    field_message: &str,
) {
    report.errors.push(row_message.clone());
    report.row_errors.entry(index).or_default().push(row_message);
    report
        .field_errors
        .entry(index)
        .or_default()
        .insert(field.to_string(), field_message.to_string());
}

#[cfg(test)]
mod tests {
    use super::ValidationEngine;
    use crate::models::OverrideRow;

    fn row(name: &str) -> OverrideRow {
        OverrideRow {
            name: name.to_string(),
            ..OverrideRow::default()
        }
    }

    #[test]
    fn empty_name_reports_exactly_one_name_error() {
        let engine = ValidationEngine::new();
        let report = engine.validate(&[row("")]);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.row_errors.get(&0).map(Vec::len), Some(1));
        assert!(report.field_errors[&0].contains_key("name"));
    }

    #[test]
    fn duplicate_name_is_reported_on_second_row() {
        let engine = ValidationEngine::new();
        let report = engine.validate(&[row("패션의류"), row("패션의류")]);

        assert_eq!(report.errors.len(), 1);
        assert!(report.row_errors.get(&0).is_none());
        assert_eq!(
            report.row_errors[&1],
            vec!["duplicate category name: 패션의류".to_string()]
        );
    }

    #[test]
    fn whitespace_only_names_count_as_empty() {
        let engine = ValidationEngine::new();
        let report = engine.validate(&[row("   ")]);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn ratio_above_one_is_rejected_and_half_is_accepted() {
        let engine = ValidationEngine::new();

        let mut high = row("패션의류");
        high.min_ctr = "1.5".to_string();
        let report = engine.validate(&[high]);
        assert_eq!(report.field_errors[&0]["min_ctr"], "must be ≤ 1");

        let mut ok = row("패션의류");
        ok.min_ctr = "0.5".to_string();
        assert!(engine.validate(&[ok]).is_clean());
    }

    #[test]
    fn negative_and_malformed_numbers_are_flagged() {
        let engine = ValidationEngine::new();

        let mut negative = row("가전제품");
        negative.min_sales = "-3".to_string();
        let report = engine.validate(&[negative]);
        assert_eq!(report.field_errors[&0]["min_sales"], "must be ≥ 0");

        let mut malformed = row("가전제품");
        malformed.min_views = "abc".to_string();
        let report = engine.validate(&[malformed]);
        assert_eq!(report.field_errors[&0]["min_views"], "invalid number format");

        let mut fractional = row("가전제품");
        fractional.min_days_listed = "3.5".to_string();
        let report = engine.validate(&[fractional]);
        assert_eq!(
            report.field_errors[&0]["min_days_listed"],
            "invalid number format"
        );
    }

    #[test]
    fn blank_fields_are_not_validated() {
        let engine = ValidationEngine::new();
        let report = engine.validate(&[row("가전제품")]);
        assert!(report.is_clean());
    }
}
