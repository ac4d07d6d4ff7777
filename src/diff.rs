use crate::models::{DiffSummary, OverrideField, OverrideRow};
use std::collections::{HashMap, HashSet};

// Compares raw field text, so an unsaved edit shows up even before it parses.
pub fn compute_diff(current: &[OverrideRow], baseline: &[OverrideRow]) -> DiffSummary {
    let current_names: HashSet<&str> = current
        .iter()
        .map(|row| row.name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    let baseline_map: HashMap<&str, &OverrideRow> = baseline
        .iter()
        .map(|row| (row.name.trim(), row))
        .collect();

    let mut summary = DiffSummary::default();
    let mut seen = HashSet::new();

    for row in current {
        let name = row.name.trim();
        if name.is_empty() || !seen.insert(name) {
            continue;
        }
        match baseline_map.get(name) {
            None => summary.added.push(name.to_string()),
            Some(base) => {
                if fields_differ(row, base) {
                    summary.changed.push(name.to_string());
                }
            }
        }
    }

    for row in baseline {
        let name = row.name.trim();
        if name.is_empty() {
            continue;
        }
        if !current_names.contains(name) {
            summary.removed.push(name.to_string());
        }
    }

    summary
}

fn fields_differ(a: &OverrideRow, b: &OverrideRow) -> bool {
    OverrideField::ALL
        .iter()
        .any(|field| a.field(*field) != b.field(*field))
}
