use crate::models::{FilteredRow, OverrideField, OverrideRow, SortDirection, SortSpec};
use std::cmp::Ordering;

// Derived display views; the store itself is only mutated by apply_sort.

pub fn filter_rows(rows: &[OverrideRow], query: &str) -> Vec<FilteredRow> {
    let needle = query.trim().to_lowercase();
    rows.iter()
        .enumerate()
        .filter(|(_, row)| needle.is_empty() || haystack(row).contains(&needle))
        .map(|(index, row)| FilteredRow {
            index,
            row: row.clone(),
        })
        .collect()
}

pub fn query_rows(rows: &[OverrideRow], query: &str, sort: Option<SortSpec>) -> Vec<FilteredRow> {
    let mut filtered = filter_rows(rows, query);
    if let Some(spec) = sort {
        filtered.sort_by(|a, b| compare_rows(&a.row, &b.row, spec));
    }
    filtered
}

pub fn sort_rows(rows: &mut [OverrideRow], spec: SortSpec) {
    rows.sort_by(|a, b| compare_rows(a, b, spec));
}

// Blank and unparsable sort values collate after valid ones in BOTH
// directions; direction only inverts the ordering among valid values.
pub fn compare_rows(a: &OverrideRow, b: &OverrideRow, spec: SortSpec) -> Ordering {
    match spec.key.field() {
        None => apply_direction(
            a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            spec.direction,
        ),
        Some(field) => {
            let left = numeric_value(a.field(field));
            let right = numeric_value(b.field(field));
            match (left, right) {
                (Some(l), Some(r)) => {
                    apply_direction(l.partial_cmp(&r).unwrap_or(Ordering::Equal), spec.direction)
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }
    }
}

fn numeric_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn haystack(row: &OverrideRow) -> String {
    let mut text = row.name.to_lowercase();
    for field in OverrideField::ALL {
        text.push(' ');
        text.push_str(&row.field(field).to_lowercase());
    }
    text
}
