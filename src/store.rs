use crate::errors::{AppError, AppResult};
use crate::models::{
    CriteriaRule, MergeMode, MoveDirection, OverrideField, OverrideRow, SortSpec,
};
use crate::view;
use std::collections::BTreeMap;

pub const DUPLICATE_NAME_SUFFIX: &str = " (복제)";

#[derive(Debug, Clone, Default)]
pub struct OverrideStore {
    rows: Vec<OverrideRow>,
    baseline: Vec<OverrideRow>,
    auto_sort: bool,
    sort: Option<SortSpec>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[OverrideRow] {
        &self.rows
    }

    pub fn baseline(&self) -> &[OverrideRow] {
        &self.baseline
    }

    pub fn auto_sort(&self) -> bool {
        self.auto_sort
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort
    }

    pub fn set_rows(&mut self, rows: Vec<OverrideRow>) {
        self.rows = rows;
        self.resort_if_auto();
    }

    pub fn set_baseline(&mut self, rows: Vec<OverrideRow>) {
        self.baseline = rows;
    }

    pub fn set_sort_state(&mut self, auto_sort: bool, sort: Option<SortSpec>) {
        self.auto_sort = auto_sort;
        self.sort = sort;
        self.resort_if_auto();
    }

    // The one ordering mutation outside auto-sort mode.
    pub fn apply_sort(&mut self, spec: SortSpec) {
        self.sort = Some(spec);
        view::sort_rows(&mut self.rows, spec);
    }

    pub fn add_row(&mut self, prepend: bool) {
        if prepend {
            self.rows.insert(0, OverrideRow::default());
        } else {
            self.rows.push(OverrideRow::default());
        }
        self.resort_if_auto();
    }

    pub fn remove_row(&mut self, index: usize) -> AppResult<()> {
        if index >= self.rows.len() {
            return Err(AppError::NotFound(format!("no override row at index {}", index)));
        }
        self.rows.remove(index);
        Ok(())
    }

    pub fn duplicate_row(&mut self, index: usize) -> AppResult<()> {
        let Some(source) = self.rows.get(index) else {
            return Err(AppError::NotFound(format!("no override row at index {}", index)));
        };
        let mut clone = source.clone();
        clone.name = format!("{}{}", clone.name, DUPLICATE_NAME_SUFFIX);
        self.rows.insert(index + 1, clone);
        self.resort_if_auto();
        Ok(())
    }

    // Manual reordering takes over from auto-sort.
    pub fn move_row(&mut self, index: usize, direction: MoveDirection) -> AppResult<()> {
        if index >= self.rows.len() {
            return Err(AppError::NotFound(format!("no override row at index {}", index)));
        }
        self.auto_sort = false;
        match direction {
            MoveDirection::Up if index > 0 => self.rows.swap(index, index - 1),
            MoveDirection::Down if index + 1 < self.rows.len() => self.rows.swap(index, index + 1),
            _ => {}
        }
        Ok(())
    }

    pub fn update_field(&mut self, index: usize, field: OverrideField, value: String) -> AppResult<()> {
        let Some(row) = self.rows.get_mut(index) else {
            return Err(AppError::NotFound(format!("no override row at index {}", index)));
        };
        row.set_field(field, value);
        self.resort_if_auto();
        Ok(())
    }

    pub fn update_name(&mut self, index: usize, name: String) -> AppResult<()> {
        let Some(row) = self.rows.get_mut(index) else {
            return Err(AppError::NotFound(format!("no override row at index {}", index)));
        };
        row.name = name;
        self.resort_if_auto();
        Ok(())
    }

    pub fn apply_import(&mut self, incoming: Vec<OverrideRow>, mode: MergeMode) {
        match mode {
            MergeMode::Replace => {
                self.rows = incoming;
            }
            MergeMode::Merge => {
                for row in incoming {
                    let key = row.name.trim().to_string();
                    match self.rows.iter_mut().find(|existing| existing.name.trim() == key) {
                        Some(existing) => *existing = row,
                        None => self.rows.push(row),
                    }
                }
            }
        }
        self.resort_if_auto();
    }

    // Read-only JSON mirror of the populated rows; the row store stays the
    // single source of truth.
    pub fn export_json(&self) -> serde_json::Value {
        let mut mapping = serde_json::Map::new();
        for row in self.rows.iter().filter(|row| row.has_override()) {
            let name = row.name.trim();
            if name.is_empty() {
                continue;
            }
            let mut entry = serde_json::Map::new();
            for field in OverrideField::ALL {
                let raw = row.field(field).trim();
                if !raw.is_empty() {
                    entry.insert(field.as_str().to_string(), serde_json::Value::String(raw.to_string()));
                }
            }
            mapping.insert(name.to_string(), serde_json::Value::Object(entry));
        }
        serde_json::Value::Object(mapping)
    }

    fn resort_if_auto(&mut self) {
        if !self.auto_sort {
            return;
        }
        if let Some(spec) = self.sort {
            view::sort_rows(&mut self.rows, spec);
        }
    }
}

pub fn decode_mapping(mapping: &BTreeMap<String, CriteriaRule>) -> Vec<OverrideRow> {
    mapping
        .iter()
        .map(|(name, rule)| OverrideRow::from_rule(name, rule))
        .collect()
}

// Rows without a name or without any populated field carry no override and
// are dropped from the persisted mapping.
pub fn encode_mapping(rows: &[OverrideRow]) -> AppResult<BTreeMap<String, CriteriaRule>> {
    let mut mapping = BTreeMap::new();
    for row in rows {
        let name = row.name.trim();
        if name.is_empty() || !row.has_override() {
            continue;
        }
        mapping.insert(name.to_string(), row_to_rule(row)?);
    }
    Ok(mapping)
}

fn row_to_rule(row: &OverrideRow) -> AppResult<CriteriaRule> {
    Ok(CriteriaRule {
        min_sales: parse_int(row, OverrideField::MinSales)?,
        min_ctr: parse_ratio(row, OverrideField::MinCtr)?,
        min_views: parse_int(row, OverrideField::MinViews)?,
        min_days_listed: parse_int(row, OverrideField::MinDaysListed)?,
        min_repeat_purchase: parse_int(row, OverrideField::MinRepeatPurchase)?,
        min_customer_retention: parse_ratio(row, OverrideField::MinCustomerRetention)?,
        min_revenue: parse_int(row, OverrideField::MinRevenue)?,
        min_days_in_step2: parse_int(row, OverrideField::MinDaysInStep2)?,
    })
}

fn parse_int(row: &OverrideRow, field: OverrideField) -> AppResult<Option<u64>> {
    let raw = row.field(field).trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>().map(Some).map_err(|_| {
        AppError::Parse(format!("'{}' is not a valid value for {}", raw, field.as_str()))
    })
}

fn parse_ratio(row: &OverrideRow, field: OverrideField) -> AppResult<Option<f64>> {
    let raw = row.field(field).trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = raw.parse::<f64>().map_err(|_| {
        AppError::Parse(format!("'{}' is not a valid value for {}", raw, field.as_str()))
    })?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(AppError::Parse(format!(
            "'{}' is outside the 0..=1 range for {}",
            raw,
            field.as_str()
        )));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::{decode_mapping, encode_mapping, OverrideStore, DUPLICATE_NAME_SUFFIX};
    use crate::models::{
        CriteriaRule, MergeMode, MoveDirection, OverrideField, OverrideRow, SortDirection,
        SortKey, SortSpec,
    };
    use std::collections::BTreeMap;

    fn row(name: &str, min_sales: &str) -> OverrideRow {
        OverrideRow {
            name: name.to_string(),
            min_sales: min_sales.to_string(),
            ..OverrideRow::default()
        }
    }

    #[test]
    fn merge_import_replaces_conflicts_and_appends_new_names() {
        let mut store = OverrideStore::new();
        store.set_rows(vec![row("A", "1")]);

        store.apply_import(vec![row("A", "2"), row("B", "3")], MergeMode::Merge);

        assert_eq!(store.rows().len(), 2);
        assert_eq!(store.rows()[0].name, "A");
        assert_eq!(store.rows()[0].min_sales, "2");
        assert_eq!(store.rows()[1].name, "B");
        assert_eq!(store.rows()[1].min_sales, "3");
    }

    #[test]
    fn replace_import_discards_existing_rows() {
        let mut store = OverrideStore::new();
        store.set_rows(vec![row("A", "1")]);

        store.apply_import(vec![row("A", "2"), row("B", "3")], MergeMode::Replace);

        assert_eq!(store.rows().len(), 2);
        assert_eq!(store.rows()[0].min_sales, "2");
    }

    #[test]
    fn duplicate_appends_suffix_after_source() {
        let mut store = OverrideStore::new();
        store.set_rows(vec![row("패션의류", "2"), row("가전제품", "5")]);

        store.duplicate_row(0).expect("duplicate");

        assert_eq!(store.rows().len(), 3);
        assert_eq!(store.rows()[1].name, format!("패션의류{}", DUPLICATE_NAME_SUFFIX));
        assert_eq!(store.rows()[1].min_sales, "2");
        assert_eq!(store.rows()[2].name, "가전제품");
    }

    #[test]
    fn move_row_is_noop_at_boundaries_and_disables_auto_sort() {
        let mut store = OverrideStore::new();
        store.set_rows(vec![row("a", "1"), row("b", "2")]);
        store.set_sort_state(
            true,
            Some(SortSpec {
                key: SortKey::Name,
                direction: SortDirection::Ascending,
            }),
        );

        store.move_row(0, MoveDirection::Up).expect("boundary move");
        assert_eq!(store.rows()[0].name, "a");
        assert!(!store.auto_sort());

        store.move_row(0, MoveDirection::Down).expect("swap down");
        assert_eq!(store.rows()[0].name, "b");

        assert!(store.move_row(9, MoveDirection::Up).is_err());
    }

    #[test]
    fn auto_sort_reapplies_on_field_updates() {
        let mut store = OverrideStore::new();
        store.set_rows(vec![row("a", "5"), row("b", "1")]);
        store.set_sort_state(
            true,
            Some(SortSpec {
                key: SortKey::MinSales,
                direction: SortDirection::Ascending,
            }),
        );
        assert_eq!(store.rows()[0].name, "b");

        store
            .update_field(0, OverrideField::MinSales, "9".to_string())
            .expect("update");
        assert_eq!(store.rows()[1].name, "b");
    }

    #[test]
    fn encode_drops_empty_rows_and_roundtrips_values() {
        let mut populated = row("패션의류", "3");
        populated.min_ctr = "0.25".to_string();
        let rows = vec![populated, row("빈행", ""), OverrideRow::default()];

        let mapping = encode_mapping(&rows).expect("encode");
        assert_eq!(mapping.len(), 1);
        let rule = mapping.get("패션의류").expect("rule");
        assert_eq!(rule.min_sales, Some(3));
        assert_eq!(rule.min_ctr, Some(0.25));

        let decoded = decode_mapping(&mapping);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].min_sales, "3");
        assert_eq!(decoded[0].min_ctr, "0.25");
    }

    #[test]
    fn encode_rejects_out_of_range_ratio() {
        let mut bad = row("패션의류", "");
        bad.min_ctr = "1.5".to_string();
        assert!(encode_mapping(&[bad]).is_err());
    }

    #[test]
    fn decode_orders_rows_by_category_name() {
        let mut mapping = BTreeMap::new();
        mapping.insert(
            "b".to_string(),
            CriteriaRule {
                min_sales: Some(1),
                ..CriteriaRule::default()
            },
        );
        mapping.insert(
            "a".to_string(),
            CriteriaRule {
                min_views: Some(10),
                ..CriteriaRule::default()
            },
        );

        let rows = decode_mapping(&mapping);
        assert_eq!(rows[0].name, "a");
        assert_eq!(rows[0].min_views, "10");
        assert_eq!(rows[1].name, "b");
    }
}
