use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DRAFT_CRITERIA_KEY: &str = "lifecycleCriteriaDraft";
pub const DRAFT_UI_KEY: &str = "lifecycleUiDraft";
pub const DRAFT_SORT_KEY: &str = "lifecycleCategorySort";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Ratio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideField {
    MinSales,
    MinCtr,
    MinViews,
    MinDaysListed,
    MinRepeatPurchase,
    MinCustomerRetention,
    MinRevenue,
    MinDaysInStep2,
}

impl OverrideField {
    pub const ALL: [Self; 8] = [
        Self::MinSales,
        Self::MinCtr,
        Self::MinViews,
        Self::MinDaysListed,
        Self::MinRepeatPurchase,
        Self::MinCustomerRetention,
        Self::MinRevenue,
        Self::MinDaysInStep2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinSales => "min_sales",
            Self::MinCtr => "min_ctr",
            Self::MinViews => "min_views",
            Self::MinDaysListed => "min_days_listed",
            Self::MinRepeatPurchase => "min_repeat_purchase",
            Self::MinCustomerRetention => "min_customer_retention",
            Self::MinRevenue => "min_revenue",
            Self::MinDaysInStep2 => "min_days_in_step2",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::MinCtr | Self::MinCustomerRetention => FieldKind::Ratio,
            _ => FieldKind::Integer,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.as_str() == value)
    }
}

// Raw editor row: numeric fields are kept as entered text until validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverrideRow {
    pub name: String,
    pub min_sales: String,
    pub min_ctr: String,
    pub min_views: String,
    pub min_days_listed: String,
    pub min_repeat_purchase: String,
    pub min_customer_retention: String,
    pub min_revenue: String,
    pub min_days_in_step2: String,
}

impl OverrideRow {
    pub fn field(&self, field: OverrideField) -> &str {
        match field {
            OverrideField::MinSales => &self.min_sales,
            OverrideField::MinCtr => &self.min_ctr,
            OverrideField::MinViews => &self.min_views,
            OverrideField::MinDaysListed => &self.min_days_listed,
            OverrideField::MinRepeatPurchase => &self.min_repeat_purchase,
            OverrideField::MinCustomerRetention => &self.min_customer_retention,
            OverrideField::MinRevenue => &self.min_revenue,
            OverrideField::MinDaysInStep2 => &self.min_days_in_step2,
        }
    }

    pub fn set_field(&mut self, field: OverrideField, value: String) {
        match field {
            OverrideField::MinSales => self.min_sales = value,
            OverrideField::MinCtr => self.min_ctr = value,
            OverrideField::MinViews => self.min_views = value,
            OverrideField::MinDaysListed => self.min_days_listed = value,
            OverrideField::MinRepeatPurchase => self.min_repeat_purchase = value,
            OverrideField::MinCustomerRetention => self.min_customer_retention = value,
            OverrideField::MinRevenue => self.min_revenue = value,
            OverrideField::MinDaysInStep2 => self.min_days_in_step2 = value,
        }
    }

    pub fn has_override(&self) -> bool {
        OverrideField::ALL
            .iter()
            .any(|field| !self.field(*field).trim().is_empty())
    }

    pub fn from_rule(name: &str, rule: &CriteriaRule) -> Self {
        fn int(value: Option<u64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }
        fn ratio(value: Option<f64>) -> String {
            value.map(|v| format!("{}", v)).unwrap_or_default()
        }

        Self {
            name: name.to_string(),
            min_sales: int(rule.min_sales),
            min_ctr: ratio(rule.min_ctr),
            min_views: int(rule.min_views),
            min_days_listed: int(rule.min_days_listed),
            min_repeat_purchase: int(rule.min_repeat_purchase),
            min_customer_retention: ratio(rule.min_customer_retention),
            min_revenue: int(rule.min_revenue),
            min_days_in_step2: int(rule.min_days_in_step2),
        }
    }
}

// ─── Backend Wire Types ─────────────────────────────────────────────────────
// Field names match the REST payload verbatim; do not rename.

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_sales: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_ctr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_views: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_days_listed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_repeat_purchase: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_customer_retention: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_revenue: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_days_in_step2: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleCriteria {
    pub step1_to_step2: CriteriaRule,
    pub step2_to_step3: CriteriaRule,
    pub category_adjusted: BTreeMap<String, CriteriaRule>,
}

// ─── Editor State Views ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub row_errors: BTreeMap<usize, Vec<String>>,
    pub field_errors: BTreeMap<usize, BTreeMap<String, String>>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredRow {
    pub index: usize,
    pub row: OverrideRow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaSnapshot {
    pub rows: Vec<OverrideRow>,
    pub validation: ValidationReport,
    pub diff: DiffSummary,
    pub auto_sort: bool,
    pub sort: Option<SortSpec>,
    pub loaded_from_draft: bool,
}

// ─── Sorting & Filtering ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    Name,
    MinSales,
    MinCtr,
    MinViews,
    MinDaysListed,
    MinRepeatPurchase,
    MinCustomerRetention,
    MinRevenue,
    MinDaysInStep2,
}

impl SortKey {
    pub fn field(self) -> Option<OverrideField> {
        match self {
            Self::Name => None,
            Self::MinSales => Some(OverrideField::MinSales),
            Self::MinCtr => Some(OverrideField::MinCtr),
            Self::MinViews => Some(OverrideField::MinViews),
            Self::MinDaysListed => Some(OverrideField::MinDaysListed),
            Self::MinRepeatPurchase => Some(OverrideField::MinRepeatPurchase),
            Self::MinCustomerRetention => Some(OverrideField::MinCustomerRetention),
            Self::MinRevenue => Some(OverrideField::MinRevenue),
            Self::MinDaysInStep2 => Some(OverrideField::MinDaysInStep2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveDirection {
    Up,
    Down,
}

// ─── CSV Import Staging ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    Merge,
    Replace,
}

impl MergeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvFileAttachment {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub data_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingImport {
    pub rows: Vec<OverrideRow>,
    pub mode: MergeMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedImportView {
    pub token: String,
    pub mode: MergeMode,
    pub rows: Vec<OverrideRow>,
    pub validation: ValidationReport,
    pub warnings: Vec<String>,
}

// ─── Preferences & Drafts ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiPrefs {
    pub filter_query: String,
    pub show_json_view: bool,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self {
            filter_query: String::new(),
            show_json_view: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortPref {
    pub auto_sort: bool,
    pub sort: Option<SortSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaDraft {
    pub rows: Vec<OverrideRow>,
    pub baseline: Vec<OverrideRow>,
    pub step1_to_step2: CriteriaRule,
    pub step2_to_step3: CriteriaRule,
    pub saved_at: DateTime<Utc>,
}

// ─── Settings & Responses ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsoleSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub draft_retention_days: u32,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8700".to_string(),
            request_timeout_secs: 15,
            draft_retention_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub saved_categories: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}
