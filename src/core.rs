use crate::api::ApiClient;
use crate::csv_io;
use crate::db::{Database, SettingsPersistence};
use crate::diff;
use crate::errors::{AppError, AppResult};
use crate::import::ImportManager;
use crate::models::{
    BooleanResponse, ConsoleSettings, CriteriaDraft, CriteriaRule, CriteriaSnapshot,
    CsvFileAttachment, DiffSummary, ExportResponse, FilteredRow, LifecycleCriteria, MergeMode,
    MoveDirection, OverrideField, PendingImport, SaveResponse, SortPref, SortSpec,
    StagedImportView, UiPrefs, ValidationReport, DRAFT_CRITERIA_KEY, DRAFT_SORT_KEY, DRAFT_UI_KEY,
};
use crate::schema;
use crate::store::{self, OverrideStore};
use crate::validate::ValidationEngine;
use crate::view;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Default)]
struct EditorState {
    store: OverrideStore,
    step1_to_step2: CriteriaRule,
    step2_to_step3: CriteriaRule,
    loaded_from_draft: bool,
}

// Resets the in-flight flag on every exit path of a save.
struct SaveLock<'a>(&'a AtomicBool);

impl Drop for SaveLock<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct CriteriaCore {
    db: Arc<dyn SettingsPersistence>,
    validator: ValidationEngine,
    imports: ImportManager,
    state: Mutex<EditorState>,
    save_in_flight: AtomicBool,
    app_data_dir: PathBuf,
}

impl CriteriaCore {
    pub fn new(app_data_dir: PathBuf) -> AppResult<Arc<Self>> {
        let db: Arc<dyn SettingsPersistence> =
            Arc::new(Database::new(&app_data_dir.join("console.sqlite3"))?);
        Ok(Arc::new(Self {
            db,
            validator: ValidationEngine::new(),
            imports: ImportManager::new(),
            state: Mutex::new(EditorState::default()),
            save_in_flight: AtomicBool::new(false),
            app_data_dir,
        }))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut EditorState) -> AppResult<T>) -> AppResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::Internal("editor state mutex poisoned".to_string()))?;
        f(&mut state)
    }

    fn snapshot_of(&self, state: &EditorState) -> CriteriaSnapshot {
        CriteriaSnapshot {
            rows: state.store.rows().to_vec(),
            validation: self.validator.validate(state.store.rows()),
            diff: diff::compute_diff(state.store.rows(), state.store.baseline()),
            auto_sort: state.store.auto_sort(),
            sort: state.store.sort_spec(),
            loaded_from_draft: state.loaded_from_draft,
        }
    }

    fn api_client(&self) -> AppResult<ApiClient> {
        let settings = self.db.load_settings()?;
        ApiClient::new(&settings.api_base_url, settings.request_timeout_secs)
    }

    // ─── Load & Save ────────────────────────────────────────────────────

    pub async fn load_criteria(&self) -> AppResult<CriteriaSnapshot> {
        let sort_pref = self.load_sort_pref()?;
        let api = self.api_client()?;

        match api.fetch_lifecycle_criteria().await {
            Ok(payload) => {
                schema::validate_criteria_payload(&payload)?;
                let criteria: LifecycleCriteria = serde_json::from_value(payload)?;
                let rows = store::decode_mapping(&criteria.category_adjusted);
                self.with_state(|state| {
                    state.store.set_baseline(rows.clone());
                    state.store.set_sort_state(sort_pref.auto_sort, sort_pref.sort);
                    state.store.set_rows(rows);
                    state.step1_to_step2 = criteria.step1_to_step2;
                    state.step2_to_step3 = criteria.step2_to_step3;
                    state.loaded_from_draft = false;
                    Ok(self.snapshot_of(state))
                })
            }
            Err(error) => {
                tracing::warn!(error = %error, "criteria load failed, trying local draft");
                let Some(value) = self.db.load_draft(DRAFT_CRITERIA_KEY)? else {
                    return Err(error);
                };
                let draft: CriteriaDraft = serde_json::from_value(value)?;
                self.with_state(|state| {
                    state.store.set_baseline(draft.baseline);
                    state.store.set_sort_state(sort_pref.auto_sort, sort_pref.sort);
                    state.store.set_rows(draft.rows);
                    state.step1_to_step2 = draft.step1_to_step2;
                    state.step2_to_step3 = draft.step2_to_step3;
                    state.loaded_from_draft = true;
                    Ok(self.snapshot_of(state))
                })
            }
        }
    }

    pub async fn save_criteria(&self) -> AppResult<SaveResponse> {
        if self.save_in_flight.swap(true, Ordering::SeqCst) {
            return Err(AppError::Busy("a save is already in flight".to_string()));
        }
        let _lock = SaveLock(&self.save_in_flight);

        let criteria = self.with_state(|state| {
            let report = self.validator.validate(state.store.rows());
            if !report.is_clean() {
                return Err(AppError::Validation(format!(
                    "{} validation error(s) must be fixed before saving",
                    report.errors.len()
                )));
            }
            Ok(LifecycleCriteria {
                step1_to_step2: state.step1_to_step2,
                step2_to_step3: state.step2_to_step3,
                category_adjusted: store::encode_mapping(state.store.rows())?,
            })
        })?;

        let api = self.api_client()?;
        match api.save_lifecycle_criteria(&criteria).await {
            Ok(response) => {
                schema::validate_category_mapping(&response)?;
                let mapping: BTreeMap<String, CriteriaRule> = serde_json::from_value(response)?;
                let saved_rows = store::decode_mapping(&mapping);
                let saved_categories = saved_rows.len();
                self.with_state(|state| {
                    state.store.set_baseline(saved_rows);
                    state.loaded_from_draft = false;
                    Ok(())
                })?;
                self.db.clear_draft(DRAFT_CRITERIA_KEY)?;
                tracing::info!(saved_categories, "lifecycle criteria saved");
                Ok(SaveResponse {
                    success: true,
                    saved_categories,
                })
            }
            Err(error) => {
                self.persist_draft()?;
                tracing::warn!(error = %error, "criteria save failed, edits kept in local draft");
                Err(error)
            }
        }
    }

    fn persist_draft(&self) -> AppResult<()> {
        let draft = self.with_state(|state| {
            Ok(CriteriaDraft {
                rows: state.store.rows().to_vec(),
                baseline: state.store.baseline().to_vec(),
                step1_to_step2: state.step1_to_step2,
                step2_to_step3: state.step2_to_step3,
                saved_at: Utc::now(),
            })
        })?;
        self.db
            .save_draft(DRAFT_CRITERIA_KEY, &serde_json::to_value(&draft)?)
    }

    // ─── Row Operations ─────────────────────────────────────────────────

    pub fn snapshot(&self) -> AppResult<CriteriaSnapshot> {
        self.with_state(|state| Ok(self.snapshot_of(state)))
    }

    pub fn add_row(&self, prepend: bool) -> AppResult<CriteriaSnapshot> {
        self.with_state(|state| {
            state.store.add_row(prepend);
            Ok(self.snapshot_of(state))
        })
    }

    pub fn remove_row(&self, index: usize) -> AppResult<CriteriaSnapshot> {
        self.with_state(|state| {
            state.store.remove_row(index)?;
            Ok(self.snapshot_of(state))
        })
    }

    pub fn duplicate_row(&self, index: usize) -> AppResult<CriteriaSnapshot> {
        self.with_state(|state| {
            state.store.duplicate_row(index)?;
            Ok(self.snapshot_of(state))
        })
    }

    pub fn move_row(&self, index: usize, direction: MoveDirection) -> AppResult<CriteriaSnapshot> {
        let snapshot = self.with_state(|state| {
            state.store.move_row(index, direction)?;
            Ok(self.snapshot_of(state))
        })?;
        self.save_sort_pref(&SortPref {
            auto_sort: snapshot.auto_sort,
            sort: snapshot.sort,
        })?;
        Ok(snapshot)
    }

    pub fn update_field(
        &self,
        index: usize,
        field: OverrideField,
        value: String,
    ) -> AppResult<CriteriaSnapshot> {
        self.with_state(|state| {
            state.store.update_field(index, field, value)?;
            Ok(self.snapshot_of(state))
        })
    }

    pub fn update_row_name(&self, index: usize, name: String) -> AppResult<CriteriaSnapshot> {
        self.with_state(|state| {
            state.store.update_name(index, name)?;
            Ok(self.snapshot_of(state))
        })
    }

    // ─── Sorting, Filtering, Derived Views ──────────────────────────────

    pub fn set_auto_sort(&self, enabled: bool, sort: Option<SortSpec>) -> AppResult<CriteriaSnapshot> {
        let snapshot = self.with_state(|state| {
            state.store.set_sort_state(enabled, sort);
            Ok(self.snapshot_of(state))
        })?;
        self.save_sort_pref(&SortPref {
            auto_sort: snapshot.auto_sort,
            sort: snapshot.sort,
        })?;
        Ok(snapshot)
    }

    pub fn apply_sort(&self, spec: SortSpec) -> AppResult<CriteriaSnapshot> {
        let snapshot = self.with_state(|state| {
            state.store.apply_sort(spec);
            Ok(self.snapshot_of(state))
        })?;
        self.save_sort_pref(&SortPref {
            auto_sort: snapshot.auto_sort,
            sort: snapshot.sort,
        })?;
        Ok(snapshot)
    }

    pub fn query_rows(&self, query: &str, sort: Option<SortSpec>) -> AppResult<Vec<FilteredRow>> {
        self.with_state(|state| Ok(view::query_rows(state.store.rows(), query, sort)))
    }

    pub fn validate_rows(&self) -> AppResult<ValidationReport> {
        self.with_state(|state| Ok(self.validator.validate(state.store.rows())))
    }

    pub fn diff_rows(&self) -> AppResult<DiffSummary> {
        self.with_state(|state| Ok(diff::compute_diff(state.store.rows(), state.store.baseline())))
    }

    pub fn export_rows_json(&self) -> AppResult<Value> {
        self.with_state(|state| Ok(state.store.export_json()))
    }

    // ─── CSV Export & Import Staging ────────────────────────────────────

    pub fn export_csv_text(&self) -> AppResult<String> {
        self.with_state(|state| csv_io::serialize_rows(state.store.rows()))
    }

    pub fn export_csv_file(&self) -> AppResult<ExportResponse> {
        let text = self.export_csv_text()?;
        let exports_dir = self.app_data_dir.join("exports");
        fs::create_dir_all(&exports_dir)?;
        let file_name = format!(
            "lifecycle_category_overrides_{}.csv",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = exports_dir.join(file_name);
        fs::write(&path, text.as_bytes())?;
        Ok(ExportResponse {
            path: path.to_string_lossy().to_string(),
        })
    }

    pub async fn stage_csv_import(
        &self,
        file: CsvFileAttachment,
        mode: MergeMode,
    ) -> AppResult<StagedImportView> {
        let text = csv_io::decode_attachment(&file)?;
        let parsed = csv_io::parse_rows(&text)?;
        for warning in &parsed.warnings {
            tracing::warn!(warning = %warning, file = %file.name, "csv import warning");
        }
        let token = self.imports.stage(parsed.rows.clone(), mode).await;
        Ok(self.staged_view(
            token,
            PendingImport {
                rows: parsed.rows,
                mode,
            },
            parsed.warnings,
        ))
    }

    pub async fn get_staged_import(&self, token: &str) -> AppResult<StagedImportView> {
        let pending = self.imports.get(token).await?;
        Ok(self.staged_view(token.to_string(), pending, Vec::new()))
    }

    pub async fn update_staged_row(
        &self,
        token: &str,
        index: usize,
        field: OverrideField,
        value: String,
    ) -> AppResult<StagedImportView> {
        let pending = self.imports.update_row(token, index, field, value).await?;
        Ok(self.staged_view(token.to_string(), pending, Vec::new()))
    }

    pub async fn update_staged_row_name(
        &self,
        token: &str,
        index: usize,
        name: String,
    ) -> AppResult<StagedImportView> {
        let pending = self.imports.update_row_name(token, index, name).await?;
        Ok(self.staged_view(token.to_string(), pending, Vec::new()))
    }

    pub async fn set_staged_mode(&self, token: &str, mode: MergeMode) -> AppResult<StagedImportView> {
        let pending = self.imports.set_mode(token, mode).await?;
        Ok(self.staged_view(token.to_string(), pending, Vec::new()))
    }

    // Rejected imports stay staged so the operator can fix them in place.
    pub async fn apply_staged_import(&self, token: &str) -> AppResult<CriteriaSnapshot> {
        let staged = self.imports.get(token).await?;
        let report = self.validator.validate(&staged.rows);
        if !report.is_clean() {
            return Err(AppError::Validation(format!(
                "staged import has {} validation error(s)",
                report.errors.len()
            )));
        }

        let staged = self.imports.take(token).await?;
        tracing::info!(mode = staged.mode.as_str(), rows = staged.rows.len(), "staged import applied");
        self.with_state(|state| {
            state.store.apply_import(staged.rows, staged.mode);
            Ok(self.snapshot_of(state))
        })
    }

    pub async fn cancel_staged_import(&self, token: &str) -> AppResult<BooleanResponse> {
        Ok(BooleanResponse {
            success: self.imports.cancel(token).await,
        })
    }

    fn staged_view(
        &self,
        token: String,
        pending: PendingImport,
        warnings: Vec<String>,
    ) -> StagedImportView {
        StagedImportView {
            validation: self.validator.validate(&pending.rows),
            token,
            mode: pending.mode,
            rows: pending.rows,
            warnings,
        }
    }

    // ─── Preferences, Settings, Maintenance ─────────────────────────────

    fn load_sort_pref(&self) -> AppResult<SortPref> {
        Ok(self
            .db
            .load_draft(DRAFT_SORT_KEY)?
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default())
    }

    fn save_sort_pref(&self, pref: &SortPref) -> AppResult<()> {
        self.db.save_draft(DRAFT_SORT_KEY, &serde_json::to_value(pref)?)
    }

    pub fn get_ui_prefs(&self) -> AppResult<UiPrefs> {
        Ok(self
            .db
            .load_draft(DRAFT_UI_KEY)?
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default())
    }

    pub fn save_ui_prefs(&self, prefs: UiPrefs) -> AppResult<BooleanResponse> {
        self.db.save_draft(DRAFT_UI_KEY, &serde_json::to_value(&prefs)?)?;
        Ok(BooleanResponse { success: true })
    }

    pub fn get_settings(&self) -> AppResult<ConsoleSettings> {
        self.db.load_settings()
    }

    pub fn update_settings(&self, settings: ConsoleSettings) -> AppResult<ConsoleSettings> {
        if settings.api_base_url.trim().is_empty() {
            return Err(AppError::Validation("apiBaseUrl cannot be empty".to_string()));
        }
        if settings.request_timeout_secs == 0
            || settings.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS
        {
            return Err(AppError::Validation(format!(
                "requestTimeoutSecs must be within 1..={}",
                MAX_REQUEST_TIMEOUT_SECS
            )));
        }
        self.db.save_settings(&settings)?;
        Ok(settings)
    }

    pub fn run_draft_retention(&self) -> AppResult<usize> {
        let settings = self.db.load_settings()?;
        let pruned = self.db.prune_drafts_older_than(settings.draft_retention_days)?;
        if pruned > 0 {
            tracing::info!(pruned, "stale drafts pruned");
        }
        Ok(pruned)
    }
}
