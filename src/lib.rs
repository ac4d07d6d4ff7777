pub mod api;
pub mod core;
pub mod csv_io;
pub mod db;
pub mod diff;
pub mod errors;
pub mod import;
pub mod models;
pub mod schema;
pub mod store;
pub mod validate;
pub mod view;

use crate::core::CriteriaCore;
use crate::models::{
    BooleanResponse, ConsoleSettings, CriteriaSnapshot, CsvFileAttachment, DiffSummary,
    ExportResponse, FilteredRow, MergeMode, MoveDirection, OverrideField, SaveResponse, SortSpec,
    StagedImportView, UiPrefs, ValidationReport,
};
use std::path::Path;
use std::sync::Arc;
use tauri::Manager;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

#[derive(Clone)]
struct AppState {
    core: Arc<CriteriaCore>,
}

#[tauri::command]
async fn load_criteria(state: tauri::State<'_, AppState>) -> Result<CriteriaSnapshot, String> {
    state.core.load_criteria().await.map_err(to_client_error)
}

#[tauri::command]
async fn save_criteria(state: tauri::State<'_, AppState>) -> Result<SaveResponse, String> {
    state.core.save_criteria().await.map_err(to_client_error)
}

#[tauri::command]
fn get_snapshot(state: tauri::State<'_, AppState>) -> Result<CriteriaSnapshot, String> {
    state.core.snapshot().map_err(to_client_error)
}

#[tauri::command]
fn add_row(
    state: tauri::State<'_, AppState>,
    prepend: Option<bool>,
) -> Result<CriteriaSnapshot, String> {
    state.core.add_row(prepend.unwrap_or(false)).map_err(to_client_error)
}

#[tauri::command]
fn remove_row(state: tauri::State<'_, AppState>, index: usize) -> Result<CriteriaSnapshot, String> {
    state.core.remove_row(index).map_err(to_client_error)
}

#[tauri::command]
fn duplicate_row(state: tauri::State<'_, AppState>, index: usize) -> Result<CriteriaSnapshot, String> {
    state.core.duplicate_row(index).map_err(to_client_error)
}

#[tauri::command]
fn move_row(
    state: tauri::State<'_, AppState>,
    index: usize,
    direction: MoveDirection,
) -> Result<CriteriaSnapshot, String> {
    state.core.move_row(index, direction).map_err(to_client_error)
}

#[tauri::command]
fn update_field(
    state: tauri::State<'_, AppState>,
    index: usize,
    field: OverrideField,
    value: String,
) -> Result<CriteriaSnapshot, String> {
    state.core.update_field(index, field, value).map_err(to_client_error)
}

#[tauri::command]
fn update_row_name(
    state: tauri::State<'_, AppState>,
    index: usize,
    name: String,
) -> Result<CriteriaSnapshot, String> {
    state.core.update_row_name(index, name).map_err(to_client_error)
}

#[tauri::command]
fn set_auto_sort(
    state: tauri::State<'_, AppState>,
    enabled: bool,
    sort: Option<SortSpec>,
) -> Result<CriteriaSnapshot, String> {
    state.core.set_auto_sort(enabled, sort).map_err(to_client_error)
}

#[tauri::command]
fn apply_sort(state: tauri::State<'_, AppState>, sort: SortSpec) -> Result<CriteriaSnapshot, String> {
    state.core.apply_sort(sort).map_err(to_client_error)
}

#[tauri::command]
fn query_rows(
    state: tauri::State<'_, AppState>,
    query: Option<String>,
    sort: Option<SortSpec>,
) -> Result<Vec<FilteredRow>, String> {
    state
        .core
        .query_rows(query.as_deref().unwrap_or(""), sort)
        .map_err(to_client_error)
}

#[tauri::command]
fn validate_rows(state: tauri::State<'_, AppState>) -> Result<ValidationReport, String> {
    state.core.validate_rows().map_err(to_client_error)
}

#[tauri::command]
fn diff_rows(state: tauri::State<'_, AppState>) -> Result<DiffSummary, String> {
    state.core.diff_rows().map_err(to_client_error)
}

#[tauri::command]
fn export_rows_json(state: tauri::State<'_, AppState>) -> Result<serde_json::Value, String> {
    state.core.export_rows_json().map_err(to_client_error)
}

#[tauri::command]
fn export_overrides_csv(state: tauri::State<'_, AppState>) -> Result<String, String> {
    state.core.export_csv_text().map_err(to_client_error)
}

#[tauri::command]
fn export_overrides_file(state: tauri::State<'_, AppState>) -> Result<ExportResponse, String> {
    state.core.export_csv_file().map_err(to_client_error)
}

#[tauri::command]
async fn stage_csv_import(
    state: tauri::State<'_, AppState>,
    file: CsvFileAttachment,
    mode: MergeMode,
) -> Result<StagedImportView, String> {
    state.core.stage_csv_import(file, mode).await.map_err(to_client_error)
}

#[tauri::command]
async fn get_staged_import(
    state: tauri::State<'_, AppState>,
    token: String,
) -> Result<StagedImportView, String> {
    state.core.get_staged_import(&token).await.map_err(to_client_error)
}

#[tauri::command]
async fn update_staged_row(
    state: tauri::State<'_, AppState>,
    token: String,
    index: usize,
    field: OverrideField,
    value: String,
) -> Result<StagedImportView, String> {
    state
        .core
        .update_staged_row(&token, index, field, value)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
async fn update_staged_row_name(
    state: tauri::State<'_, AppState>,
    token: String,
    index: usize,
    name: String,
) -> Result<StagedImportView, String> {
    state
        .core
        .update_staged_row_name(&token, index, name)
        .await
        .map_err(to_client_error)
}

#[tauri::command]
async fn set_staged_mode(
    state: tauri::State<'_, AppState>,
    token: String,
    mode: MergeMode,
) -> Result<StagedImportView, String> {
    state.core.set_staged_mode(&token, mode).await.map_err(to_client_error)
}

#[tauri::command]
async fn apply_staged_import(
    state: tauri::State<'_, AppState>,
    token: String,
) -> Result<CriteriaSnapshot, String> {
    state.core.apply_staged_import(&token).await.map_err(to_client_error)
}

#[tauri::command]
async fn cancel_staged_import(
    state: tauri::State<'_, AppState>,
    token: String,
) -> Result<BooleanResponse, String> {
    state.core.cancel_staged_import(&token).await.map_err(to_client_error)
}

#[tauri::command]
fn get_ui_prefs(state: tauri::State<'_, AppState>) -> Result<UiPrefs, String> {
    state.core.get_ui_prefs().map_err(to_client_error)
}

#[tauri::command]
fn save_ui_prefs(state: tauri::State<'_, AppState>, prefs: UiPrefs) -> Result<BooleanResponse, String> {
    state.core.save_ui_prefs(prefs).map_err(to_client_error)
}

#[tauri::command]
fn get_settings(state: tauri::State<'_, AppState>) -> Result<ConsoleSettings, String> {
    state.core.get_settings().map_err(to_client_error)
}

#[tauri::command]
fn update_settings(
    state: tauri::State<'_, AppState>,
    settings: ConsoleSettings,
) -> Result<ConsoleSettings, String> {
    state.core.update_settings(settings).map_err(to_client_error)
}

pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(|error| error.to_string())?;
            std::fs::create_dir_all(&app_data_dir).map_err(|error| error.to_string())?;
            init_tracing(&app_data_dir).map_err(|error| error.to_string())?;

            let core = CriteriaCore::new(app_data_dir).map_err(|error| error.to_string())?;

            tauri::async_runtime::spawn({
                let core = core.clone();
                async move {
                    let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
                    loop {
                        interval.tick().await;
                        if let Err(error) = core.run_draft_retention() {
                            tracing::warn!(error = %error, "draft retention failed");
                        }
                    }
                }
            });

            app.manage(AppState { core });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            load_criteria,
            save_criteria,
            get_snapshot,
            add_row,
            remove_row,
            duplicate_row,
            move_row,
            update_field,
            update_row_name,
            set_auto_sort,
            apply_sort,
            query_rows,
            validate_rows,
            diff_rows,
            export_rows_json,
            export_overrides_csv,
            export_overrides_file,
            stage_csv_import,
            get_staged_import,
            update_staged_row,
            update_staged_row_name,
            set_staged_mode,
            apply_staged_import,
            cancel_staged_import,
            get_ui_prefs,
            save_ui_prefs,
            get_settings,
            update_settings
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}

fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "console.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

fn to_client_error(error: impl std::fmt::Display) -> String {
    error.to_string()
}
