use base64::Engine;
use dropship_console_lib::core::CriteriaCore;
use dropship_console_lib::csv_io;
use dropship_console_lib::models::{CsvFileAttachment, MergeMode, OverrideField};
use std::sync::Arc;

fn new_core(dir: &tempfile::TempDir) -> Arc<CriteriaCore> {
    CriteriaCore::new(dir.path().to_path_buf()).expect("core")
}

fn attachment(text: &str) -> CsvFileAttachment {
    let payload = base64::engine::general_purpose::STANDARD.encode(text);
    CsvFileAttachment {
        name: "lifecycle_category_overrides.csv".to_string(),
        mime_type: "text/csv".to_string(),
        size: text.len() as u64,
        data_url: format!("data:text/csv;base64,{}", payload),
    }
}

#[tokio::test]
async fn csv_import_flow_from_staging_to_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = new_core(&dir);

    core.add_row(false).expect("add row");
    core.update_row_name(0, "패션의류".to_string()).expect("name");
    core.update_field(0, OverrideField::MinSales, "1".to_string())
        .expect("field");

    let staged = core
        .stage_csv_import(
            attachment("name,min_sales\n패션의류,2\n가전제품,3\n"),
            MergeMode::Merge,
        )
        .await
        .expect("stage import");
    assert_eq!(staged.rows.len(), 2);
    assert!(staged.validation.errors.is_empty());

    // The live store is untouched while the import is only staged.
    let snapshot = core.snapshot().expect("snapshot");
    assert_eq!(snapshot.rows.len(), 1);
    assert_eq!(snapshot.rows[0].min_sales, "1");

    let snapshot = core
        .apply_staged_import(&staged.token)
        .await
        .expect("apply import");
    assert_eq!(snapshot.rows.len(), 2);
    assert_eq!(snapshot.rows[0].name, "패션의류");
    assert_eq!(snapshot.rows[0].min_sales, "2");
    assert_eq!(snapshot.rows[1].name, "가전제품");
    assert_eq!(snapshot.rows[1].min_sales, "3");

    // Nothing has been saved yet, so everything diffs as added.
    assert_eq!(snapshot.diff.added.len(), 2);
    assert!(snapshot.diff.removed.is_empty());

    // The token is consumed by a successful apply.
    assert!(core.apply_staged_import(&staged.token).await.is_err());
}

#[tokio::test]
async fn invalid_staged_import_is_rejected_until_fixed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = new_core(&dir);

    let staged = core
        .stage_csv_import(
            attachment("name,min_ctr\n패션의류,1.5\n"),
            MergeMode::Replace,
        )
        .await
        .expect("stage import");
    assert!(!staged.validation.errors.is_empty());

    let error = core
        .apply_staged_import(&staged.token)
        .await
        .expect_err("apply must be rejected");
    assert!(error.to_string().starts_with("VALIDATION_FAILED"));

    // Rejection keeps the staged rows around for fixing in place.
    let fixed = core
        .update_staged_row(&staged.token, 0, OverrideField::MinCtr, "0.5".to_string())
        .await
        .expect("fix staged row");
    assert!(fixed.validation.errors.is_empty());

    let snapshot = core
        .apply_staged_import(&staged.token)
        .await
        .expect("apply fixed import");
    assert_eq!(snapshot.rows.len(), 1);
    assert_eq!(snapshot.rows[0].min_ctr, "0.5");
}

#[tokio::test]
async fn cancel_discards_the_staged_import_without_touching_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = new_core(&dir);

    let staged = core
        .stage_csv_import(attachment("name,min_sales\n가전제품,3\n"), MergeMode::Merge)
        .await
        .expect("stage import");

    let canceled = core
        .cancel_staged_import(&staged.token)
        .await
        .expect("cancel");
    assert!(canceled.success);
    assert!(core.get_staged_import(&staged.token).await.is_err());

    let snapshot = core.snapshot().expect("snapshot");
    assert!(snapshot.rows.is_empty());
}

#[test]
fn exported_csv_reimports_equivalently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = new_core(&dir);

    core.add_row(false).expect("add row");
    core.update_row_name(0, "패션의류".to_string()).expect("name");
    core.update_field(0, OverrideField::MinSales, "3".to_string())
        .expect("field");
    core.update_field(0, OverrideField::MinCtr, "0.2".to_string())
        .expect("field");

    let text = core.export_csv_text().expect("export");
    assert!(text.starts_with('\u{feff}'));

    let parsed = csv_io::parse_rows(&text).expect("reimport");
    assert_eq!(parsed.rows.len(), 1);
    assert_eq!(parsed.rows[0].name, "패션의류");
    assert_eq!(parsed.rows[0].min_sales, "3");
    assert_eq!(parsed.rows[0].min_ctr, "0.2");
    assert_eq!(parsed.rows[0].min_views, "");
}

#[test]
fn csv_file_export_lands_under_the_app_data_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let core = new_core(&dir);

    core.add_row(false).expect("add row");
    core.update_row_name(0, "가전제품".to_string()).expect("name");
    core.update_field(0, OverrideField::MinRevenue, "100000".to_string())
        .expect("field");

    let exported = core.export_csv_file().expect("export file");
    assert!(exported.path.contains("lifecycle_category_overrides_"));
    let written = std::fs::read_to_string(&exported.path).expect("exported file");
    assert!(written.contains("가전제품"));
}
