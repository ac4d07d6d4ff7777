use crate::errors::{AppError, AppResult};
use crate::models::{MergeMode, OverrideField, OverrideRow, PendingImport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

// Staged imports live here until the operator applies or cancels them; the
// live store is never touched before an explicit apply.
#[derive(Clone, Default)]
pub struct ImportManager {
    staged: Arc<Mutex<HashMap<String, PendingImport>>>,
}

impl ImportManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stage(&self, rows: Vec<OverrideRow>, mode: MergeMode) -> String {
        let token = Uuid::new_v4().to_string();
        let mut staged = self.staged.lock().await;
        staged.insert(token.clone(), PendingImport { rows, mode });
        token
    }

    pub async fn get(&self, token: &str) -> AppResult<PendingImport> {
        let staged = self.staged.lock().await;
        staged
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("no staged import for token {}", token)))
    }

    pub async fn update_row(
        &self,
        token: &str,
        index: usize,
        field: OverrideField,
        value: String,
    ) -> AppResult<PendingImport> {
        let mut staged = self.staged.lock().await;
        let Some(pending) = staged.get_mut(token) else {
            return Err(AppError::NotFound(format!("no staged import for token {}", token)));
        };
        let Some(row) = pending.rows.get_mut(index) else {
            return Err(AppError::NotFound(format!(
                "no staged row at index {} for token {}",
                index, token
            )));
        };
        row.set_field(field, value);
        Ok(pending.clone())
    }

    pub async fn update_row_name(&self, token: &str, index: usize, name: String) -> AppResult<PendingImport> {
        let mut staged = self.staged.lock().await;
        let Some(pending) = staged.get_mut(token) else {
            return Err(AppError::NotFound(format!("no staged import for token {}", token)));
        };
        let Some(row) = pending.rows.get_mut(index) else {
            return Err(AppError::NotFound(format!(
                "no staged row at index {} for token {}",
                index, token
            )));
        };
        row.name = name;
        Ok(pending.clone())
    }

    pub async fn set_mode(&self, token: &str, mode: MergeMode) -> AppResult<PendingImport> {
        let mut staged = self.staged.lock().await;
        let Some(pending) = staged.get_mut(token) else {
            return Err(AppError::NotFound(format!("no staged import for token {}", token)));
        };
        pending.mode = mode;
        Ok(pending.clone())
    }

    pub async fn take(&self, token: &str) -> AppResult<PendingImport> {
        let mut staged = self.staged.lock().await;
        staged
            .remove(token)
            .ok_or_else(|| AppError::NotFound(format!("no staged import for token {}", token)))
    }

    pub async fn cancel(&self, token: &str) -> bool {
        let mut staged = self.staged.lock().await;
        staged.remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::ImportManager;
    use crate::models::{MergeMode, OverrideField, OverrideRow};

    fn row(name: &str) -> OverrideRow {
        OverrideRow {
            name: name.to_string(),
            ..OverrideRow::default()
        }
    }

    #[tokio::test]
    async fn staged_imports_are_isolated_until_taken() {
        let manager = ImportManager::new();
        let token = manager.stage(vec![row("패션의류")], MergeMode::Merge).await;

        let pending = manager.get(&token).await.expect("staged import");
        assert_eq!(pending.rows.len(), 1);
        assert_eq!(pending.mode, MergeMode::Merge);

        let updated = manager
            .update_row(&token, 0, OverrideField::MinSales, "4".to_string())
            .await
            .expect("update staged row");
        assert_eq!(updated.rows[0].min_sales, "4");

        let switched = manager.set_mode(&token, MergeMode::Replace).await.expect("set mode");
        assert_eq!(switched.mode, MergeMode::Replace);

        let taken = manager.take(&token).await.expect("take");
        assert_eq!(taken.rows[0].min_sales, "4");
        assert!(manager.get(&token).await.is_err());
    }

    #[tokio::test]
    async fn cancel_discards_the_staged_rows() {
        let manager = ImportManager::new();
        let token = manager.stage(vec![row("가전제품")], MergeMode::Replace).await;

        assert!(manager.cancel(&token).await);
        assert!(!manager.cancel(&token).await);
        assert!(manager.get(&token).await.is_err());
    }
}
