use crate::errors::{AppError, AppResult};
use crate::models::ConsoleSettings;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");
const SETTINGS_KEY: &str = "console";

// Persistence port for the settings page: swap the backend without touching
// the editor core.
pub trait SettingsPersistence: Send + Sync {
    fn load_settings(&self) -> AppResult<ConsoleSettings>;
    fn save_settings(&self, settings: &ConsoleSettings) -> AppResult<()>;
    fn load_draft(&self, key: &str) -> AppResult<Option<Value>>;
    fn save_draft(&self, key: &str, payload: &Value) -> AppResult<()>;
    fn clear_draft(&self, key: &str) -> AppResult<()>;
    fn prune_drafts_older_than(&self, days: u32) -> AppResult<usize>;
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let defaults = serde_json::to_string(&ConsoleSettings::default())?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO app_settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
            params![SETTINGS_KEY, defaults, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl SettingsPersistence for Database {
    fn load_settings(&self) -> AppResult<ConsoleSettings> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM app_settings WHERE key = ?1",
                params![SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(ConsoleSettings::default()),
        }
    }

    fn save_settings(&self, settings: &ConsoleSettings) -> AppResult<()> {
        let raw = serde_json::to_string(settings)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
            params![SETTINGS_KEY, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn load_draft(&self, key: &str) -> AppResult<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM drafts WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_draft(&self, key: &str, payload: &Value) -> AppResult<()> {
        let raw = serde_json::to_string(payload)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO drafts (key, payload_json, updated_at) VALUES (?1, ?2, ?3)",
            params![key, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn clear_draft(&self, key: &str) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM drafts WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn prune_drafts_older_than(&self, days: u32) -> AppResult<usize> {
        let cutoff = (Utc::now() - Duration::days(i64::from(days))).to_rfc3339();
        let conn = self.lock()?;
        let pruned = conn.execute("DELETE FROM drafts WHERE updated_at < ?1", params![cutoff])?;
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::{Database, SettingsPersistence};
    use crate::models::{ConsoleSettings, DRAFT_CRITERIA_KEY};

    fn open_db(dir: &tempfile::TempDir) -> Database {
        Database::new(&dir.path().join("console.sqlite3")).expect("open database")
    }

    #[test]
    fn seeds_default_settings_on_first_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);
        let settings = db.load_settings().expect("settings");
        assert_eq!(settings.api_base_url, ConsoleSettings::default().api_base_url);
    }

    #[test]
    fn settings_roundtrip_overwrites_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);

        let mut settings = db.load_settings().expect("settings");
        settings.api_base_url = "http://10.0.0.5:9000".to_string();
        settings.draft_retention_days = 7;
        db.save_settings(&settings).expect("save settings");

        let reloaded = db.load_settings().expect("reload");
        assert_eq!(reloaded.api_base_url, "http://10.0.0.5:9000");
        assert_eq!(reloaded.draft_retention_days, 7);
    }

    #[test]
    fn drafts_roundtrip_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);

        assert!(db.load_draft(DRAFT_CRITERIA_KEY).expect("empty").is_none());

        let payload = serde_json::json!({ "rows": [{ "name": "패션의류", "minSales": "2" }] });
        db.save_draft(DRAFT_CRITERIA_KEY, &payload).expect("save draft");

        let loaded = db.load_draft(DRAFT_CRITERIA_KEY).expect("load").expect("present");
        assert_eq!(loaded, payload);

        db.clear_draft(DRAFT_CRITERIA_KEY).expect("clear");
        assert!(db.load_draft(DRAFT_CRITERIA_KEY).expect("empty again").is_none());
    }

    #[test]
    fn retention_prunes_only_stale_drafts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = open_db(&dir);

        db.save_draft("fresh", &serde_json::json!({"keep": true}))
            .expect("save fresh");
        let pruned = db.prune_drafts_older_than(30).expect("prune");
        assert_eq!(pruned, 0);
        assert!(db.load_draft("fresh").expect("fresh").is_some());
    }
}
