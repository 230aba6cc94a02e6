use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

/// Local SQLite store. Only client preferences live here; conversations are
/// owned by the server.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new() -> Result<Self> {
        let path = Self::db_path()?;
        task::spawn_blocking(move || Self::open(path)).await?
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        tracing::debug!(path = %path.display(), "database ready");
        Ok(db)
    }

    /// Create an in-memory database (used for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn db_path() -> Result<PathBuf> {
        let data_dir = match std::env::var_os("XDG_DATA_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var_os("HOME")
                    .ok_or_else(|| anyhow!("Neither XDG_DATA_HOME nor HOME is set"))?;
                PathBuf::from(home).join(".local/share")
            }
        };
        Ok(data_dir.join("aura").join("aura.db"))
    }

    fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
        conn.lock().map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = Self::lock(&self.conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    // --- Settings ---

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let result: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(result)
        })
        .await?
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(db.get_setting("missing").await.unwrap(), None);
        // Migrations are idempotent.
        db.run_migrations().unwrap();
    }

    #[tokio::test]
    async fn test_settings_crud() {
        let db = Database::new_in_memory().unwrap();

        db.set_setting("theme", "dark").await.unwrap();
        assert_eq!(db.get_setting("theme").await.unwrap().as_deref(), Some("dark"));

        db.set_setting("theme", "light").await.unwrap();
        assert_eq!(db.get_setting("theme").await.unwrap().as_deref(), Some("light"));

        db.delete_setting("theme").await.unwrap();
        assert_eq!(db.get_setting("theme").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = std::env::temp_dir().join(format!("aura-db-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("aura.db");

        let db = Database::open(path.clone()).unwrap();
        db.set_setting("k", "v").await.unwrap();
        drop(db);

        let db = Database::open(path).unwrap();
        assert_eq!(db.get_setting("k").await.unwrap().as_deref(), Some("v"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
