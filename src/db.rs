use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Small durable store for engine metadata, keyed by `(namespace, key)`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    fn delete(&self, namespace: &str, key: &str) -> Result<()>;
}

pub fn store_json<T: Serialize>(store: &dyn KeyValueStore, namespace: &str, key: &str, value: &T) -> Result<()> {
    store.put(namespace, key, &serde_json::to_string(value)?)
}

/// `Ok(None)` when the record is missing; `Err` when it exists but does not parse.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, namespace: &str, key: &str) -> Result<Option<T>> {
    match store.get(namespace, key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Database { conn: Mutex::new(conn) };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (namespace, key)
            )",
            [],
        )?;

        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE namespace = ?1 AND key = ?2")?;
        let value = stmt.query_row([namespace, key], |row| row.get(0)).optional()?;
        Ok(value)
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv_store (namespace, key, value, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)",
            [namespace, key, value],
        )?;

        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM kv_store WHERE namespace = ?1 AND key = ?2",
            [namespace, key],
        )?;

        Ok(())
    }
}
