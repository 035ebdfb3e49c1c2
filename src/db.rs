use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::models::ItemId;

/// Durable key → ID-sequence storage for the interaction sets.
pub trait InteractionStore {
    /// Stored sequence for `key`, empty if nothing was ever written.
    fn get(&self, key: &str) -> Result<Vec<ItemId>>;

    /// Replaces the whole sequence stored under `key`.
    fn set(&self, key: &str, ids: &[ItemId]) -> Result<()>;
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (creating if needed) `interactions.db` inside `data_dir`.
    pub fn open_in_dir(data_dir: &Path) -> Result<Self> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        }
        Self::open(&data_dir.join("interactions.db"))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS interactions (
                key TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (key, item_id)
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl InteractionStore for Database {
    fn get(&self, key: &str) -> Result<Vec<ItemId>> {
        let conn = self.conn.lock().map_err(|_| anyhow!("Failed to lock database connection"))?;
        let mut stmt = conn.prepare(
            "SELECT item_id FROM interactions WHERE key = ?1 ORDER BY position ASC",
        )?;

        let rows = stmt.query_map(params![key], |row| row.get::<_, i64>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row? as ItemId);
        }
        Ok(ids)
    }

    fn set(&self, key: &str, ids: &[ItemId]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| anyhow!("Failed to lock database connection"))?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM interactions WHERE key = ?1", params![key])?;
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO interactions (key, item_id, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, id) in ids.iter().enumerate() {
                insert.execute(params![key, *id as i64, position as i64])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Volatile store for headless runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<ItemId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<ItemId>> {
        let values = self.values.lock().map_err(|_| anyhow!("Failed to lock memory store"))?;
        Ok(values.get(key).cloned().unwrap_or_default())
    }

    fn set(&self, key: &str, ids: &[ItemId]) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("Failed to lock memory store"))?;
        values.insert(key.to_string(), ids.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_reads_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get("starredStories").unwrap().is_empty());
    }

    #[test]
    fn set_replaces_and_keeps_order() {
        let db = Database::open_in_memory().unwrap();
        db.set("readStories", &[30, 10, 20]).unwrap();
        assert_eq!(db.get("readStories").unwrap(), vec![30, 10, 20]);

        db.set("readStories", &[20]).unwrap();
        assert_eq!(db.get("readStories").unwrap(), vec![20]);
        assert!(db.get("hiddenStories").unwrap().is_empty());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::open_in_dir(dir.path()).unwrap();
            db.set("hiddenStories", &[7, 8]).unwrap();
        }
        let db = Database::open_in_dir(dir.path()).unwrap();
        assert_eq!(db.get("hiddenStories").unwrap(), vec![7, 8]);
    }
}
