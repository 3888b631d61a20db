use crate::StoreError;
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// String key/value persistence port.
///
/// `ProjectStore` keeps the whole project list under a single key, so a
/// backend only needs whole-value reads and overwrites.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError>;
}

/// In-process store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one value.
    pub fn with_value(key: &str, value: &str) -> Self {
        let kv = Self::new();
        kv.entries.lock().insert(key.to_string(), value.to_string());
        kv
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A single JSON object file mapping keys to string values.
#[derive(Debug, Clone)]
pub struct JsonFileKv {
    path: PathBuf,
}

impl JsonFileKv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> std::result::Result<HashMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(HashMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl KeyValueStore for JsonFileKv {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(StoreError::Serialization(err)) => {
                tracing::warn!(
                    target: "store",
                    "Overwriting unreadable store file {:?}: {}",
                    self.path,
                    err
                );
                HashMap::new()
            }
            Err(err) => return Err(err),
        };
        map.insert(key.to_string(), value.to_string());
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        // Write next to the target and rename so readers never see half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// SQLite-backed store with a single `kv` table.
pub struct SqliteKv {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteKv {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM kv WHERE key = ?1 LIMIT 1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        self.conn.lock().execute(
            "INSERT INTO kv(key, value, updated_at) VALUES(?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(include_str!("../migrations/V0001__kv.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__kv"],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_entries() {
        let kv = MemoryKv::new();
        let other = kv.clone();
        kv.set("k", "v").unwrap();
        assert_eq!(other.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(other.get("missing").unwrap(), None);
    }

    #[test]
    fn json_file_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let kv = JsonFileKv::new(dir.path().join("nested").join("store.json"));
        assert_eq!(kv.get("k").unwrap(), None);
        kv.set("k", "first").unwrap();
        kv.set("other", "x").unwrap();
        kv.set("k", "second").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("second"));
        assert_eq!(kv.get("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn json_file_reports_corruption_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        let kv = JsonFileKv::new(&path);
        assert!(matches!(kv.get("k"), Err(StoreError::Serialization(_))));
        // A write replaces the unreadable file.
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn sqlite_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.db");
        {
            let kv = SqliteKv::open_or_create(&path).unwrap();
            kv.set("k", "first").unwrap();
            kv.set("k", "second").unwrap();
        }
        let reopened = SqliteKv::open_or_create(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("second"));
        assert_eq!(reopened.get("missing").unwrap(), None);
    }

    #[test]
    fn sqlite_connection_is_shared_between_threads() {
        let kv = Arc::new(SqliteKv::in_memory().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let kv = Arc::clone(&kv);
                std::thread::spawn(move || kv.set(&format!("k{i}"), &i.to_string()).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for i in 0..4 {
            assert_eq!(kv.get(&format!("k{i}")).unwrap(), Some(i.to_string()));
        }
    }
}
