use std::path::PathBuf;
use thiserror::Error;

pub mod kv;
pub mod model;
pub mod store;

pub use kv::{JsonFileKv, KeyValueStore, MemoryKv, SqliteKv};
pub use model::{Frame, FrameId, Project, ProjectId};
pub use store::{ProjectStore, PROJECTS_KEY};

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::env::temp_dir());
    base.join("mangastrip")
}

/// Default location of the SQLite project database.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("projects.db")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
