use std::path::{Path, PathBuf};
use std::sync::Arc;

use parley_engine::{History, HistoryConfig};
use parley_storage::{Database, DatabaseConfig, StorageError};
use tempfile::TempDir;

/// A `History` backed by a database file in a private temporary directory.
pub struct TestHistory {
    pub history: History,
    path: PathBuf,
    _dir: TempDir,
}

impl TestHistory {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(HistoryConfig::default())
    }

    pub fn with_config(config: HistoryConfig) -> Result<Self, StorageError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history.db");
        let history = open(&path, config)?;
        Ok(Self {
            history,
            path,
            _dir: dir,
        })
    }

    /// Opens a history on a file that tests may have seeded directly.
    pub fn at(dir: TempDir, path: PathBuf) -> Result<Self, StorageError> {
        let history = open(&path, HistoryConfig::default())?;
        Ok(Self {
            history,
            path,
            _dir: dir,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the database and opens it again, as after an application restart.
    pub fn reopen(&mut self) -> Result<(), StorageError> {
        let config = self.history.config().clone();
        // Drop the old handle first so its worker finishes the backlog.
        self.history = History::unavailable(config.clone());
        self.history = open(&self.path, config)?;
        Ok(())
    }

    /// A separate connection for inspecting rows behind the engine's back.
    /// Call `history.sync()` first so queued writes are visible.
    pub fn inspect(&self) -> rusqlite::Result<rusqlite::Connection> {
        rusqlite::Connection::open(&self.path)
    }

    pub fn count(&self, table: &str) -> rusqlite::Result<i64> {
        self.inspect()?
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
    }
}

fn open(path: &Path, config: HistoryConfig) -> Result<History, StorageError> {
    let db = Database::open_with(&DatabaseConfig {
        path: Some(path.to_path_buf()),
    })?;
    Ok(History::new(Arc::new(db), config))
}
