use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use parley_core::{MessageId, PeerId};
use parley_storage::query::{int, text};
use parley_storage::{Database, DatabaseConfig, Executor, Query, SchemaStatus, Value, schema};
use tracing::{debug, warn};

use crate::config::HistoryConfig;
use crate::error::EngineError;
use crate::files::{FileInfo, Inbox};
use crate::peers::PeerCache;

/// Receives the row id of an inserted history message.
pub type MessageIdCallback = Box<dyn FnOnce(MessageId) + Send + 'static>;

/// Chat history stored in the profile database.
///
/// All writes go through the executor's ordered queue; reads and erases block
/// until the queue has caught up. The peer cache and the pending file links
/// are only touched through `&mut self`.
///
/// File links are completed by events that only this handle can process.
/// Every operation handles the events posted so far, so a file message read
/// right after it was added may still show as empty text. Call
/// [`History::sync`] to settle all outstanding links.
pub struct History<D: Executor = Database> {
    db: Option<Arc<D>>,
    pub(crate) peers: PeerCache,
    pub(crate) file_infos: HashMap<String, FileInfo>,
    pub(crate) inbox: Arc<Inbox>,
    pub(crate) config: HistoryConfig,
}

impl History<Database> {
    /// Opens the database described by `db_config`. A failure leaves the
    /// history in the unavailable state rather than returning an error.
    pub fn open(db_config: &DatabaseConfig, config: HistoryConfig) -> Self {
        match Database::open_with(db_config) {
            Ok(db) => Self::new(Arc::new(db), config),
            Err(e) => {
                warn!(error = %e, "failed to open history database");
                Self::unavailable(config)
            }
        }
    }
}

impl<D: Executor> History<D> {
    pub fn new(db: Arc<D>, config: HistoryConfig) -> Self {
        let mut history = Self::unavailable(config);
        if !db.is_open() {
            warn!("database not open, history init failed");
            return history;
        }

        match schema::upgrade(db.as_ref()) {
            Ok(SchemaStatus::TooNew { found }) => {
                // Unknown future layout: refuse to touch it until the app is upgraded.
                warn!(found, "history disabled, database was written by a newer version");
                return history;
            }
            Ok(status) => debug!(?status, "history schema ready"),
            Err(e) => {
                warn!(error = %e, "history schema upgrade failed");
                return history;
            }
        }

        history.db = Some(db);
        if let Err(e) = history.load_peers() {
            warn!(error = %e, "failed to load peer cache");
            history.db = None;
        }
        history
    }

    /// A history with no backing store; every operation is a no-op.
    pub fn unavailable(config: HistoryConfig) -> Self {
        Self {
            db: None,
            peers: PeerCache::default(),
            file_infos: HashMap::new(),
            inbox: Arc::default(),
            config,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.db.as_ref().is_some_and(|db| db.is_open())
    }

    pub(crate) fn valid_db(&self) -> Option<Arc<D>> {
        self.db.as_ref().filter(|db| db.is_open()).cloned()
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn peers(&self) -> &PeerCache {
        &self.peers
    }

    /// Cached id of a peer, without allocating.
    pub fn peer_id(&self, public_key: &str) -> Option<PeerId> {
        self.peers.get(public_key)
    }

    fn load_peers(&mut self) -> Result<(), EngineError> {
        let rows = self.fetch_rows("SELECT public_key, id FROM peers", Vec::new())?;
        for row in rows {
            let key = row.first().and_then(text).ok_or(EngineError::Column(0))?;
            let id = row.get(1).and_then(int).ok_or(EngineError::Column(1))?;
            self.peers.insert(key, PeerId::new(id));
        }
        debug!(peers = self.peers.len(), "peer cache loaded");
        Ok(())
    }

    /// Runs one read statement to completion and returns its rows.
    pub(crate) fn fetch_rows(
        &self,
        sql: impl Into<Cow<'static, str>>,
        params: Vec<Value>,
    ) -> Result<Vec<Vec<Value>>, EngineError> {
        let db = self.valid_db().ok_or(EngineError::Unavailable)?;
        let rows = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&rows);
        let query = Query::with_params(sql, params).on_row(move |row| {
            if let Ok(mut rows) = sink.lock() {
                rows.push(row.to_vec());
            }
        });
        if !db.exec_now(vec![query]) {
            return Err(parley_storage::StorageError::StatementFailed("history read").into());
        }
        let mut rows = rows.lock().map_err(|_| EngineError::Poisoned)?;
        Ok(std::mem::take(&mut *rows))
    }

    /// Drains the executor and handles the file-link events it produced,
    /// repeating until no further work is queued.
    pub fn sync(&mut self) {
        while let Some(db) = self.valid_db() {
            db.sync();
            if !self.handle_link_events() {
                break;
            }
        }
    }

    /// Deletes every peer, alias, message and file transfer.
    pub fn erase_history(&mut self) -> bool {
        self.handle_link_events();
        let Some(db) = self.valid_db() else {
            return false;
        };
        let erased = db.exec_now(vec![
            Query::new("DELETE FROM faux_offline_pending"),
            Query::new("DELETE FROM history"),
            Query::new("DELETE FROM aliases"),
            Query::new("DELETE FROM peers"),
            Query::new("DELETE FROM file_transfers"),
        ]);
        if !erased {
            warn!("failed to erase history");
            return false;
        }
        self.peers.clear();
        self.file_infos.clear();
        vacuum(db.as_ref());
        true
    }

    /// Deletes everything recorded for one chat. The peer stays cached when
    /// the delete fails so cache and store keep agreeing.
    pub fn remove_friend_history(&mut self, public_key: &str) -> bool {
        self.handle_link_events();
        let Some(db) = self.valid_db() else {
            return false;
        };
        let Some(peer_id) = self.peers.get(public_key) else {
            return false;
        };

        let id = || vec![Value::Integer(peer_id.get())];
        let removed = db.exec_now(vec![
            Query::with_params(
                "DELETE FROM faux_offline_pending WHERE id IN (SELECT id FROM history WHERE chat_id = ?1)",
                id(),
            ),
            Query::with_params("DELETE FROM history WHERE chat_id = ?1", id()),
            Query::with_params("DELETE FROM aliases WHERE owner = ?1", id()),
            Query::with_params("DELETE FROM peers WHERE id = ?1", id()),
            Query::with_params("DELETE FROM file_transfers WHERE chat_id = ?1", id()),
        ]);
        if !removed {
            warn!(%peer_id, "failed to remove friend's history");
            return false;
        }
        self.peers.remove(public_key);
        self.forget_file_links(public_key);
        vacuum(db.as_ref());
        true
    }
}

fn vacuum<D: Executor + ?Sized>(db: &D) {
    if !db.exec_now(vec![Query::new("VACUUM")]) {
        warn!("vacuum after erase failed");
    }
}

impl<D: Executor> Drop for History<D> {
    fn drop(&mut self) {
        // Queued callbacks capture only a weak inbox handle, but settle them
        // while the engine still exists so file links are not lost.
        self.sync();
    }
}
