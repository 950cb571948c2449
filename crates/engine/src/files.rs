//! Linking file transfers to their history message.
//!
//! A file message and its `file_transfers` row reference each other, and both
//! ids only exist once the rows are written. The message is inserted first;
//! its insert callback posts [`LinkEvent::FileInsertionReady`], which inserts
//! the transfer row and backfills `history.file_id`. That insert posts
//! [`LinkEvent::FileInserted`]. Completion reports from the transport can
//! arrive before or after that point and are parked in the completion cache
//! until the transfer row id is known.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use parley_core::{FileDirection, FileRowId, FileStatus, MessageId, NewFileMessage, NewMessage};
use parley_storage::query::blob;
use parley_storage::{Executor, Query, Value};
use tracing::{debug, warn};

use crate::config::HistoryPolicy;
use crate::history::History;

/// Everything needed to create a `file_transfers` row, plus the id of the
/// history message once it has been inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDbInsertionData {
    pub peer_key: String,
    pub file_id: String,
    pub file_name: String,
    pub file_path: String,
    pub size: i64,
    pub direction: FileDirection,
    pub history_id: Option<MessageId>,
}

/// Link state of an announced transfer, kept until both its row id and its
/// outcome are known.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileInfo {
    /// Public key of the chat the transfer belongs to.
    pub chat_key: String,
    pub finished: bool,
    pub success: bool,
    pub file_path: String,
    pub file_hash: Vec<u8>,
    pub db_id: Option<FileRowId>,
}

#[derive(Debug)]
pub enum LinkEvent {
    FileInsertionReady(FileDbInsertionData),
    FileInserted { db_id: FileRowId, file_id: String },
}

pub(crate) type Inbox = Mutex<VecDeque<LinkEvent>>;

/// Delivers `event` to the owning history if it still exists.
fn post(inbox: &Weak<Inbox>, event: LinkEvent) {
    let Some(inbox) = inbox.upgrade() else {
        return;
    };
    if let Ok(mut events) = inbox.lock() {
        events.push_back(event);
    }
}

fn file_finished_query(id: FileRowId, success: bool, file_path: &str, file_hash: &[u8]) -> Query {
    let state = Value::Integer(FileStatus::concluded(success).code());
    // Without a path there is no transfer data to persist, only the status.
    if file_path.is_empty() {
        Query::with_params(
            "UPDATE file_transfers SET file_state = ?1 WHERE id = ?2",
            vec![state, Value::Integer(id.get())],
        )
    } else {
        Query::with_params(
            "UPDATE file_transfers SET file_state = ?1, file_path = ?2, file_hash = ?3 WHERE id = ?4",
            vec![
                state,
                blob(file_path),
                blob(file_hash),
                Value::Integer(id.get()),
            ],
        )
    }
}

impl<D: Executor> History<D> {
    /// Records a file transfer announcement. The transfer row is created and
    /// linked once the message row exists.
    pub fn add_new_file_message(&mut self, file: &NewFileMessage<'_>, policy: HistoryPolicy) {
        self.handle_link_events();
        if !policy.logging_enabled {
            warn!("blocked a file message from being added to history while logging is disabled");
            return;
        }
        if self.valid_db().is_none() {
            return;
        }

        let direction = if file.sender_key == file.peer_key {
            FileDirection::Receiving
        } else {
            FileDirection::Sending
        };
        let data = FileDbInsertionData {
            peer_key: file.peer_key.to_owned(),
            file_id: file.file_id.to_owned(),
            file_name: file.file_name.to_owned(),
            file_path: file.file_path.to_owned(),
            size: file.file_size,
            direction,
            history_id: None,
        };
        self.file_infos.insert(
            file.file_id.to_owned(),
            FileInfo {
                chat_key: file.peer_key.to_owned(),
                ..FileInfo::default()
            },
        );

        let inbox = Arc::downgrade(&self.inbox);
        let on_insert = move |history_id: MessageId| {
            let mut data = data;
            data.history_id = Some(history_id);
            post(&inbox, LinkEvent::FileInsertionReady(data));
        };

        let message = NewMessage {
            peer_key: file.peer_key,
            text: "",
            sender_key: file.sender_key,
            timestamp: file.timestamp,
            is_sent: true,
            display_name: file.display_name,
        };
        self.add_new_message(&message, policy, Some(Box::new(on_insert)));
    }

    /// Reports the outcome of a transfer. `file_path` may be empty when the
    /// transfer was canceled before any data arrived.
    ///
    /// Reports for transfers that were never recorded, or that were already
    /// concluded, are dropped.
    pub fn set_file_finished(&mut self, file_id: &str, success: bool, file_path: &str, file_hash: &[u8]) {
        self.handle_link_events();
        let Some(db) = self.valid_db() else {
            return;
        };
        let Some(info) = self.file_infos.get_mut(file_id) else {
            debug!(file_id, "ignoring outcome of an unrecorded file transfer");
            return;
        };

        match info.db_id {
            Some(db_id) => {
                self.file_infos.remove(file_id);
                let status = FileStatus::concluded(success);
                debug!(file_id, %db_id, status = status.as_str(), "file transfer finished");
                db.exec_later(vec![file_finished_query(db_id, success, file_path, file_hash)]);
            }
            None => {
                debug!(file_id, success, "file transfer finished before its row exists");
                info.finished = true;
                info.success = success;
                info.file_path = file_path.to_owned();
                info.file_hash = file_hash.to_vec();
            }
        }
    }

    /// Transfers whose row id or outcome is still outstanding.
    pub fn pending_file_links(&self) -> usize {
        self.file_infos.len()
    }

    /// Forgets the transfers of one chat once its rows are gone.
    pub(crate) fn forget_file_links(&mut self, chat_key: &str) {
        self.file_infos.retain(|_, info| info.chat_key != chat_key);
    }

    fn next_link_event(&self) -> Option<LinkEvent> {
        self.inbox.lock().ok()?.pop_front()
    }

    /// Handles every queued link event. Returns whether any were handled.
    pub(crate) fn handle_link_events(&mut self) -> bool {
        let mut handled = false;
        while let Some(event) = self.next_link_event() {
            handled = true;
            match event {
                LinkEvent::FileInsertionReady(data) => self.on_file_insertion_ready(data),
                LinkEvent::FileInserted { db_id, file_id } => self.on_file_inserted(db_id, file_id),
            }
        }
        handled
    }

    fn on_file_insertion_ready(&mut self, data: FileDbInsertionData) {
        let Some(db) = self.valid_db() else {
            return;
        };
        let linked = (self.peers.get(&data.peer_key), data.history_id, self.file_infos.contains_key(&data.file_id));
        let (Some(chat_id), Some(history_id), true) = linked else {
            // The chat was erased while the message insert was in flight.
            warn!(file_id = %data.file_id, "dropping file link for a removed chat");
            self.file_infos.remove(&data.file_id);
            return;
        };

        debug!(
            file_id = %data.file_id,
            %history_id,
            direction = data.direction.as_str(),
            "inserting file transfer"
        );
        let inbox = Arc::downgrade(&self.inbox);
        let file_id = data.file_id.clone();
        let insert = Query::with_params(
            "INSERT INTO file_transfers (chat_id, file_restart_id, file_path, file_name, \
             file_hash, file_size, direction, file_state) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            vec![
                Value::Integer(chat_id.get()),
                blob(data.file_id.as_str()),
                blob(data.file_path.as_str()),
                blob(data.file_name.as_str()),
                Value::Blob(Vec::new()),
                Value::Integer(data.size),
                Value::Integer(data.direction.code()),
                // Overwritten when the transfer reports its outcome.
                Value::Integer(FileStatus::Canceled.code()),
            ],
        )
        .on_insert(move |id| {
            post(
                &inbox,
                LinkEvent::FileInserted {
                    db_id: FileRowId::new(id),
                    file_id,
                },
            );
        });
        let link = Query::with_params(
            "UPDATE history SET file_id = last_insert_rowid() WHERE id = ?1",
            vec![Value::Integer(history_id.get())],
        );
        db.exec_later(vec![insert, link]);
    }

    fn on_file_inserted(&mut self, db_id: FileRowId, file_id: String) {
        let Some(db) = self.valid_db() else {
            return;
        };
        let Some(info) = self.file_infos.get_mut(&file_id) else {
            // Erased since the row was queued.
            debug!(%file_id, %db_id, "file transfer row no longer tracked");
            return;
        };
        if !info.finished {
            info.db_id = Some(db_id);
            return;
        }
        // The outcome arrived first; the entry is complete once written.
        if let Some(info) = self.file_infos.remove(&file_id) {
            debug!(%file_id, %db_id, "applying early file transfer outcome");
            db.exec_later(vec![file_finished_query(db_id, info.success, &info.file_path, &info.file_hash)]);
        }
    }
}
