use parley_core::{MessageId, NewMessage, PeerId};
use parley_storage::query::blob;
use parley_storage::{Executor, Query, Value};
use tracing::warn;

use crate::config::HistoryPolicy;
use crate::history::{History, MessageIdCallback};
use crate::peers::PeerCache;

/// Insert-or-fetch for aliases, split across two statements of one batch.
///
/// The first statement inserts `(owner, display_name)` unless it exists. The
/// history insert then reads the alias id through `ALIAS_ID`: when the insert
/// was ignored `changes()` is 0 and the existing row is looked up by
/// `(owner, display_name)`, otherwise `last_insert_rowid()` is the new alias.
/// Both branches run inside the batch's transaction, so no concurrent alias
/// insert can slip in between.
const INSERT_ALIAS: &str = "INSERT OR IGNORE INTO aliases (owner, display_name) VALUES (?1, ?2)";

const ALIAS_ID: &str = "CASE WHEN changes() IS 0 \
     THEN (SELECT id FROM aliases WHERE owner = ?4 AND display_name = ?5) \
     ELSE last_insert_rowid() END";

fn insert_history_sql() -> String {
    format!(
        "INSERT INTO history (timestamp, chat_id, message, sender_alias) VALUES (?1, ?2, ?3, {ALIAS_ID})"
    )
}

/// Builds the ordered batch that appends `message`.
pub(crate) fn new_message_queries(
    peers: &mut PeerCache,
    message: &NewMessage<'_>,
    on_insert: Option<MessageIdCallback>,
) -> Vec<Query> {
    let mut queries = Vec::with_capacity(5);

    let (chat_id, insert_chat) = peers.resolve(message.peer_key);
    queries.extend(insert_chat);
    let (sender_id, insert_sender) = peers.resolve(message.sender_key);
    queries.extend(insert_sender);

    queries.push(Query::with_params(
        INSERT_ALIAS,
        vec![
            Value::Integer(sender_id.get()),
            blob(message.display_name),
        ],
    ));

    let mut insert = Query::with_params(insert_history_sql(), history_params(message, chat_id, sender_id));
    if let Some(on_insert) = on_insert {
        insert = insert.on_insert(move |id| on_insert(MessageId::new(id)));
    }
    queries.push(insert);

    if !message.is_sent {
        queries.push(Query::new(
            "INSERT INTO faux_offline_pending (id) VALUES (last_insert_rowid())",
        ));
    }
    queries
}

fn history_params(message: &NewMessage<'_>, chat_id: PeerId, sender_id: PeerId) -> Vec<Value> {
    vec![
        Value::Integer(message.timestamp),
        Value::Integer(chat_id.get()),
        blob(message.text),
        Value::Integer(sender_id.get()),
        blob(message.display_name),
    ]
}

impl<D: Executor> History<D> {
    /// Queues `message` for insertion. `on_insert` receives the history row id
    /// once the batch has committed.
    ///
    /// Nothing is queued when logging is disabled or the store is unavailable.
    pub fn add_new_message(
        &mut self,
        message: &NewMessage<'_>,
        policy: HistoryPolicy,
        on_insert: Option<MessageIdCallback>,
    ) {
        self.handle_link_events();
        if !policy.logging_enabled {
            warn!("blocked a message from being added to history while logging is disabled");
            return;
        }
        let Some(db) = self.valid_db() else {
            return;
        };
        let queries = new_message_queries(&mut self.peers, message, on_insert);
        db.exec_later(queries);
    }

    /// Clears the pending-send marker of a delivered message.
    pub fn mark_as_sent(&mut self, message_id: MessageId) {
        self.handle_link_events();
        let Some(db) = self.valid_db() else {
            return;
        };
        db.exec_later(vec![Query::with_params(
            "DELETE FROM faux_offline_pending WHERE id = ?1",
            vec![Value::Integer(message_id.get())],
        )]);
    }
}
