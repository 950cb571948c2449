use chrono::{Days, NaiveDate, NaiveTime, Utc};
use parley_core::search::{substring_pattern, words_only_pattern};
use parley_core::{
    DateMessages, FileTransfer, HistMessage, MatchMode, MessageContent, MessageId, SearchParams,
    SearchPeriod,
};
use parley_storage::query::{blob, int, text};
use parley_storage::{Executor, Value};
use tracing::warn;

use crate::error::EngineError;
use crate::history::History;

const MS_PER_DAY: i64 = 86_400_000;

const MESSAGE_COLUMNS: &str = "SELECT history.id AS id, \
     faux_offline_pending.id AS pending_id, \
     history.timestamp AS timestamp, \
     chat.public_key AS chat_key, \
     aliases.display_name AS display_name, \
     sender.public_key AS sender_key, \
     history.message AS message, \
     file_transfers.file_restart_id AS file_restart_id, \
     file_transfers.file_path AS file_path, \
     file_transfers.file_name AS file_name, \
     file_transfers.file_size AS file_size, \
     file_transfers.direction AS direction, \
     file_transfers.file_state AS file_state \
     FROM history \
     LEFT JOIN faux_offline_pending ON history.id = faux_offline_pending.id \
     JOIN peers chat ON chat.id = history.chat_id \
     JOIN aliases ON aliases.id = history.sender_alias \
     JOIN peers sender ON sender.id = aliases.owner \
     LEFT JOIN file_transfers ON history.file_id = file_transfers.id \
     WHERE history.chat_id = ?1 AND history.timestamp BETWEEN ?2 AND ?3";

fn int_at(row: &[Value], index: usize) -> Result<i64, EngineError> {
    row.get(index).and_then(int).ok_or(EngineError::Column(index))
}

fn text_at(row: &[Value], index: usize) -> Result<String, EngineError> {
    row.get(index).and_then(text).ok_or(EngineError::Column(index))
}

fn parse_message(row: &[Value]) -> Result<HistMessage, EngineError> {
    let is_sent = matches!(row.get(1), Some(Value::Null));
    let content = match row.get(7) {
        Some(Value::Null) | None => MessageContent::Text(text_at(row, 6)?),
        Some(restart_id) => MessageContent::File(FileTransfer {
            resume_file_id: parley_storage::query::bytes(restart_id)
                .ok_or(EngineError::Column(7))?
                .to_vec(),
            file_path: text_at(row, 8)?,
            file_name: text_at(row, 9)?,
            file_size: int_at(row, 10)?,
            direction: int_at(row, 11)?.try_into()?,
            status: int_at(row, 12)?.try_into()?,
        }),
    };
    Ok(HistMessage {
        id: MessageId::new(int_at(row, 0)?),
        is_sent,
        timestamp: int_at(row, 2)?,
        chat_key: text_at(row, 3)?,
        display_name: text_at(row, 4)?.replace('\0', ""),
        sender_key: text_at(row, 5)?,
        content,
    })
}

fn day_start_ms(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// SQL predicate and bound pattern for one match mode. `?2` is the pattern.
fn match_clause(phrase: &str, mode: MatchMode) -> (&'static str, Value) {
    let pattern = match mode {
        // Byte-exact, no regex engine involved.
        MatchMode::CaseSensitive => return ("instr(message, ?2) > 0", blob(phrase)),
        MatchMode::CaseInsensitive => substring_pattern(phrase),
        MatchMode::WholeWord | MatchMode::WholeWordCaseInsensitive => words_only_pattern(phrase),
        MatchMode::Regex | MatchMode::RegexCaseInsensitive => phrase.to_owned(),
    };
    let predicate = if mode.is_case_sensitive() {
        "regexp_cs(?2, message)"
    } else {
        "regexp(?2, message)"
    };
    (predicate, Value::Text(pattern))
}

impl<D: Executor> History<D> {
    /// Messages of a chat with `from_ms <= timestamp <= to_ms`, oldest first.
    pub fn get_chat_history_from_date(&mut self, peer_key: &str, from_ms: i64, to_ms: i64) -> Vec<HistMessage> {
        self.get_chat_history(peer_key, from_ms, to_ms, None)
    }

    /// The newest `default_message_count` messages of a chat, oldest first.
    /// A count of 0 returns the whole chat.
    pub fn get_chat_history_default_num(&mut self, peer_key: &str) -> Vec<HistMessage> {
        let limit = Some(self.config.default_message_count).filter(|&n| n > 0);
        self.get_chat_history(peer_key, 0, Utc::now().timestamp_millis(), limit)
    }

    fn get_chat_history(
        &mut self,
        peer_key: &str,
        from_ms: i64,
        to_ms: i64,
        limit: Option<usize>,
    ) -> Vec<HistMessage> {
        self.handle_link_events();
        let Some(chat_id) = self.peers.get(peer_key) else {
            return Vec::new();
        };
        let mut params = vec![
            Value::Integer(chat_id.get()),
            Value::Integer(from_ms),
            Value::Integer(to_ms),
        ];
        let sql = match limit {
            Some(limit) => {
                params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
                format!(
                    "SELECT * FROM ({MESSAGE_COLUMNS} ORDER BY history.timestamp DESC, history.id DESC LIMIT ?4) \
                     ORDER BY timestamp, id"
                )
            }
            None => format!("{MESSAGE_COLUMNS} ORDER BY history.timestamp, history.id"),
        };

        let messages = self
            .fetch_rows(sql, params)
            .and_then(|rows| rows.iter().map(|row| parse_message(row)).collect());
        messages.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load chat history");
            Vec::new()
        })
    }

    /// Message counts per UTC day between `from` and `to`, both inclusive.
    /// Days without messages are omitted.
    pub fn get_chat_history_counts(&mut self, peer_key: &str, from: NaiveDate, to: NaiveDate) -> Vec<DateMessages> {
        self.handle_link_events();
        let Some(chat_id) = self.peers.get(peer_key) else {
            return Vec::new();
        };
        if to < from {
            return Vec::new();
        }
        let from_ms = day_start_ms(from);
        let until_ms = to
            .checked_add_days(Days::new(1))
            .map_or(i64::MAX, day_start_ms);

        let rows = self.fetch_rows(
            "SELECT timestamp / ?2 - ?3 AS day, COUNT(*) FROM history \
             WHERE chat_id = ?1 AND timestamp >= ?4 AND timestamp < ?5 \
             GROUP BY day ORDER BY day",
            vec![
                Value::Integer(chat_id.get()),
                Value::Integer(MS_PER_DAY),
                Value::Integer(from_ms.div_euclid(MS_PER_DAY)),
                Value::Integer(from_ms),
                Value::Integer(until_ms),
            ],
        );
        let counts = rows.and_then(|rows| {
            rows.iter()
                .map(|row| {
                    let offset_days = int_at(row, 0)?;
                    let count = int_at(row, 1)?;
                    Ok(DateMessages {
                        offset_days: u32::try_from(offset_days).map_err(|_| EngineError::Column(0))?,
                        count: u32::try_from(count).map_err(|_| EngineError::Column(1))?,
                    })
                })
                .collect()
        });
        counts.unwrap_or_else(|e| {
            warn!(error = %e, "failed to count chat history");
            Vec::new()
        })
    }

    /// Timestamp of the message matching `phrase` selected by `params.period`.
    /// An invalid regular expression finds nothing.
    pub fn get_date_where_find_phrase(&mut self, peer_key: &str, phrase: &str, params: &SearchParams) -> Option<i64> {
        self.handle_link_events();
        let chat_id = self.peers.get(peer_key)?;
        let (predicate, pattern) = match_clause(phrase, params.mode);
        let mut values = vec![Value::Integer(chat_id.get()), pattern];

        let (period, order) = match params.period {
            SearchPeriod::WithTheFirst => ("", "ASC"),
            SearchPeriod::After(ts) => {
                values.push(Value::Integer(ts));
                (" AND timestamp > ?3", "ASC")
            }
            SearchPeriod::Before(ts) => {
                values.push(Value::Integer(ts));
                (" AND timestamp < ?3", "DESC")
            }
        };
        let sql = format!(
            "SELECT timestamp FROM history WHERE chat_id = ?1 AND {predicate}{period} \
             ORDER BY timestamp {order}, id {order} LIMIT 1"
        );

        match self.fetch_rows(sql, values) {
            Ok(rows) => rows.first().and_then(|row| row.first()).and_then(int),
            Err(e) => {
                warn!(error = %e, mode = ?params.mode, "phrase search failed");
                None
            }
        }
    }

    /// Timestamp of the first message in a chat.
    pub fn get_start_date_chat_history(&mut self, peer_key: &str) -> Option<i64> {
        self.handle_link_events();
        let chat_id = self.peers.get(peer_key)?;
        let rows = self.fetch_rows(
            "SELECT timestamp FROM history WHERE chat_id = ?1 ORDER BY timestamp ASC LIMIT 1",
            vec![Value::Integer(chat_id.get())],
        );
        match rows {
            Ok(rows) => rows.first().and_then(|row| row.first()).and_then(int),
            Err(e) => {
                warn!(error = %e, "failed to read chat start date");
                None
            }
        }
    }

    pub fn is_history_existence(&mut self, peer_key: &str) -> bool {
        self.handle_link_events();
        let Some(chat_id) = self.peers.get(peer_key) else {
            return false;
        };
        self.fetch_rows(
            "SELECT id FROM history WHERE chat_id = ?1 LIMIT 1",
            vec![Value::Integer(chat_id.get())],
        )
        .is_ok_and(|rows| !rows.is_empty())
    }
}
