use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::query::{Query, Value, int};
use crate::traits::Executor;

/// Forward-only structural changes; entry `n` upgrades version `n` to `n + 1`.
/// Every step is additive so that an interrupted upgrade leaves rows intact.
const MIGRATIONS: &[Migration] = &[Migration::AddColumn {
    table: "history",
    column: "file_id",
    decl: "INTEGER",
}];

pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Tables as they were at version 0. Later columns arrive through `MIGRATIONS`.
const BASE_TABLES: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS peers (
        id INTEGER PRIMARY KEY,
        public_key TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS aliases (
        id INTEGER PRIMARY KEY,
        owner INTEGER,
        display_name BLOB NOT NULL,
        UNIQUE(owner, display_name)
    )",
    // File messages carry an empty payload rather than NULL.
    "CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY,
        timestamp INTEGER NOT NULL,
        chat_id INTEGER NOT NULL,
        sender_alias INTEGER NOT NULL,
        message BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS file_transfers (
        id INTEGER PRIMARY KEY,
        chat_id INTEGER NOT NULL,
        file_restart_id BLOB NOT NULL,
        file_name BLOB NOT NULL,
        file_path BLOB NOT NULL,
        file_hash BLOB NOT NULL,
        file_size INTEGER NOT NULL,
        direction INTEGER NOT NULL,
        file_state INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS faux_offline_pending (id INTEGER PRIMARY KEY)",
];

#[derive(Debug, Clone, Copy)]
enum Migration {
    AddColumn {
        table: &'static str,
        column: &'static str,
        decl: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    Current,
    Upgraded { from: i64, to: i64 },
    /// Written by a newer release; nothing may touch it.
    TooNew { found: i64 },
}

/// Runs a single-column query and returns the first row's integer, if any.
pub fn scalar_int<E: Executor + ?Sized>(
    db: &E,
    sql: &'static str,
    params: Vec<Value>,
) -> Result<Option<i64>, StorageError> {
    let slot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let ok = db.exec_now(vec![Query::with_params(sql, params).on_row(move |row| {
        if let Ok(mut first) = sink.lock() {
            if first.is_none() {
                *first = row.first().and_then(int);
            }
        }
    })]);
    if !ok {
        return Err(StorageError::StatementFailed(sql));
    }
    let value = *slot.lock().map_err(|_| StorageError::StatementFailed(sql))?;
    Ok(value)
}

pub fn read_version<E: Executor + ?Sized>(db: &E) -> Result<i64, StorageError> {
    Ok(scalar_int(db, "PRAGMA user_version", Vec::new())?.unwrap_or(0))
}

fn column_exists<E: Executor + ?Sized>(
    db: &E,
    table: &'static str,
    column: &'static str,
) -> Result<bool, StorageError> {
    let count = scalar_int(
        db,
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        vec![Value::Text(table.into()), Value::Text(column.into())],
    )?;
    Ok(count.unwrap_or(0) > 0)
}

fn migration_queries<E: Executor + ?Sized>(
    db: &E,
    migration: Migration,
) -> Result<Vec<Query>, StorageError> {
    match migration {
        Migration::AddColumn {
            table,
            column,
            decl,
        } => {
            // A previous run may have added the column before it could bump the version.
            if column_exists(db, table, column)? {
                debug!(table, column, "column already present, skipping");
                return Ok(Vec::new());
            }
            Ok(vec![Query::new(format!(
                "ALTER TABLE {table} ADD COLUMN {column} {decl}"
            ))])
        }
    }
}

/// Brings the history tables up to `SCHEMA_VERSION` in a single transaction.
pub fn upgrade<E: Executor + ?Sized>(db: &E) -> Result<SchemaStatus, StorageError> {
    let version = read_version(db)?;
    if version > SCHEMA_VERSION {
        warn!(
            found = version,
            supported = SCHEMA_VERSION,
            "database schema is newer than this build supports"
        );
        return Ok(SchemaStatus::TooNew { found: version });
    }

    // Written into the file header, so only after the version check.
    if !db.exec_now(vec![Query::new("PRAGMA journal_mode = WAL")]) {
        warn!("could not switch history database to WAL");
    }

    let mut queries: Vec<Query> = BASE_TABLES.iter().map(|sql| Query::new(*sql)).collect();
    if version == SCHEMA_VERSION {
        if !db.exec_now(queries) {
            return Err(StorageError::StatementFailed("create history tables"));
        }
        debug!(version, "database schema is current");
        return Ok(SchemaStatus::Current);
    }

    for (step, migration) in MIGRATIONS.iter().enumerate().skip(version.max(0) as usize) {
        info!(from = step, to = step + 1, "running history schema migration");
        queries.extend(migration_queries(db, *migration)?);
    }
    queries.push(Query::new(format!("PRAGMA user_version = {SCHEMA_VERSION}")));

    if !db.exec_now(queries) {
        return Err(StorageError::StatementFailed("schema upgrade"));
    }
    info!(from = version, to = SCHEMA_VERSION, "history schema upgrade finished");
    Ok(SchemaStatus::Upgraded {
        from: version,
        to: SCHEMA_VERSION,
    })
}
