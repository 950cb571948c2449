use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use rusqlite::{Connection, params_from_iter};
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::query::{InsertIdCallback, Query, Value};
use crate::traits::Executor;

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    /// Database file; `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
}

enum Job {
    Batch {
        queries: Vec<Query>,
        reply: Option<mpsc::Sender<bool>>,
    },
    Barrier(mpsc::Sender<()>),
}

/// SQLite connection owned by a dedicated worker thread.
///
/// Every batch is applied in the order it was submitted. Callbacks attached to
/// queries run on the worker thread and must not submit blocking work back to
/// the same database.
pub struct Database {
    jobs: Option<mpsc::Sender<Job>>,
    open: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::start(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::start(Connection::open_in_memory()?)
    }

    pub fn open_with(config: &DatabaseConfig) -> Result<Self, StorageError> {
        match &config.path {
            Some(path) => Self::open(path),
            None => Self::open_in_memory(),
        }
    }

    fn start(conn: Connection) -> Result<Self, StorageError> {
        // Connection-scoped only; the persistent journal mode is chosen by the
        // schema upgrade once the file is known to be ours.
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        crate::functions::register(&conn)?;

        let (tx, rx) = mpsc::channel::<Job>();
        let open = Arc::new(AtomicBool::new(true));
        let worker_open = Arc::clone(&open);
        let worker = thread::Builder::new()
            .name("parley-db".to_owned())
            .spawn(move || run_worker(conn, rx, worker_open))?;

        Ok(Self {
            jobs: Some(tx),
            open,
            worker: Some(worker),
        })
    }

    fn submit(&self, job: Job) -> Result<(), StorageError> {
        let jobs = self.jobs.as_ref().ok_or(StorageError::Closed)?;
        jobs.send(job).map_err(|_| StorageError::WorkerUnavailable)
    }
}

impl Executor for Database {
    fn exec_later(&self, queries: Vec<Query>) {
        if queries.is_empty() {
            return;
        }
        if let Err(e) = self.submit(Job::Batch {
            queries,
            reply: None,
        }) {
            warn!(error = %e, "dropping queued statements");
        }
    }

    fn exec_now(&self, queries: Vec<Query>) -> bool {
        let (reply, done) = mpsc::channel();
        if let Err(e) = self.submit(Job::Batch {
            queries,
            reply: Some(reply),
        }) {
            warn!(error = %e, "cannot execute statements");
            return false;
        }
        done.recv().unwrap_or(false)
    }

    fn sync(&self) {
        let (reply, done) = mpsc::channel();
        if self.submit(Job::Barrier(reply)).is_ok() {
            let _ = done.recv();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the backlog and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("database worker panicked");
            }
        }
    }
}

fn run_worker(mut conn: Connection, jobs: mpsc::Receiver<Job>, open: Arc<AtomicBool>) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Batch { queries, reply } => {
                let ok = match run_batch(&mut conn, queries) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "statement batch failed, rolled back");
                        false
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(ok);
                }
            }
            Job::Barrier(reply) => {
                let _ = reply.send(());
            }
        }
    }
    open.store(false, Ordering::Release);
    debug!("database worker stopped");
}

fn run_batch(conn: &mut Connection, mut queries: Vec<Query>) -> Result<(), StorageError> {
    let mut inserted = Vec::new();
    if let [query] = queries.as_mut_slice() {
        run_query(conn, query, &mut inserted)?;
    } else {
        let tx = conn.transaction()?;
        for query in &mut queries {
            run_query(&tx, query, &mut inserted)?;
        }
        tx.commit()?;
    }

    // Ids are only handed out once the rows are durable.
    for (callback, id) in inserted {
        callback(id);
    }
    Ok(())
}

fn run_query(
    conn: &Connection,
    query: &mut Query,
    inserted: &mut Vec<(InsertIdCallback, i64)>,
) -> Result<(), StorageError> {
    let mut stmt = conn.prepare_cached(&query.sql)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
    while let Some(row) = rows.next()? {
        if let Some(on_row) = query.on_row.as_mut() {
            let values = (0..columns)
                .map(|i| row.get::<_, Value>(i))
                .collect::<Result<Vec<_>, _>>()?;
            on_row(&values);
        }
    }
    drop(rows);

    if let Some(on_insert) = query.on_insert.take() {
        inserted.push((on_insert, conn.last_insert_rowid()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::int;
    use std::sync::Mutex;

    fn collect_ints(db: &Database, sql: &'static str) -> Vec<i64> {
        let out = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&out);
        assert!(db.exec_now(vec![Query::new(sql).on_row(move |row| {
            sink.lock().unwrap().extend(row.iter().filter_map(int));
        })]));
        let values = out.lock().unwrap().clone();
        values
    }

    #[test]
    fn queued_batches_apply_in_order() -> Result<(), StorageError> {
        let db = Database::open_in_memory()?;
        db.exec_later(vec![Query::new("CREATE TABLE t (v INTEGER)")]);
        for v in 0..5 {
            db.exec_later(vec![Query::with_params(
                "INSERT INTO t (v) VALUES (?1)",
                vec![Value::Integer(v)],
            )]);
        }
        db.sync();
        assert_eq!(collect_ints(&db, "SELECT v FROM t ORDER BY rowid"), vec![0, 1, 2, 3, 4]);
        Ok(())
    }

    #[test]
    fn insert_callback_receives_rowid() -> Result<(), StorageError> {
        let db = Database::open_in_memory()?;
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        assert!(db.exec_now(vec![
            Query::new("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"),
            Query::new("INSERT INTO t (id, v) VALUES (41, 'a')"),
            Query::new("INSERT INTO t (v) VALUES ('b')").on_insert(move |id| {
                *slot.lock().unwrap() = Some(id);
            }),
        ]));
        assert_eq!(*seen.lock().unwrap(), Some(42));
        Ok(())
    }

    #[test]
    fn failed_batch_rolls_back_and_skips_callbacks() -> Result<(), StorageError> {
        let db = Database::open_in_memory()?;
        assert!(db.exec_now(vec![Query::new("CREATE TABLE t (v INTEGER NOT NULL)")]));

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let ok = db.exec_now(vec![
            Query::new("INSERT INTO t (v) VALUES (1)").on_insert(move |_| {
                flag.store(true, Ordering::SeqCst);
            }),
            Query::new("INSERT INTO t (v) VALUES (NULL)"),
        ]);
        assert!(!ok);
        assert!(!fired.load(Ordering::SeqCst));
        assert!(collect_ints(&db, "SELECT v FROM t").is_empty());
        Ok(())
    }

    #[test]
    fn file_database_persists() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("history.db");
        {
            let db = Database::open_with(&DatabaseConfig {
                path: Some(path.clone()),
            })?;
            db.exec_later(vec![
                Query::new("CREATE TABLE t (v INTEGER)"),
                Query::new("INSERT INTO t (v) VALUES (7)"),
            ]);
        }
        let db = Database::open(&path)?;
        assert!(db.is_open());
        assert_eq!(collect_ints(&db, "SELECT v FROM t"), vec![7]);
        Ok(())
    }
}
