use parley_core::{MatchMode, SearchParams};
use parley_engine::HistoryPolicy;
use parley_harness::{TestHistory, TestPeer, new_file_id};
use parley_storage::SCHEMA_VERSION;
use rusqlite::Connection;

/// Layout written by releases that predate file links.
const VERSION_0: &str = "
    CREATE TABLE peers (id INTEGER PRIMARY KEY, public_key TEXT NOT NULL UNIQUE);
    CREATE TABLE aliases (id INTEGER PRIMARY KEY, owner INTEGER,
        display_name BLOB NOT NULL, UNIQUE(owner, display_name));
    CREATE TABLE history (id INTEGER PRIMARY KEY, timestamp INTEGER NOT NULL,
        chat_id INTEGER NOT NULL, sender_alias INTEGER NOT NULL, message BLOB NOT NULL);
    CREATE TABLE file_transfers (id INTEGER PRIMARY KEY, chat_id INTEGER NOT NULL,
        file_restart_id BLOB NOT NULL, file_name BLOB NOT NULL, file_path BLOB NOT NULL,
        file_hash BLOB NOT NULL, file_size INTEGER NOT NULL, direction INTEGER NOT NULL,
        file_state INTEGER NOT NULL);
    CREATE TABLE faux_offline_pending (id INTEGER PRIMARY KEY);
";

fn user_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

#[test]
fn version_0_database_is_upgraded_in_place() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("history.db");
    let bob = TestPeer::new("Bob");
    {
        let conn = Connection::open(&path)?;
        conn.execute_batch(VERSION_0)?;
        conn.execute("INSERT INTO peers (id, public_key) VALUES (4, ?1)", [bob.key()])?;
        conn.execute("INSERT INTO aliases (id, owner, display_name) VALUES (1, 4, CAST('Bob' AS BLOB))", [])?;
        conn.execute(
            "INSERT INTO history (timestamp, chat_id, sender_alias, message) \
             VALUES (1000, 4, 1, CAST('from the old days' AS BLOB))",
            [],
        )?;
    }

    let mut store = TestHistory::at(dir, path)?;
    assert!(store.history.is_valid());

    let conn = store.inspect()?;
    assert_eq!(user_version(&conn)?, SCHEMA_VERSION);
    let has_file_id: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('history') WHERE name = 'file_id'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(has_file_id, 1);
    drop(conn);

    let messages = store.history.get_chat_history_from_date(bob.key(), 0, 2_000);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content.as_text(), Some("from the old days"));
    assert_eq!(messages[0].display_name, "Bob");

    // Upgraded tables accept file links.
    let file_id = new_file_id();
    store
        .history
        .add_new_file_message(&bob.incoming_file(&file_id, "new.txt", 1, 3_000), HistoryPolicy::ENABLED);
    store.history.sync();
    store.history.set_file_finished(&file_id, true, "/tmp/new.txt", b"h");
    store.history.sync();
    let linked: i64 = store.inspect()?.query_row(
        "SELECT COUNT(*) FROM history WHERE file_id IS NOT NULL",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(linked, 1);

    // Reopening a current database changes nothing.
    store.reopen()?;
    assert_eq!(user_version(&store.inspect()?)?, SCHEMA_VERSION);
    assert_eq!(store.count("history")?, 2);
    Ok(())
}

#[test]
fn newer_database_is_left_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("history.db");
    let future = SCHEMA_VERSION + 5;
    {
        let conn = Connection::open(&path)?;
        conn.execute_batch(VERSION_0)?;
        conn.pragma_update(None, "user_version", future)?;
    }

    let mut store = TestHistory::at(dir, path)?;
    assert!(!store.history.is_valid());

    let bob = TestPeer::new("Bob");
    store.history.add_new_message(&bob.incoming("ignored", 1), HistoryPolicy::ENABLED, None);
    store.history.mark_as_sent(parley_core::MessageId::new(1));
    store.history.set_file_finished("missing", true, "/tmp/x", b"");
    assert!(store.history.get_chat_history_from_date(bob.key(), 0, 10).is_empty());
    assert!(store.history.get_chat_history_default_num(bob.key()).is_empty());
    assert_eq!(
        store.history.get_date_where_find_phrase(bob.key(), "ignored", &SearchParams {
            mode: MatchMode::CaseSensitive,
            ..SearchParams::default()
        }),
        None
    );
    assert!(!store.history.is_history_existence(bob.key()));
    assert!(!store.history.erase_history());
    assert!(!store.history.remove_friend_history(bob.key()));
    store.history.sync();

    let conn = store.inspect()?;
    assert_eq!(user_version(&conn)?, future);
    assert_eq!(store.count("history")?, 0);
    Ok(())
}
