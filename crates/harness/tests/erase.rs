use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parley_core::PeerId;
use parley_engine::{History, HistoryConfig, HistoryPolicy};
use parley_harness::{TestHistory, TestPeer, new_file_id};
use parley_storage::{Database, Executor, Query};

const TABLES: [&str; 5] = ["peers", "aliases", "history", "file_transfers", "faux_offline_pending"];

fn populate(store: &mut TestHistory, me: &TestPeer, peers: &[&TestPeer]) {
    for (i, peer) in peers.iter().enumerate() {
        let ts = i as i64 * 10;
        store.history.add_new_message(&peer.incoming("hi", ts), HistoryPolicy::ENABLED, None);
        store
            .history
            .add_new_message(&peer.outgoing(me, "pending", ts + 1, false), HistoryPolicy::ENABLED, None);
        let file_id = new_file_id();
        store
            .history
            .add_new_file_message(&peer.incoming_file(&file_id, "f.bin", 8, ts + 2), HistoryPolicy::ENABLED);
        store.history.sync();
        store.history.set_file_finished(&file_id, true, "/tmp/f.bin", b"hash");
    }
    store.history.sync();
}

#[test]
fn remove_friend_history_leaves_others() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = TestHistory::new()?;
    let me = TestPeer::new("me");
    let bob = TestPeer::new("Bob");
    let alice = TestPeer::new("Alice");
    populate(&mut store, &me, &[&bob, &alice]);
    // One transfer per chat still waiting for its outcome.
    let bob_file = new_file_id();
    let alice_file = new_file_id();
    store
        .history
        .add_new_file_message(&bob.incoming_file(&bob_file, "b.bin", 1, 100), HistoryPolicy::ENABLED);
    store
        .history
        .add_new_file_message(&alice.incoming_file(&alice_file, "a.bin", 1, 101), HistoryPolicy::ENABLED);
    store.history.sync();
    assert_eq!(store.history.pending_file_links(), 2);

    assert!(store.history.remove_friend_history(bob.key()));
    assert_eq!(store.history.pending_file_links(), 1);
    store.history.set_file_finished(&bob_file, true, "/tmp/b.bin", b"h");
    assert_eq!(store.history.pending_file_links(), 1);
    store.history.set_file_finished(&alice_file, true, "/tmp/a.bin", b"h");
    assert_eq!(store.history.pending_file_links(), 0);
    assert!(store.history.peer_id(bob.key()).is_none());
    assert!(store.history.get_chat_history_from_date(bob.key(), 0, 1_000).is_empty());
    assert_eq!(store.history.get_chat_history_from_date(alice.key(), 0, 1_000).len(), 4);
    assert_eq!(store.count("file_transfers")?, 2);
    assert_eq!(store.count("faux_offline_pending")?, 1);

    // Unknown peers are a no-op.
    assert!(!store.history.remove_friend_history(bob.key()));

    // The removed key gets a fresh id after the current maximum.
    let max = [me.key(), alice.key()]
        .iter()
        .filter_map(|key| store.history.peer_id(key))
        .max()
        .ok_or("no ids")?;
    store.history.add_new_message(&bob.incoming("back", 500), HistoryPolicy::ENABLED, None);
    assert_eq!(store.history.peer_id(bob.key()), Some(max.next()));
    Ok(())
}

#[test]
fn erase_history_empties_every_table() -> Result<(), Box<dyn std::error::Error>> {
    let mut store = TestHistory::new()?;
    let me = TestPeer::new("me");
    let bob = TestPeer::new("Bob");
    populate(&mut store, &me, &[&bob]);

    assert!(store.history.erase_history());
    assert!(store.history.peers().is_empty());
    assert_eq!(store.history.pending_file_links(), 0);
    for table in TABLES {
        assert_eq!(store.count(table)?, 0, "{table} not empty");
    }

    store.history.add_new_message(&bob.incoming("fresh", 1), HistoryPolicy::ENABLED, None);
    assert_eq!(store.history.peer_id(bob.key()), Some(PeerId::new(0)));
    Ok(())
}

/// Refuses blocking deletes while `fail_deletes` is set.
struct FlakyDatabase {
    inner: Database,
    fail_deletes: AtomicBool,
}

impl Executor for FlakyDatabase {
    fn exec_later(&self, queries: Vec<Query>) {
        self.inner.exec_later(queries);
    }

    fn exec_now(&self, queries: Vec<Query>) -> bool {
        let deletes = queries.iter().any(|q| q.sql().starts_with("DELETE"));
        if deletes && self.fail_deletes.load(Ordering::SeqCst) {
            return false;
        }
        self.inner.exec_now(queries)
    }

    fn sync(&self) {
        self.inner.sync();
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

#[test]
fn failed_erase_keeps_cache_in_step() -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(FlakyDatabase {
        inner: Database::open_in_memory()?,
        fail_deletes: AtomicBool::new(false),
    });
    let mut history = History::new(Arc::clone(&db), HistoryConfig::default());
    let bob = TestPeer::new("Bob");
    history.add_new_message(&bob.incoming("hi", 1), HistoryPolicy::ENABLED, None);
    let bob_id = history.peer_id(bob.key());
    assert!(bob_id.is_some());

    db.fail_deletes.store(true, Ordering::SeqCst);
    assert!(!history.remove_friend_history(bob.key()));
    assert_eq!(history.peer_id(bob.key()), bob_id);
    assert!(!history.erase_history());
    assert_eq!(history.peers().len(), 1);
    assert!(history.is_history_existence(bob.key()));

    db.fail_deletes.store(false, Ordering::SeqCst);
    assert!(history.remove_friend_history(bob.key()));
    assert!(history.peer_id(bob.key()).is_none());
    Ok(())
}
