use std::collections::HashMap;

use parley_core::PeerId;
use parley_storage::{Query, Value};

/// In-memory mirror of the `peers` table and the only allocator of peer ids.
///
/// New ids are `max + 1` (or 0 for an empty cache) and are visible to the next
/// lookup immediately, before the queued insert has committed.
#[derive(Debug, Default)]
pub struct PeerCache {
    ids: HashMap<String, PeerId>,
}

impl PeerCache {
    pub fn get(&self, public_key: &str) -> Option<PeerId> {
        self.ids.get(public_key).copied()
    }

    /// Records an id read back from the store.
    pub fn insert(&mut self, public_key: impl Into<String>, id: PeerId) {
        self.ids.insert(public_key.into(), id);
    }

    pub fn remove(&mut self, public_key: &str) -> Option<PeerId> {
        self.ids.remove(public_key)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn next_id(&self) -> PeerId {
        self.ids
            .values()
            .max()
            .map_or(PeerId::new(0), PeerId::next)
    }

    /// Returns the id for `public_key`, allocating one if it is unknown.
    /// A fresh allocation also yields the statement that persists it.
    pub fn resolve(&mut self, public_key: &str) -> (PeerId, Option<Query>) {
        if let Some(id) = self.get(public_key) {
            return (id, None);
        }
        let id = self.next_id();
        self.ids.insert(public_key.to_owned(), id);
        let insert = Query::with_params(
            "INSERT INTO peers (id, public_key) VALUES (?1, ?2)",
            vec![Value::Integer(id.get()), Value::Text(public_key.to_owned())],
        );
        (id, Some(insert))
    }
}
