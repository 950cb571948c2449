use crate::query::Query;

/// Ordered, single-writer SQL execution.
///
/// Batches are applied in submission order. Callbacks run on the executor's
/// own context, never on the submitting thread.
pub trait Executor: Send + Sync {
    /// Queue a batch and return immediately.
    fn exec_later(&self, queries: Vec<Query>);

    /// Run a batch and wait for it and its callbacks to finish.
    /// Returns false if any statement failed; the batch is then rolled back.
    fn exec_now(&self, queries: Vec<Query>) -> bool;

    /// Block until everything queued before this call has been applied.
    fn sync(&self);

    fn is_open(&self) -> bool;
}

impl<E: Executor + ?Sized> Executor for std::sync::Arc<E> {
    fn exec_later(&self, queries: Vec<Query>) {
        (**self).exec_later(queries)
    }

    fn exec_now(&self, queries: Vec<Query>) -> bool {
        (**self).exec_now(queries)
    }

    fn sync(&self) {
        (**self).sync()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
