use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Append-only, timestamp-prefixed event store with copy-on-write snapshots.
///
/// Appends clone the current entries, push, and swap the `Arc`; `snapshot`
/// hands out the current `Arc` so readers iterate without holding a lock and
/// can never observe a torn entry. A snapshot is always a consistent
/// prefix-or-equal of the eventual writer result.
pub struct EventLog {
    entries: RwLock<Arc<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Appends one entry and returns its index.
    pub fn append(&self, entry: String) -> usize {
        let mut guard = self.write_guard();
        let mut next = guard.as_ref().clone();
        next.push(entry);
        let index = next.len() - 1;
        *guard = Arc::new(next);
        index
    }

    /// Cheap consistent view of the whole log.
    pub fn snapshot(&self) -> Arc<Vec<String>> {
        self.read_guard().clone()
    }

    /// Wholesale replacement, used when restoring a replicated state.
    pub fn replace(&self, entries: Vec<String>) {
        *self.write_guard() = Arc::new(entries);
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Arc<Vec<String>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Arc<Vec<String>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
