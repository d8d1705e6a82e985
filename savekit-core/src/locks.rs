//! Per-profile-name locking inside one save directory
//!
//! Two operations on the same name never interleave; operations on different
//! names do not contend. Entries are dropped from the table once the last
//! holder or waiter lets go, so the table only tracks names in use.

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct NameLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

pub(crate) struct NameGuard<'a> {
    locks: &'a NameLocks,
    name: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl NameLocks {
    /// Blocks until `name` is free, then holds it until the guard drops
    pub(crate) fn acquire(&self, name: &str) -> NameGuard<'_> {
        let entry = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(name.to_owned()).or_default())
        };

        NameGuard {
            locks: self,
            name: name.to_owned(),
            guard: Some(entry.lock_arc()),
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.table.lock().len()
    }
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.locks.table.lock();
        drop(self.guard.take());

        // Only the table itself still references the mutex
        if table
            .get(&self.name)
            .is_some_and(|m| Arc::strong_count(m) == 1)
        {
            table.remove(&self.name);
        }
    }
}
