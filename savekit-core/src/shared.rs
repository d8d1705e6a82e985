//! Shared references that survive cyclic payload graphs
//!
//! Plain owned payloads cannot form cycles. Payloads that share nodes use
//! [`Shared`], whose `Serialize` impl remembers which allocations are being
//! written on the current thread. Re-entering one of them means the graph
//! looped back:
//!
//! - a single edge is written as `null`, so model it as `Option<Shared<T>>`
//!   and it loads back as `None`;
//! - a collection of edges annotated with
//!   `#[serde(serialize_with = "skip_loops")]` leaves the looping elements
//!   out, so the document still loads.
//!
//! A node is cloned under its lock and the lock is released before its
//! children are written, so at most one node lock is held at a time and
//! concurrent serializations starting from different nodes cannot deadlock.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

thread_local! {
    static ACTIVE: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

/// Marks one allocation as being serialized until dropped
struct Visit(usize);

impl Visit {
    fn enter(addr: usize) -> Option<Self> {
        ACTIVE
            .with(|active| active.borrow_mut().insert(addr))
            .then(|| Visit(addr))
    }

    fn is_active(addr: usize) -> bool {
        ACTIVE.with(|active| active.borrow().contains(&addr))
    }
}

impl Drop for Visit {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().remove(&self.0);
        });
    }
}

/// A reference-counted, lockable node of a payload graph
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock()
    }

    /// True when both handles point at the same node
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

// Printing the contents could recurse forever on a cycle
impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:#x})", self.addr())
    }
}

impl<T: Clone + Serialize> Serialize for Shared<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(_visit) = Visit::enter(self.addr()) else {
            tracing::debug!("reference loop detected, skipping edge");
            return serializer.serialize_none();
        };
        // Child edges are `Shared` handles, so the snapshot is shallow
        let snapshot = self.0.lock().clone();
        snapshot.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Shared<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::deserialize(deserializer).map(Shared::new)
    }
}

/// Writes a collection of shared edges, leaving out the ones that loop back
/// to a node currently being written.
///
/// Use as `#[serde(serialize_with = "savekit_core::shared::skip_loops")]`.
pub fn skip_loops<T, S>(items: &[Shared<T>], serializer: S) -> Result<S::Ok, S::Error>
where
    T: Clone + Serialize,
    S: Serializer,
{
    let live: Vec<&Shared<T>> = items
        .iter()
        .filter(|item| !Visit::is_active(item.addr()))
        .collect();
    serializer.collect_seq(live)
}
