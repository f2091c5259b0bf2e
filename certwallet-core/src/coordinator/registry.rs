//! Per-item task bookkeeping.

use std::collections::HashMap;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::item::ItemKey;

struct TaskEntry {
    generation: u64,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
    /// The task has written to the store and must run to completion.
    committed: bool,
}

impl TaskEntry {
    fn cancel(self) {
        self.token.cancel();
        if self.committed {
            return;
        }
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

/// Live tasks indexed by item identity.
///
/// Holds at most one entry per [`ItemKey`]. Each registration gets a fresh
/// generation number; a task may only publish while its generation is the
/// one registered for its key.
#[derive(Default)]
pub(crate) struct TaskRegistry {
    entries: HashMap<ItemKey, TaskEntry>,
    next_generation: u64,
    cancelled: u64,
}

impl TaskRegistry {
    /// Cancels any live task for `key` and reserves the slot for a new one.
    pub(crate) fn reserve(&mut self, key: ItemKey) -> (u64, CancellationToken) {
        if let Some(previous) = self.entries.remove(&key) {
            log::debug!("replacing task for {key}");
            previous.cancel();
            self.cancelled += 1;
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        let token = CancellationToken::new();
        self.entries.insert(
            key,
            TaskEntry {
                generation,
                token: token.clone(),
                handle: None,
                committed: false,
            },
        );
        (generation, token)
    }

    /// Stores the join handle of the task spawned for a reservation.
    pub(crate) fn attach(&mut self, key: &ItemKey, generation: u64, handle: JoinHandle<()>) {
        if let Some(entry) = self.entries.get_mut(key) {
            if entry.generation == generation {
                entry.handle = Some(handle);
            }
        }
    }

    /// Marks the task as past the point of no return.
    ///
    /// A committed task is kept when its item leaves the store and is never
    /// aborted; cancelling it only stops it from publishing.
    pub(crate) fn commit(&mut self, key: &ItemKey, generation: u64) -> bool {
        if !self.is_current(key, generation) {
            return false;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.committed = true;
        }
        true
    }

    pub(crate) fn is_current(&self, key: &ItemKey, generation: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation && !entry.token.is_cancelled())
    }

    pub(crate) fn contains(&self, key: &ItemKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes the entry of a task that is ending on its own.
    ///
    /// The token is cancelled but the task is not aborted, since the caller
    /// is usually that task.
    pub(crate) fn finish(&mut self, key: &ItemKey, generation: u64) -> bool {
        if !self.is_current(key, generation) {
            return false;
        }
        if let Some(entry) = self.entries.remove(key) {
            entry.token.cancel();
        }
        true
    }

    /// Cancels the live task for `key`, if any.
    pub(crate) fn cancel(&mut self, key: &ItemKey) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        entry.cancel();
        self.cancelled += 1;
        true
    }

    /// Cancels every uncommitted task whose key fails `keep`. Returns how
    /// many were cancelled.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&ItemKey) -> bool) -> usize {
        let stale: Vec<ItemKey> = self
            .entries
            .iter()
            .filter(|(key, entry)| !entry.committed && !keep(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.cancel(key);
        }
        stale.len()
    }

    /// Cancels every task, committed ones included.
    pub(crate) fn cancel_all(&mut self) -> usize {
        let keys: Vec<ItemKey> = self.entries.keys().cloned().collect();
        for key in &keys {
            self.cancel(key);
        }
        keys.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of tasks cancelled by replacement, removal or shutdown.
    pub(crate) const fn cancelled(&self) -> u64 {
        self.cancelled
    }
}
