//! Volatile [`ItemStore`] for tests and ephemeral sessions.

use std::sync::{Mutex, MutexGuard};

use super::error::{StorageError, StorageResult};
use super::{ops, ItemStore};
use crate::item::{ItemMatcher, RawItem};

/// Item store keeping the list in memory only.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    items: Mutex<Vec<RawItem>>,
}

impl MemoryItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `items`, in order.
    #[must_use]
    pub const fn with_items(items: Vec<RawItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Vec<RawItem>>> {
        self.items
            .lock()
            .map_err(|_| StorageError::Lock("item list mutex poisoned".to_string()))
    }
}

impl ItemStore for MemoryItemStore {
    fn list(&self) -> StorageResult<Vec<RawItem>> {
        Ok(self.lock()?.clone())
    }

    fn insert_front(&self, item: RawItem) -> StorageResult<bool> {
        Ok(ops::insert_front(&mut *self.lock()?, item))
    }

    fn delete(&self, matcher: &ItemMatcher) -> StorageResult<bool> {
        Ok(ops::delete(&mut *self.lock()?, matcher))
    }

    fn replace(&self, matcher: &ItemMatcher, item: RawItem) -> StorageResult<bool> {
        Ok(ops::replace(&mut *self.lock()?, matcher, item))
    }

    fn reorder(&self, from: usize, to: usize) -> StorageResult<()> {
        ops::reorder(&mut *self.lock()?, from, to)
    }
}
