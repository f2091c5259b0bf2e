//! [`ItemStore`] persisted as a single sealed blob.

use std::sync::{Arc, Mutex, MutexGuard};

use super::envelope::{decode_items, encode_items, WalletEnvelope};
use super::error::{StorageError, StorageResult};
use super::traits::{AtomicBlobStore, DeviceKeystore, ItemStore};
use super::{ops, WALLET_ITEMS_AD, WALLET_ITEMS_FILENAME};
use crate::item::{ItemMatcher, RawItem};

/// Item store that keeps the whole ordered list sealed by the device keystore.
///
/// Each mutation rewrites the blob through [`AtomicBlobStore::write_atomic`];
/// the cached list is only swapped once the write has succeeded, so a failed
/// write leaves both disk and memory at the previous state.
pub struct EncryptedItemStore {
    keystore: Arc<dyn DeviceKeystore>,
    blob_store: Arc<dyn AtomicBlobStore>,
    items: Mutex<Vec<RawItem>>,
}

impl std::fmt::Debug for EncryptedItemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedItemStore").finish()
    }
}

impl EncryptedItemStore {
    /// Opens the store, loading and unsealing any existing list.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob exists but cannot be read, unsealed or parsed.
    pub fn open(
        keystore: Arc<dyn DeviceKeystore>,
        blob_store: Arc<dyn AtomicBlobStore>,
    ) -> StorageResult<Self> {
        let items = match blob_store.read(WALLET_ITEMS_FILENAME.to_string())? {
            Some(bytes) => {
                let envelope = WalletEnvelope::deserialize(&bytes)?;
                let plaintext =
                    keystore.open_sealed(WALLET_ITEMS_AD.to_vec(), envelope.sealed_items)?;
                decode_items(&plaintext)?
            }
            None => Vec::new(),
        };
        log::debug!("opened wallet store with {} items", items.len());
        Ok(Self {
            keystore,
            blob_store,
            items: Mutex::new(items),
        })
    }

    /// Removes the persisted list and empties the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be deleted.
    pub fn wipe(&self) -> StorageResult<()> {
        let mut items = self.lock()?;
        self.blob_store.delete(WALLET_ITEMS_FILENAME.to_string())?;
        items.clear();
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Vec<RawItem>>> {
        self.items
            .lock()
            .map_err(|_| StorageError::Lock("item list mutex poisoned".to_string()))
    }

    fn persist(&self, items: &[RawItem]) -> StorageResult<()> {
        let plaintext = encode_items(items)?;
        let sealed = self.keystore.seal(WALLET_ITEMS_AD.to_vec(), plaintext)?;
        let bytes = WalletEnvelope::new(sealed).serialize()?;
        self.blob_store
            .write_atomic(WALLET_ITEMS_FILENAME.to_string(), bytes)
    }

    /// Applies `change` to a copy of the list and commits it if it reports a
    /// modification.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<RawItem>) -> StorageResult<(T, bool)>,
    ) -> StorageResult<T> {
        let mut items = self.lock()?;
        let mut next = items.clone();
        let (result, modified) = change(&mut next)?;
        if modified {
            self.persist(&next)?;
            *items = next;
        }
        Ok(result)
    }
}

impl ItemStore for EncryptedItemStore {
    fn list(&self) -> StorageResult<Vec<RawItem>> {
        Ok(self.lock()?.clone())
    }

    fn insert_front(&self, item: RawItem) -> StorageResult<bool> {
        self.mutate(|items| {
            let inserted = ops::insert_front(items, item);
            Ok((inserted, inserted))
        })
    }

    fn delete(&self, matcher: &ItemMatcher) -> StorageResult<bool> {
        self.mutate(|items| {
            let deleted = ops::delete(items, matcher);
            Ok((deleted, deleted))
        })
    }

    fn replace(&self, matcher: &ItemMatcher, item: RawItem) -> StorageResult<bool> {
        self.mutate(|items| {
            let replaced = ops::replace(items, matcher, item);
            Ok((replaced, replaced))
        })
    }

    fn reorder(&self, from: usize, to: usize) -> StorageResult<()> {
        self.mutate(|items| {
            ops::reorder(items, from, to)?;
            Ok(((), from != to))
        })
    }
}
