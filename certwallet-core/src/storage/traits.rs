//! Storage interfaces: the ordered item store and the platform hooks behind
//! its encrypted implementation.

use super::error::StorageResult;
use crate::item::{ItemMatcher, RawItem};

/// Ordered, durable list of wallet records.
///
/// Every mutation is atomic and durable once it returns; readers never observe
/// a partially applied change.
pub trait ItemStore: Send + Sync {
    /// Returns all records in user-visible order.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be read.
    fn list(&self) -> StorageResult<Vec<RawItem>>;

    /// Inserts `item` at the front of the list.
    ///
    /// Returns `false` and leaves the list untouched if an item with the same
    /// identity is already stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn insert_front(&self, item: RawItem) -> StorageResult<bool>;

    /// Deletes the item selected by `matcher`. Returns whether one was found.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn delete(&self, matcher: &ItemMatcher) -> StorageResult<bool>;

    /// Replaces the item selected by `matcher` with `item`, keeping its position.
    /// Returns whether one was found.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn replace(&self, matcher: &ItemMatcher, item: RawItem) -> StorageResult<bool>;

    /// Moves the item at `from` to position `to`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::IndexOutOfRange`](super::StorageError::IndexOutOfRange)
    /// for positions outside the list, or an error if the change cannot be persisted.
    fn reorder(&self, from: usize, to: usize) -> StorageResult<()>;
}

/// Device keystore interface used to seal and open the wallet list.
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait DeviceKeystore: Send + Sync {
    /// Seals plaintext under the device-bound key, authenticating `associated_data`.
    ///
    /// The associated data is not encrypted, but it is integrity-protected as part
    /// of the seal operation. Any mismatch when opening must fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the keystore refuses the operation or the seal fails.
    fn seal(&self, associated_data: Vec<u8>, plaintext: Vec<u8>) -> StorageResult<Vec<u8>>;

    /// Opens ciphertext under the device-bound key, verifying `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or the keystore cannot open.
    fn open_sealed(
        &self,
        associated_data: Vec<u8>,
        ciphertext: Vec<u8>,
    ) -> StorageResult<Vec<u8>>;
}

/// Atomic blob store for small binary files (e.g., `wallet_items.bin`).
#[cfg_attr(feature = "ffi", uniffi::export(with_foreign))]
pub trait AtomicBlobStore: Send + Sync {
    /// Reads the blob named `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read(&self, name: String) -> StorageResult<Option<Vec<u8>>>;

    /// Writes bytes atomically under `name`: readers see either the old or the
    /// new content, never a mix.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, name: String, bytes: Vec<u8>) -> StorageResult<()>;

    /// Deletes the blob named `name`. Missing blobs are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, name: String) -> StorageResult<()>;
}
