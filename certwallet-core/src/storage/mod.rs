//! Wallet item persistence.
//!
//! The coordinator only sees the [`ItemStore`] trait. Two implementations ship
//! with the crate:
//!
//! - [`MemoryItemStore`]: volatile, for tests and ephemeral sessions
//! - [`EncryptedItemStore`]: the ordered list sealed by a platform
//!   [`DeviceKeystore`] and written through an [`AtomicBlobStore`]
//!
//! [`FsBlobStore`] provides the blob store on native targets.

mod encrypted;
pub(crate) mod envelope;
pub mod error;
mod fs;
mod memory;
mod ops;
pub mod traits;

pub use encrypted::EncryptedItemStore;
pub use error::{StorageError, StorageResult};
pub use fs::FsBlobStore;
pub use memory::MemoryItemStore;
pub use traits::{AtomicBlobStore, DeviceKeystore, ItemStore};

pub(crate) const WALLET_ITEMS_FILENAME: &str = "wallet_items.bin";
pub(crate) const WALLET_ITEMS_AD: &[u8] = b"certwallet:wallet-items";
