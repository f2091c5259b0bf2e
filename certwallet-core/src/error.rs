use thiserror::Error;

use crate::services::ServiceError;
use crate::storage::StorageError;

/// Result type of the coordinator API.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Error outputs from the [`WalletCoordinator`](crate::WalletCoordinator) API.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum CoordinatorError {
    /// The item store failed to read or persist the list
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// No wallet item matches the given payload or code
    #[error("unknown_item: {0}")]
    UnknownItem(String),
    /// The certificate did not decode and cannot be verified
    #[error("not_verifiable")]
    NotVerifiable,
    /// The key service could not create a key pair for a transfer code
    #[error("key_generation_failed: {0}")]
    KeyGeneration(ServiceError),
    /// The coordinator was created outside a Tokio runtime
    #[error("no_runtime")]
    NoRuntime,
}
