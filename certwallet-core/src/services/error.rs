//! Failures reported by external collaborators.

use thiserror::Error;

/// The decode service rejected a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
pub enum DecodeError {
    /// The payload is not a well-formed certificate.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// The payload is well-formed but of an unsupported kind or version.
    #[error("unsupported payload: {0}")]
    Unsupported(String),
}

/// The delivery backend could not serve a transfer code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
pub enum DeliveryError {
    /// The backend considers the device clock untrustworthy.
    #[error("device time deviates from server time")]
    TimeDeviation,
    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,
    /// Any other transport or server failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Generic failure of a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
pub enum ServiceError {
    /// The call failed for the given reason.
    #[error("service call failed: {0}")]
    Failed(String),
    /// The call could not reach its backend.
    #[error("service unreachable: {0}")]
    Unreachable(String),
}
