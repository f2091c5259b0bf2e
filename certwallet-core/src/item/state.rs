//! Task outcome states published for each wallet item.

use std::time::Duration;

use strum::{Display, EnumDiscriminants};

use super::DecodedHolder;

/// Half-open validity window in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TimeRange {
    /// Start of the window.
    pub valid_from: u64,
    /// End of the window.
    pub valid_until: u64,
}

impl TimeRange {
    /// Window of length `length` beginning at `start`.
    #[must_use]
    pub const fn starting_at(start: u64, length: Duration) -> Self {
        Self {
            valid_from: start,
            valid_until: start.saturating_add(length.as_secs()),
        }
    }
}

/// Why an item ended in an error state.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The payload could not be decoded.
    Decode,
    /// A request failed while the device was online.
    NetworkFailure,
    /// A request failed while the device had no connectivity.
    Offline,
    /// The backend rejected the device clock.
    InvalidTime,
    /// No key pair exists for the transfer code.
    KeypairGenerationFailed,
    /// The verification service reported a failure.
    Verification {
        /// Code reported by the verification service.
        code: String,
    },
    /// Persisting the outcome to the item store failed.
    Storage,
}

/// Verification progress of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, EnumDiscriminants)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum_discriminants(name(VerificationPhase), derive(Display))]
pub enum VerificationState {
    /// Verification is running.
    Loading,
    /// The certificate verified.
    Success {
        /// Set when the result was produced without consulting trust data.
        forced: bool,
        /// Window in which the result holds.
        validity: TimeRange,
    },
    /// Verification failed.
    Error {
        /// Failure classification.
        kind: ErrorKind,
        /// Whether retrying can change the outcome.
        retryable: bool,
    },
}

impl VerificationState {
    /// State assigned to certificates whose payload does not decode.
    #[must_use]
    pub const fn decode_error() -> Self {
        Self::Error {
            kind: ErrorKind::Decode,
            retryable: false,
        }
    }

    /// Returns `true` for states after which no automatic update follows.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Progress of a transfer code conversion.
#[derive(Debug, Clone, PartialEq, Eq, EnumDiscriminants)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum_discriminants(name(ConversionPhase), derive(Display))]
pub enum ConversionState {
    /// Conversion is running.
    Loading,
    /// The backend delivered a certificate that decoded.
    Converted {
        /// Holder of the first delivered certificate.
        holder: DecodedHolder,
    },
    /// Nothing usable was delivered yet.
    NotConverted,
    /// Conversion failed.
    Error {
        /// Failure classification.
        kind: ErrorKind,
    },
}

impl ConversionState {
    /// Returns `true` for states after which no automatic update follows.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}
