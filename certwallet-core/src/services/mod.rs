//! Interfaces of the collaborators the coordinator orchestrates.
//!
//! The coordinator never decodes, verifies or talks to the delivery backend
//! itself. Each capability is injected at construction time:
//!
//! - [`DecodeService`]: payload to [`DecodedHolder`]
//! - [`VerificationService`]: live verification states and trust data refresh
//! - [`DeliveryService`]: transfer code download and completion
//! - [`KeyService`]: per-code key pairs
//! - [`ConnectivityProbe`]: whether the device is online
//! - [`Clock`]: the current time

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::item::{DecodedHolder, VerificationState};

mod error;

pub use error::{DecodeError, DeliveryError, ServiceError};

/// Turns raw certificate payloads into holders.
pub trait DecodeService: Send + Sync {
    /// Decodes `payload`. Must not block.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed or unsupported payloads.
    fn decode(&self, payload: &str) -> Result<DecodedHolder, DecodeError>;
}

/// Evaluates certificates against trust data.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Starts verifying `holder`.
    ///
    /// The returned stream yields [`VerificationState::Loading`] any number of
    /// times and then one terminal state. Dropping the stream stops observing it.
    fn verify(
        &self,
        holder: &DecodedHolder,
        ignore_local_trust_list: bool,
    ) -> BoxStream<'static, VerificationState>;

    /// Refreshes the local trust data from the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh did not complete.
    async fn refresh_trust_data(&self) -> Result<(), ServiceError>;
}

/// Opaque reference to a key pair held by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct KeyPair {
    /// Alias under which the platform keeps the private key.
    pub alias: String,
    /// Encoded public key registered with the delivery backend.
    pub public_key: Vec<u8>,
}

/// A certificate delivered for a transfer code, already decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DeliveredCertificate {
    /// Certificate payload.
    pub qr_payload: String,
    /// PDF export delivered with the certificate.
    pub pdf_payload: Option<String>,
}

/// Backend exchanging transfer codes for certificates.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Downloads and decrypts every certificate waiting for `code`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::TimeDeviation`] when the backend rejects the
    /// device clock, and another variant for transport failures.
    async fn download(
        &self,
        code: &str,
        key_pair: &KeyPair,
    ) -> Result<Vec<DeliveredCertificate>, DeliveryError>;

    /// Tells the backend that delivery for `code` is complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be reached.
    async fn complete(&self, code: &str, key_pair: &KeyPair) -> Result<(), DeliveryError>;
}

/// Key material for transfer codes.
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Creates and stores a key pair for `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refused to create the key.
    async fn generate_key_pair(&self, code: &str) -> Result<KeyPair, ServiceError>;

    /// Looks up the key pair for `code`.
    async fn load_key_pair(&self, code: &str) -> Option<KeyPair>;

    /// Removes the key pair for `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform could not delete the entry.
    async fn delete_key_entry(&self, code: &str) -> Result<(), ServiceError>;
}

/// Reports network reachability.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns `true` if the device currently has connectivity.
    fn is_connected(&self) -> bool;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> u64;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}
