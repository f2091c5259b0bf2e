use serde::{Deserialize, Serialize};

/// Structured view of a certificate payload, as produced by the decode service.
///
/// Two holders are the same item when all fields are equal; the coordinator
/// relies on this to route verification results back to their entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DecodedHolder {
    /// Unique certificate identifier assigned by the issuer.
    pub certificate_identifier: String,
    /// Family name of the certificate subject.
    pub family_name: String,
    /// Given name of the certificate subject.
    pub given_name: String,
    /// Date of birth as printed on the certificate.
    pub date_of_birth: String,
    /// Unix seconds at which the certificate was issued.
    pub issued_at: Option<u64>,
    /// Unix seconds after which the certificate is no longer valid.
    pub expires_at: Option<u64>,
}

impl DecodedHolder {
    /// Returns `true` if the certificate expires strictly after `instant`.
    ///
    /// A holder without an expiry never qualifies.
    #[must_use]
    pub fn expires_after(&self, instant: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at > instant)
    }
}
